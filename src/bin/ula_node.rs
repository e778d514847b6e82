//! ula-node - node agent binary
//!
//! Listens for framed layout payloads from the client manager and drives
//! this node's compositor.

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use ula_tools::config::ScreenDef;
use ula_tools::node::{run_node_agent, select_plugin};
use ula_tools::utils::init_logging;

/// Command-line arguments for ula-node
#[derive(Parser, Debug)]
#[command(name = "ula-node")]
#[command(version, about = "Distributed window-layout node agent", long_about = None)]
struct Args {
    /// Screen-definition file path
    #[arg(short = 'f', long = "screen-def", env = "VSDPATH")]
    screen_def: Option<String>,

    /// Resolve this node's parameters by node id
    #[arg(short = 'N', long)]
    node_id: Option<i32>,

    /// Resolve this node's parameters by hostname (defaults to the
    /// machine hostname)
    #[arg(short = 'H', long)]
    hostname: Option<String>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Explicit endpoint: listen_ip listen_port node_id
    #[arg(num_args = 0..=3)]
    endpoint: Vec<String>,
}

fn resolve_endpoint(args: &Args, def: &ScreenDef) -> Result<(String, u16, i32)> {
    if !args.endpoint.is_empty() {
        if args.endpoint.len() != 3 {
            bail!("explicit endpoint needs listen_ip listen_port node_id");
        }
        let ip = args.endpoint[0].clone();
        let port: u16 = args.endpoint[1].parse().context("bad listen port")?;
        let node_id: i32 = args.endpoint[2].parse().context("bad node id")?;
        return Ok((ip, port, node_id));
    }

    if args.node_id.is_some() && args.hostname.is_some() {
        bail!("give either --node-id or --hostname, not both");
    }

    let node_id = match args.node_id {
        Some(id) => id,
        None => {
            let host = match &args.hostname {
                Some(name) => name.clone(),
                None => hostname::get()
                    .context("cannot determine hostname")?
                    .to_string_lossy()
                    .into_owned(),
            };
            def.node_id_by_hostname(&host)?
        }
    };

    let ip = def.ip_for_node(node_id)?.to_string();
    let port = def.ula_port_for_node(node_id)?;
    Ok((ip, port, node_id))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    info!("ula-node v{} ({} {})", env!("CARGO_PKG_VERSION"), env!("BUILD_DATE"), env!("GIT_HASH"));

    let def = ScreenDef::load(args.screen_def.as_deref()).context("screen definition")?;
    let (listen_ip, listen_port, node_id) = resolve_endpoint(&args, &def)?;

    let listen_addr = format!("{}:{}", listen_ip, listen_port);
    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("cannot listen on {}", listen_addr))?;

    let plugin = select_plugin(&def, node_id);

    info!(node_id, %listen_addr, "starting node agent");
    run_node_agent(listener, plugin, node_id).await?;

    Ok(())
}
