//! ula-distrib-com - layout command distributor
//!
//! Reads a JSON layout command from stdin and fans it out to every node
//! declared in the screen definition. Exits 0 when every node accepted the
//! command, 1 otherwise.

use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;

use ula_tools::client::DwmClient;
use ula_tools::utils::init_logging;

/// Command-line arguments for ula-distrib-com
#[derive(Parser, Debug)]
#[command(name = "ula-distrib-com")]
#[command(version, about = "Distribute a layout command to all nodes", long_about = None)]
struct Args {
    /// Continue even if some nodes are unreachable
    #[arg(short, long)]
    force: bool,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Screen-definition file path
    #[arg(env = "VSDPATH")]
    screen_def: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let force = args.force || DwmClient::force_from_env();

    let mut command = String::new();
    std::io::stdin()
        .read_to_string(&mut command)
        .context("cannot read command from stdin")?;

    let client = DwmClient::connect(force, args.screen_def.as_deref()).await?;
    client.set_layout_command(&command).await?;

    Ok(())
}
