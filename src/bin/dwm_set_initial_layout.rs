//! dwm-set-initial-layout - broadcast the merged initial layout
//!
//! Merges every application's `dwm_initial_layout.json` by z-order and
//! sends the result to all nodes as `initial_vscreen`.

use anyhow::Result;
use clap::Parser;

use ula_tools::client::DwmClient;
use ula_tools::utils::init_logging;

/// Command-line arguments for dwm-set-initial-layout
#[derive(Parser, Debug)]
#[command(name = "dwm-set-initial-layout")]
#[command(version, about = "Merge app layouts and broadcast the initial screen", long_about = None)]
struct Args {
    /// Application layout directory root
    #[arg(short = 'd', long, default_value = "/var/local/uhmi-app/dwm")]
    dwm_dir: String,

    /// Screen-definition file path
    #[arg(
        short = 'f',
        long = "screen-def",
        default_value = "/etc/uhmi-framework/virtual-screen-def.json"
    )]
    screen_def: String,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // downstream loaders read these
    std::env::set_var("DWMPATH", &args.dwm_dir);
    std::env::set_var("VSDPATH", &args.screen_def);

    let client = DwmClient::connect(DwmClient::force_from_env(), Some(&args.screen_def)).await?;
    client.set_system_layout().await?;

    Ok(())
}
