use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "game-event-bridge")]
#[command(version)]
#[command(about = "Replay scripted game hook calls through the event bridge and print what the host would receive")]
pub struct Args {
    /// JSON-lines replay script (reads stdin when omitted)
    pub script: Option<PathBuf>,

    /// TOML file with rate windows (defaults: 1000 ms start window, 2000 ms score heartbeat)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Do not activate the bridge before the first step; the script must contain activate steps
    #[arg(long)]
    pub no_auto_activate: bool,

    /// Print a JSON summary of the replay to stderr when done
    #[arg(long)]
    pub stats: bool,
}
