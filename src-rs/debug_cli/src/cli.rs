use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dashboard_tracker_rs::TrackerConfig;

#[derive(Clone, Debug, Parser)]
#[command(name = "dashboard-cli", about = "Interactive client for the dashboard generation service")]
pub struct CliArgs {
    /// Service base URL (defaults to DASHBOARD_API_URL)
    #[arg(long = "base")]
    pub base_url: Option<String>,

    /// Bearer token to store before starting
    #[arg(long, env = "DASHBOARD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Comma-separated data files queries run against
    #[arg(long, value_delimiter = ',')]
    pub files: Vec<String>,

    #[arg(long = "poll-secs")]
    pub poll_secs: Option<u64>,

    /// Give up on a task after this many seconds
    #[arg(long = "max-poll-secs")]
    pub max_poll_secs: Option<u64>,

    #[arg(long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Ignore a task left over from a previous session
    #[arg(long)]
    pub no_resume: bool,
}

pub fn parse_config() -> (CliArgs, TrackerConfig) {
    let args = CliArgs::parse();
    let mut cfg = TrackerConfig::from_env();
    if let Some(base) = &args.base_url {
        cfg.base_url = base.clone();
    }
    if let Some(secs) = args.poll_secs.filter(|s| *s > 0) {
        cfg.poll_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = args.max_poll_secs {
        cfg.max_poll_duration = Some(Duration::from_secs(secs));
    }
    if let Some(dir) = &args.data_dir {
        cfg.data_dir = dir.clone();
    }
    (args, cfg)
}
