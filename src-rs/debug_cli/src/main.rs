mod cli;
mod render;
mod repl;

use dashboard_tracker_rs::build_tracker;
use repl::Repl;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let (args, config) = cli::parse_config();
    let (tracker, credentials) = match build_tracker(&config) {
        Ok(parts) => parts,
        Err(err) => {
            render::error(&err.to_string());
            std::process::exit(1);
        }
    };
    if let Some(token) = &args.token {
        if let Err(err) = credentials.set_token(token) {
            render::error(&err.to_string());
        }
    }

    let mut repl = Repl::new(config, tracker, credentials, args.files.clone());
    if let Err(err) = repl.run(!args.no_resume).await {
        tracing::error!("input error: {}", err);
    }
}
