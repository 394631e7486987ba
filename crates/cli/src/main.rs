use clap::Parser;

use thresher::commands::{self, Command};
use thresher::config::AppConfig;
use thresher::error::AppError;

const ASCII_ART: &str = r#"
  _______________________________  __      __        .__  .__          __
 /   _____/\__    ___/\__    ___/ /  \    /  \_____  |  | |  |   _____/  |_
 \_____  \   |    |     |    |    \   \/\/   /\__  \ |  | |  | _/ __ \   __\
 /        \  |    |     |    |     \        /  / __ \|  |_|  |_\  ___/|  |
/_______  /  |____|     |____|      \__/\  /  (____  /____/____/\___  >__|
        \/                               \/        \/               \/
"#;

#[derive(Parser)]
#[command(name = "thresher")]
struct Cli {
    /// Config file which **contains secrets**
    #[arg(short, long)]
    config: Option<String>,

    /// Logfile; omit to log to stderr
    #[arg(short, long)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    match &cli.log {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt().with_writer(std::sync::Mutex::new(file)).init();
        }
        None => tracing_subscriber::fmt::init(),
    }

    print!("{ASCII_ART}");

    match cli.command {
        Command::Init(args) => commands::init::run(args, cli.config).await,
        Command::Version(args) => {
            commands::version::run(args);
            Ok(())
        }
        Command::Wallet(args) => {
            let path = cli.config.as_deref().unwrap_or("thresher.json");
            let cfg = AppConfig::load(path).await?;
            commands::wallet::run(args, cfg).await
        }
        Command::Bootstrap(args) => commands::bootstrap::run(args).await,
    }
}
