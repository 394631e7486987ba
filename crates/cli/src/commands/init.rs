//! Grounded in `commands/init.go`'s `initCommand`/`initProjectConfig`.

use clap::Args;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Args)]
pub struct InitArgs {
    /// Only 'avalanche' and 'ethereum' are supported currently
    pub blockchain: String,
    /// 'mainnet', 'fuji', or 'goerli'
    pub network: String,
    /// The name of your project, e.g. 'DAOTreasury'
    pub project: String,
    /// Your nickname in the chat, e.g. 'PrezCamacho'
    pub nick: String,
    /// Your chain address, e.g. X-fuji1xv3653....
    pub address: String,
}

pub async fn run(args: InitArgs, config_path: Option<String>) -> Result<(), AppError> {
    let filename = config_path.unwrap_or_else(|| format!("{}-{}.json", args.project, args.nick));

    let mut cfg = AppConfig::new(&args.blockchain, &args.network, &args.project, &args.nick, &args.address)?;
    cfg.save_new(&filename).await?;

    println!("New project created with config file: {filename}");
    Ok(())
}
