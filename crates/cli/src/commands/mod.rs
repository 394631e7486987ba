pub mod bootstrap;
pub mod init;
pub mod version;
pub mod wallet;

use clap::Subcommand;

use bootstrap::BootstrapArgs;
use init::InitArgs;
use version::VersionArgs;
use wallet::WalletArgs;

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new project config (default filename is ./[project]-[nick].json)
    Init(InitArgs),
    /// Print the version number of thresher
    Version(VersionArgs),
    /// Start a wallet session
    Wallet(WalletArgs),
    /// Run a local, in-process simulation of a full keygen + sign cycle
    Bootstrap(BootstrapArgs),
}
