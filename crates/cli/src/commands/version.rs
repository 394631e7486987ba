//! Grounded in `commands/version.go`'s `versionCommand`.

use clap::Args;

#[derive(Args)]
pub struct VersionArgs {}

pub fn run(_args: VersionArgs) {
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Rustc:   {}", option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown"));
    println!("OS/Arch: {}/{}", std::env::consts::OS, std::env::consts::ARCH);
}
