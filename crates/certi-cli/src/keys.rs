//! # Keygen Subcommand
//!
//! Generates a random AES-256 master key, printed as hex for
//! `CERTI_MASTER_KEY_HEX`.

use anyhow::Result;
use clap::Args;

use certi_crypto::MasterKey;

use crate::EXIT_OK;

/// Arguments for `certi keygen-master`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Print as a shell `export` line.
    #[arg(long)]
    pub export: bool,
}

pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    let hex = MasterKey::generate().to_hex();
    if args.export {
        println!("export {}={}", certi_engine::config::ENV_MASTER_KEY_HEX, hex.as_str());
    } else {
        println!("{}", hex.as_str());
    }
    Ok(EXIT_OK)
}
