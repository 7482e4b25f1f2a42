//! ChainFS Bridge — ext4_chain kernel module to ledger daemon
//!
//! Turns inode-lifecycle events raised by the ext4_chain kernel module into
//! ledger operations and answers each request over the same generic netlink
//! channel.

mod dispatch;
mod netlink;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chainfs_ledger::{LedgerConfig, MemoryLedger};
use chainfs_proto::FAMILY_NAME;
use clap::Parser;
use tracing::info;

use dispatch::Bridge;
use netlink::NetlinkConnection;

#[derive(Parser)]
#[command(about = "Bridges ext4_chain inode events to a ledger backend")]
struct Args {
    /// Generic netlink family registered by the kernel module
    #[arg(long, default_value = FAMILY_NAME)]
    family: String,

    /// Ledger configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ledger channel name (overrides the config file and CHANNEL_NAME)
    #[arg(long)]
    channel: Option<String>,

    /// Ledger contract name (overrides the config file and CHAINCODE_NAME)
    #[arg(long)]
    contract: Option<String>,
}

fn load_config(args: &Args) -> Result<LedgerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        }
        None => LedgerConfig::from_env(),
    };
    if let Some(channel) = &args.channel {
        config.channel = channel.clone();
    }
    if let Some(contract) = &args.contract {
        config.contract = contract.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(
        channel = %config.channel,
        contract = %config.contract,
        "ledger configuration loaded"
    );

    let ledger = MemoryLedger::new(&config);
    let connection = NetlinkConnection::connect(&args.family)
        .context("failed to open the kernel-facing netlink channel")?;

    let mut bridge = Bridge::new(connection, ledger);
    bridge.run().context("netlink channel failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args(config: Option<PathBuf>) -> Args {
        Args {
            family: FAMILY_NAME.to_string(),
            config,
            channel: None,
            contract: None,
        }
    }

    #[test]
    fn test_cli_parsing_overrides() {
        let args = Args::try_parse_from([
            "chainfs-bridge",
            "--channel",
            "prod",
            "--contract",
            "inodes",
        ])
        .unwrap();
        assert_eq!(args.family, FAMILY_NAME);
        let config = load_config(&args).unwrap();
        assert_eq!(config.channel, "prod");
        assert_eq!(config.contract, "inodes");
    }

    #[test]
    fn test_config_loading_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(br#"{"channel": "testnet", "contract": "ext4meta"}"#)
            .unwrap();
        temp_file.flush().unwrap();

        let config = load_config(&args(Some(temp_file.path().to_path_buf()))).unwrap();
        assert_eq!(config.channel, "testnet");
        assert_eq!(config.contract, "ext4meta");
    }

    #[test]
    fn test_config_loading_rejects_bad_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"not json").unwrap();
        temp_file.flush().unwrap();

        assert!(load_config(&args(Some(temp_file.path().to_path_buf()))).is_err());
    }
}
