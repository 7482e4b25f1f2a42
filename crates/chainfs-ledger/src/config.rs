//! Backend selection configuration

use serde::{Deserialize, Serialize};

/// Identifiers selecting which backend channel and contract the ledger
/// targets. Consumed by gateway implementations; the bridge core only
/// threads it through.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_contract")]
    pub contract: String,
}

fn default_channel() -> String {
    "mychannel".to_string()
}

fn default_contract() -> String {
    "ext4".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            contract: default_contract(),
        }
    }
}

impl LedgerConfig {
    /// Defaults overridden by the `CHANNEL_NAME` and `CHAINCODE_NAME`
    /// environment variables when they are set and non-empty.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(channel) = std::env::var("CHANNEL_NAME") {
            if !channel.is_empty() {
                config.channel = channel;
            }
        }
        if let Ok(contract) = std::env::var("CHAINCODE_NAME") {
            if !contract.is_empty() {
                config.contract = contract;
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_daemon() {
        let config = LedgerConfig::default();
        assert_eq!(config.channel, "mychannel");
        assert_eq!(config.contract, "ext4");
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let config: LedgerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.channel, "mychannel");
        let config: LedgerConfig =
            serde_json::from_str(r#"{"channel": "prod"}"#).unwrap();
        assert_eq!(config.channel, "prod");
        assert_eq!(config.contract, "ext4");
    }
}
