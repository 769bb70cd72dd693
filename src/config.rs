//! Configuration management for tx-speedup
//!
//! Settings are assembled once at startup from command-line flags, environment
//! variables and an optional TOML file with environment variable substitution.
//! The result is immutable and handed to the pipeline by reference.

use crate::error::{SpeedupError, SpeedupResult};
use crate::pipeline::ReplacementRequest;
use crate::tx::KeyMaterial;

use anyhow::{Context, Result};
use clap::Parser;
use ethers::types::H256;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Gas price used when neither the command line nor the config file sets one
pub const DEFAULT_GAS_PRICE_GWEI: u64 = 10;

/// Broadcasts on congested nodes can take a while to answer
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 180;

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Command line arguments
#[derive(Parser, Default)]
#[command(
    name = "tx-speedup",
    version,
    about = "Replace a pending transaction with a higher gas price copy under the same nonce"
)]
pub struct Cli {
    /// JSON-RPC endpoint of the node
    #[arg(long, alias = "swap", env = "SPEEDUP_RPC_URL", value_name = "URL")]
    pub rpc: Option<String>,

    /// Private key of the sending account, hex with or without 0x
    #[arg(long, env = "SPEEDUP_PRIVATE_KEY", hide_env_values = true, value_name = "HEX")]
    pub key: Option<String>,

    /// Hash of the pending transaction to speed up
    #[arg(long, value_name = "HASH")]
    pub txid: Option<String>,

    /// Gas price of the replacement in gwei [default: 10]
    #[arg(long, value_name = "GWEI")]
    pub gas: Option<u64>,

    /// Minimum gas limit; 0 keeps the limit of the original transaction [default: 0]
    #[arg(long, value_name = "GAS")]
    pub limit: Option<u64>,

    /// Require a strictly higher gas price than the original
    #[arg(long)]
    pub strict: bool,

    /// Timeout for each RPC request in seconds [default: 180]
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Sign and print the replacement without broadcasting it
    #[arg(long)]
    pub dry_run: bool,

    /// Optional TOML configuration file
    #[arg(short, long, env = "SPEEDUP_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl fmt::Debug for Cli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cli")
            .field("rpc", &self.rpc)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("txid", &self.txid)
            .field("gas", &self.gas)
            .field("limit", &self.limit)
            .field("strict", &self.strict)
            .field("timeout_secs", &self.timeout_secs)
            .field("dry_run", &self.dry_run)
            .field("config", &self.config)
            .finish()
    }
}

/// How the replacement gas price must compare to the original one
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementRule {
    /// Equal prices are accepted locally; the node may still refuse them
    #[default]
    AtLeast,
    StrictlyGreater,
}

impl fmt::Display for ReplacementRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplacementRule::AtLeast => write!(f, "requires requested >= original"),
            ReplacementRule::StrictlyGreater => write!(f, "requires requested > original"),
        }
    }
}

/// Contents of the optional TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub rpc_url: Option<String>,
    pub private_key: Option<String>,
    pub gas_price_gwei: Option<u64>,
    pub gas_limit: Option<u64>,
    pub replacement_rule: Option<ReplacementRule>,
    pub request_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Load a config file, substituting `${VAR}` references first
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config_str = substitute_env_vars(&config_str);

        toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse configuration: {:?}", path))
    }
}

/// Resolved, immutable settings for one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub rpc_url: String,
    pub private_key: KeyMaterial,
    pub tx_hash: H256,
    pub gas_price_gwei: u64,
    pub gas_limit: u64,
    pub replacement_rule: ReplacementRule,
    pub request_timeout: Duration,
    pub dry_run: bool,
}

impl Settings {
    /// Merge flags, environment and config file.
    ///
    /// Returns `Ok(None)` when a required value is missing, in which case the
    /// caller prints usage and exits cleanly.
    pub fn resolve(cli: &Cli) -> Result<Option<Self>> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let rpc_url = non_empty(cli.rpc.clone().or(file.rpc_url));
        let private_key = non_empty(cli.key.clone().or(file.private_key));
        let tx_id = non_empty(cli.txid.clone());

        let (Some(rpc_url), Some(private_key), Some(tx_id)) = (rpc_url, private_key, tx_id) else {
            return Ok(None);
        };

        let replacement_rule = if cli.strict {
            ReplacementRule::StrictlyGreater
        } else {
            file.replacement_rule.unwrap_or_default()
        };

        let timeout_secs = cli
            .timeout_secs
            .or(file.request_timeout_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let settings = Self {
            rpc_url,
            private_key: KeyMaterial::new(private_key),
            tx_hash: parse_tx_hash(&tx_id)?,
            gas_price_gwei: cli
                .gas
                .or(file.gas_price_gwei)
                .unwrap_or(DEFAULT_GAS_PRICE_GWEI),
            gas_limit: cli.limit.or(file.gas_limit).unwrap_or(0),
            replacement_rule,
            request_timeout: Duration::from_secs(timeout_secs),
            dry_run: cli.dry_run,
        };

        settings.validate()?;

        Ok(Some(settings))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            anyhow::bail!("Request timeout must be greater than zero");
        }
        if self.gas_price_gwei == 0 {
            tracing::warn!("Gas price of 0 gwei can only replace a zero-fee transaction");
        }
        Ok(())
    }

    /// Build the replacement request for the pipeline
    pub fn request(&self) -> ReplacementRequest {
        ReplacementRequest {
            tx_hash: self.tx_hash,
            gas_price_gwei: self.gas_price_gwei,
            gas_limit_override: self.gas_limit,
            private_key: self.private_key.clone(),
        }
    }
}

/// Parse a 32-byte transaction hash, `0x` prefix optional
pub fn parse_tx_hash(input: &str) -> SpeedupResult<H256> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let invalid = |reason: String| SpeedupError::InvalidTransactionId {
        value: input.to_string(),
        reason,
    };

    if digits.len() != 64 {
        return Err(invalid(format!(
            "expected 64 hex digits, got {}",
            digits.len()
        )));
    }

    let bytes = hex::decode(digits).map_err(|e| invalid(e.to_string()))?;
    Ok(H256::from_slice(&bytes))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TX_HASH: &str = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["tx-speedup"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_env_var_substitution() {
        env::set_var("SPEEDUP_TEST_VAR", "test_value");
        let input = "rpc_url = \"https://rpc.example.com/${SPEEDUP_TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "rpc_url = \"https://rpc.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_missing_required_values_yield_none() {
        let settings = Settings::resolve(&cli(&["--rpc", "http://localhost:8545"])).unwrap();
        assert!(settings.is_none());

        let settings = Settings::resolve(&cli(&[
            "--rpc",
            "http://localhost:8545",
            "--key",
            "  ",
            "--txid",
            TX_HASH,
        ]))
        .unwrap();
        assert!(settings.is_none());
    }

    #[test]
    fn test_defaults_applied() {
        let settings = Settings::resolve(&cli(&[
            "--rpc",
            "http://localhost:8545",
            "--key",
            "0x01",
            "--txid",
            TX_HASH,
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(settings.gas_price_gwei, DEFAULT_GAS_PRICE_GWEI);
        assert_eq!(settings.gas_limit, 0);
        assert_eq!(settings.replacement_rule, ReplacementRule::AtLeast);
        assert_eq!(
            settings.request_timeout,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        assert!(!settings.dry_run);
        assert_eq!(settings.tx_hash, parse_tx_hash(TX_HASH).unwrap());
    }

    #[test]
    fn test_swap_alias_and_strict_flag() {
        let settings = Settings::resolve(&cli(&[
            "--swap",
            "http://node:8545",
            "--key",
            "01",
            "--txid",
            TX_HASH,
            "--gas",
            "25",
            "--limit",
            "90000",
            "--strict",
            "--dry-run",
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(settings.rpc_url, "http://node:8545");
        assert_eq!(settings.gas_price_gwei, 25);
        assert_eq!(settings.gas_limit, 90_000);
        assert_eq!(settings.replacement_rule, ReplacementRule::StrictlyGreater);
        assert!(settings.dry_run);

        let request = settings.request();
        assert_eq!(request.gas_limit_override, 90_000);
        assert_eq!(request.private_key.expose(), "01");
    }

    #[test]
    fn test_file_config_with_cli_override() {
        env::set_var("SPEEDUP_TEST_FILE_KEY", "0xabc123");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
rpc_url = "http://file-node:8545"
private_key = "${{SPEEDUP_TEST_FILE_KEY}}"
gas_price_gwei = 40
gas_limit = 50000
replacement_rule = "strictly_greater"
request_timeout_secs = 30
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let settings = Settings::resolve(&cli(&["--config", &path, "--txid", TX_HASH, "--gas", "41"]))
            .unwrap()
            .unwrap();

        assert_eq!(settings.rpc_url, "http://file-node:8545");
        assert_eq!(settings.private_key.expose(), "0xabc123");
        assert_eq!(settings.gas_price_gwei, 41);
        assert_eq!(settings.gas_limit, 50_000);
        assert_eq!(settings.replacement_rule, ReplacementRule::StrictlyGreater);
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_unknown_file_key_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "gas_prise_gwei = 40").unwrap();
        assert!(FileConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Settings::resolve(&cli(&[
            "--rpc",
            "http://localhost:8545",
            "--key",
            "01",
            "--txid",
            TX_HASH,
            "--timeout-secs",
            "0",
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_debug_hides_key() {
        let key = "0x4646464646464646464646464646464646464646464646464646464646464646";
        let parsed = cli(&["--key", key, "--txid", TX_HASH]);

        let printed = format!("{:?}", parsed);
        assert!(!printed.contains(&key[2..]));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains(&TX_HASH[2..]));

        let settings = Settings::resolve(&cli(&[
            "--rpc",
            "http://localhost:8545",
            "--key",
            key,
            "--txid",
            TX_HASH,
        ]))
        .unwrap();
        assert!(!format!("{:?}", settings).contains(&key[2..]));
    }

    #[test]
    fn test_parse_tx_hash() {
        let with_prefix = parse_tx_hash(TX_HASH).unwrap();
        let without_prefix = parse_tx_hash(&TX_HASH[2..]).unwrap();
        assert_eq!(with_prefix, without_prefix);

        assert!(matches!(
            parse_tx_hash("0x1234"),
            Err(SpeedupError::InvalidTransactionId { .. })
        ));
        let not_hex = format!("0x{}", "zz".repeat(32));
        assert!(matches!(
            parse_tx_hash(&not_hex),
            Err(SpeedupError::InvalidTransactionId { .. })
        ));
    }
}
