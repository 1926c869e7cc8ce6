use std::path::PathBuf;

use argh::FromArgs;
use goliath_common::env::get_nonempty_env;
use toml::value::Table;

use crate::errors::{ConfigError, InitError};

/// Envvar that overrides `chain.endpoint`.
pub(crate) const CHAIN_ENDPOINT_ENVVAR: &str = "GOLIATH_CHAIN_ENDPOINT";

/// Configs overridable by environment.
#[derive(Debug, Clone, Default)]
pub(crate) struct EnvArgs {
    chain_endpoint: Option<String>,
}

impl EnvArgs {
    pub(crate) fn from_env() -> Self {
        Self {
            chain_endpoint: get_nonempty_env(CHAIN_ENDPOINT_ENVVAR),
        }
    }

    /// Get strings of overrides gathered from env.
    pub(crate) fn get_overrides(&self) -> Vec<String> {
        let mut overrides = Vec::new();
        if let Some(endpoint) = &self.chain_endpoint {
            overrides.push(format!("chain.endpoint={endpoint}"));
        }
        overrides
    }
}

#[derive(Debug, Clone, FromArgs)]
#[argh(description = "Goliath executer: runs the chain's transactions in order")]
pub(crate) struct Args {
    #[argh(option, short = 'c', description = "path to configuration")]
    pub(crate) config: PathBuf,

    /// Data directory path that will override the path in the config toml.
    #[argh(
        option,
        short = 'd',
        description = "datadir path that will contain the resume checkpoint"
    )]
    pub(crate) datadir: Option<PathBuf>,

    /// Chain service endpoint, overriding the config and the env.
    #[argh(option, description = "chain service endpoint")]
    pub(crate) endpoint: Option<String>,

    /// Other generic overrides to the config toml.
    /// Will be used, for example, as `-o sequencer.queue_capacity=64 -o chain.fetch_batch_limit=100`
    #[argh(option, short = 'o', description = "generic config overrides")]
    pub(crate) overrides: Vec<String>,
}

impl Args {
    /// Get strings of overrides gathered from args.
    pub(crate) fn get_overrides(&self) -> Result<Vec<String>, InitError> {
        let mut overrides = self.overrides.clone();
        overrides.extend_from_slice(&self.get_direct_overrides()?);
        Ok(overrides)
    }

    /// Overrides passed directly as args and not as overrides.
    fn get_direct_overrides(&self) -> Result<Vec<String>, InitError> {
        let mut overrides = Vec::new();
        if let Some(datadir) = &self.datadir {
            let dd = datadir.to_str().ok_or(anyhow::anyhow!(
                "Invalid datadir override path {:?}",
                datadir
            ))?;
            overrides.push(format!("datadir={dd}"));
        }
        if let Some(endpoint) = &self.endpoint {
            overrides.push(format!("chain.endpoint={endpoint}"));
        }

        Ok(overrides)
    }
}

type Override = (String, toml::Value);

/// Parses an override. This first splits the string by '=' to get key and
/// value and then splits the key by '.' which is the update path.
pub(crate) fn parse_override(override_str: &str) -> Result<Override, ConfigError> {
    let (key, value_str) = override_str
        .split_once('=')
        .ok_or(ConfigError::InvalidOverride(override_str.to_string()))?;
    Ok((key.to_string(), parse_value(value_str)))
}

/// Apply override to config. Missing intermediate tables are created, since
/// whole sections of the config may be left to their defaults.
pub(crate) fn apply_override(
    path: &str,
    value: toml::Value,
    table: &mut Table,
) -> Result<(), ConfigError> {
    match path.split_once('.') {
        None => {
            table.insert(path.to_string(), value);
            Ok(())
        }
        Some((key, rest)) => {
            let entry = table
                .entry(key.to_string())
                .or_insert(toml::Value::Table(Table::new()));
            match entry.as_table_mut() {
                Some(t) => apply_override(rest, value, t),
                None => Err(ConfigError::TraverseNonTableAt(key.to_string())),
            }
        }
    }
}

/// Parses a string into a toml value. First tries as `i64`, then as `bool` and then defaults to
/// `String`.
fn parse_value(str_value: &str) -> toml::Value {
    str_value
        .parse::<i64>()
        .map(toml::Value::Integer)
        .or_else(|_| str_value.parse::<bool>().map(toml::Value::Boolean))
        .unwrap_or_else(|_| toml::Value::String(str_value.to_string()))
}
