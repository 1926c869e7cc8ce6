use std::fs;

use goliath_common::logging;
use goliath_config::Config;
use tokio::runtime::Handle;

use crate::{
    args::{apply_override, parse_override, Args, EnvArgs},
    errors::{ConfigError, InitError},
};

/// Loads the config file, then applies env overrides and then arg overrides
/// on top of it.
pub(crate) fn get_config(args: &Args, env: &EnvArgs) -> Result<Config, InitError> {
    let config_str = fs::read_to_string(&args.config)?;
    let mut overrides = env.get_overrides();
    overrides.extend(args.get_overrides()?);
    Ok(parse_config(&config_str, &overrides)?)
}

fn parse_config(config_str: &str, overrides: &[String]) -> Result<Config, ConfigError> {
    let mut toml: toml::Value = toml::from_str(config_str)?;
    let table = toml.as_table_mut().ok_or(ConfigError::NotATable)?;
    for o in overrides {
        let (path, val) = parse_override(o)?;
        apply_override(&path, val, table)?;
    }
    let config: Config = toml.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Sets up the logging system given a handle to a runtime context to possibly
/// start the OTLP output on.
pub(crate) fn init_logging(rt: &Handle) -> Result<(), InitError> {
    let lconfig = logging::LoggerConfig::from_env("goliath-executer");

    // The OTLP exporter spawns onto the runtime.
    let _g = rt.enter();
    logging::init(lconfig).map_err(|e| InitError::Other(e.into()))?;
    Ok(())
}
