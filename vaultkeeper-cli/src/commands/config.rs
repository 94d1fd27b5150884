//! `vaultkeeper config ...`: inspect and bootstrap the configuration
//! file (mirrors the teacher CLI's `config` subcommand).

use vaultkeeper_core::config::config_path;
use vaultkeeper_core::VaultConfig;

use crate::error::CliError;

pub(crate) fn run_show(config: &VaultConfig) -> Result<(), CliError> {
    let serialized = toml::to_string_pretty(config).map_err(|e| CliError::config(e.to_string()))?;
    print!("{serialized}");
    Ok(())
}

pub(crate) fn run_setup() -> Result<(), CliError> {
    let path = config_path();
    if path.exists() {
        log::info!("{} already exists, leaving it untouched", path.display());
        return Ok(());
    }
    VaultConfig::default().save(&path)?;
    log::info!("wrote default configuration to {}", path.display());
    Ok(())
}

pub(crate) fn run_path() -> Result<(), CliError> {
    println!("{}", config_path().display());
    Ok(())
}
