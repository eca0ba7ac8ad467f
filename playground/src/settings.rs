use crate::error::{Error, Result};
use lockbox_addresses::Prefix;
use lockbox_consensus_core::constants::DEFAULT_DUST_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

pub const DEFAULT_FEE_RATE: f64 = 0.5;

/// Transaction construction settings, loadable from a TOML file:
///
/// ```toml
/// network = "testnet"
/// fee-rate = 1.0
/// dust-threshold = 546
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    pub network: Prefix,
    /// Satoshis per byte
    pub fee_rate: f64,
    /// Change below this value is left to the fee, unlock outputs below it are refused
    pub dust_threshold: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self { network: Prefix::Mainnet, fee_rate: DEFAULT_FEE_RATE, dust_threshold: DEFAULT_DUST_THRESHOLD }
    }
}

impl Settings {
    pub fn from_toml(config: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(config).map_err(|err| Error::Settings(err.message().to_string()))?;
        settings.validated()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = fs::read_to_string(path).map_err(|err| Error::Settings(format!("{}: {err}", path.display())))?;
        Self::from_toml(&config)
    }

    pub fn with_fee_rate(self, fee_rate: f64) -> Result<Self> {
        Self { fee_rate, ..self }.validated()
    }

    fn validated(self) -> Result<Self> {
        if !self.fee_rate.is_finite() || self.fee_rate < 0.0 {
            return Err(Error::FeeRate(self.fee_rate));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml() {
        let settings = Settings::from_toml("network = \"testnet\"\nfee-rate = 1.5\n").unwrap();
        assert_eq!(settings, Settings { network: Prefix::Testnet, fee_rate: 1.5, dust_threshold: DEFAULT_DUST_THRESHOLD });
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn test_from_toml_errors() {
        assert!(matches!(Settings::from_toml("feerate = 1.0"), Err(Error::Settings(_))));
        assert!(matches!(Settings::from_toml("network = \"regtest\""), Err(Error::Settings(_))));
        assert!(matches!(Settings::from_toml("fee-rate = -1.0"), Err(Error::FeeRate(_))));
        assert!(matches!(Settings::default().with_fee_rate(f64::NAN), Err(Error::FeeRate(_))));
    }
}
