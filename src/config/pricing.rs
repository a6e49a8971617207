//! Pricing rules loading from config.toml
//!
//! The numeric rules of the pricing decision (base premium price, free text quota and
//! referrals needed per credit) live here so deployments can tune them without a rebuild.
//! Every field has a default, so an empty or missing file reproduces the stock rules.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Standard premium price in whole Kenyan Shillings.
pub const DEFAULT_BASE_PRICE: u64 = 130;
/// Number of text moments a user may create for free (watermarked).
pub const DEFAULT_FREE_TEXT_QUOTA: u64 = 10;
/// Completed referrals needed to earn one free premium credit.
pub const DEFAULT_REFERRALS_PER_CREDIT: u64 = 3;

const DEFAULT_SHARE_BASE_URL: &str = "https://rania.app/m";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Pricing and entitlement rules
    pub pricing: PricingConfig,
    /// Prefix for shareable moment links
    pub share_base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pricing: PricingConfig::default(),
            share_base_url: DEFAULT_SHARE_BASE_URL.to_string(),
        }
    }
}

/// Numeric rules consumed by the pricing decision and the referral bonus recompute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Price charged on the paid path when no discount is active
    pub base_price: u64,
    /// Text moments a user may create before text stops being free
    pub free_text_quota: u64,
    /// Completed referrals per earned free premium credit
    pub referrals_per_credit: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_price: DEFAULT_BASE_PRICE,
            free_text_quota: DEFAULT_FREE_TEXT_QUOTA,
            referrals_per_credit: DEFAULT_REFERRALS_PER_CREDIT,
        }
    }
}

impl PricingConfig {
    /// Rejects rule sets the engine cannot evaluate.
    ///
    /// # Errors
    /// Returns `Error::Config` if `referrals_per_credit` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.referrals_per_credit == 0 {
            return Err(Error::Config {
                message: "pricing.referrals_per_credit must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Parses and validates configuration from a TOML string.
///
/// # Errors
/// Returns `Error::Config` if the TOML is malformed or the rules are inconsistent.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.pricing.validate()?;
    Ok(config)
}

/// Loads configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - `pricing.referrals_per_credit` is zero
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads configuration from the default location (./config.toml), falling back to the
/// built-in defaults when the file does not exist.
pub fn load_default_config() -> Result<AppConfig> {
    if Path::new("config.toml").exists() {
        load_config("config.toml")
    } else {
        tracing::warn!("config.toml not found, using default pricing rules");
        Ok(AppConfig::default())
    }
}
