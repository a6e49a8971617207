/// Database configuration and connection management
pub mod database;

/// Pricing rules and application settings loaded from config.toml
pub mod pricing;
