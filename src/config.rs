//! Environment-driven configuration.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::services::ShippingRates;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub log_level: String,
    pub nats_url: Option<String>,
    pub currency: String,
    pub db_max_connections: u32,
    pub shipping_rates: ShippingRates,
}

/// Loads `.env` (if present) and then reads the process environment.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_app_config(|key| std::env::var(key))
}

/// Parsing and validation, independent of the real environment.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| lookup(var).unwrap_or_else(|_| default.to_string());
    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar { var: var.to_string(), reason };

    let database_url = lookup("DATABASE_URL").map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".into()))?;
    let port = or_default("PORT", "8083").parse::<u16>().map_err(|e| invalid("PORT", e.to_string()))?;
    let db_max_connections = or_default("CART_DB_MAX_CONNECTIONS", "10")
        .parse::<u32>()
        .map_err(|e| invalid("CART_DB_MAX_CONNECTIONS", e.to_string()))?;
    let currency = or_default("CART_CURRENCY", "XOF").trim().to_uppercase();
    if currency.len() != 3 {
        return Err(invalid("CART_CURRENCY", format!("`{currency}` is not an ISO 4217 code")));
    }
    let shipping_rates = parse_shipping_rates(&or_default("CART_SHIPPING_RATES", "standard=1000,express=2500,pickup=0"))
        .map_err(|reason| invalid("CART_SHIPPING_RATES", reason))?;

    Ok(AppConfig {
        database_url,
        port,
        log_level: or_default("CART_LOG_LEVEL", "info"),
        nats_url: lookup("NATS_URL").ok().filter(|url| !url.trim().is_empty()),
        currency,
        db_max_connections,
        shipping_rates,
    })
}

/// Parses `method=price` pairs separated by commas.
pub fn parse_shipping_rates(raw: &str) -> Result<ShippingRates, String> {
    let mut rates = Vec::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (method, price) = pair.split_once('=').ok_or_else(|| format!("`{pair}` is not method=price"))?;
        let method = method.trim();
        if method.is_empty() { return Err(format!("`{pair}` has no method name")); }
        let price: Decimal = price.trim().parse().map_err(|e| format!("`{pair}`: {e}"))?;
        if price.is_sign_negative() { return Err(format!("`{pair}`: price is negative")); }
        rates.push((method.to_string(), price));
    }
    Ok(ShippingRates::new(rates))
}
