use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::services::bidding::BiddingConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub database_url: String,

    pub jwt_secret: String,

    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry_seconds: u64,

    // Auth settings - set to true to disable JWT verification
    #[serde(default)]
    pub auth_disabled: bool,

    // Bidding engine settings (decimals carried as strings, parsed on use)
    #[serde(default = "default_minimum_bid_amount")]
    pub minimum_bid_amount: String,

    #[serde(default = "default_maximum_bid_amount")]
    pub maximum_bid_amount: String,

    #[serde(default = "default_compensation_percent")]
    pub compensation_percent: String,

    #[serde(default = "default_eligibility_window_days")]
    pub eligibility_window_days: i64,

    #[serde(default = "default_max_rounds")]
    pub default_max_rounds: i32,

    #[serde(default = "default_round_duration_seconds")]
    pub default_round_duration_seconds: i64,

    #[serde(default = "default_minimum_increment_percent")]
    pub default_minimum_increment_percent: String,

    // Expiration sweep settings
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_jwt_expiry() -> u64 {
    86400 // 24 hours
}

fn default_minimum_bid_amount() -> String {
    "50".to_string()
}

fn default_maximum_bid_amount() -> String {
    "10000".to_string()
}

fn default_compensation_percent() -> String {
    "25".to_string()
}

fn default_eligibility_window_days() -> i64 {
    30
}

fn default_max_rounds() -> i32 {
    3
}

fn default_round_duration_seconds() -> i64 {
    3600 // 1 hour per round
}

fn default_minimum_increment_percent() -> String {
    "10".to_string()
}

fn default_sweep_interval() -> u64 {
    60
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }

    /// Check if auth is disabled (for development)
    pub fn is_auth_disabled(&self) -> bool {
        self.auth_disabled
    }

    /// Materialize the bidding engine configuration. Unparseable decimal
    /// strings fall back to the engine defaults.
    pub fn bidding_config(&self) -> BiddingConfig {
        let defaults = BiddingConfig::default();
        BiddingConfig {
            minimum_bid_amount: parse_decimal(&self.minimum_bid_amount)
                .unwrap_or(defaults.minimum_bid_amount),
            maximum_bid_amount: parse_decimal(&self.maximum_bid_amount)
                .unwrap_or(defaults.maximum_bid_amount),
            compensation_percent: parse_decimal(&self.compensation_percent)
                .unwrap_or(defaults.compensation_percent),
            eligibility_window_days: self.eligibility_window_days,
            default_max_rounds: self.default_max_rounds,
            default_round_duration_seconds: self.default_round_duration_seconds,
            default_minimum_increment_percent: parse_decimal(
                &self.default_minimum_increment_percent,
            )
            .unwrap_or(defaults.default_minimum_increment_percent),
        }
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    match Decimal::from_str(s.trim()) {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!("Invalid decimal config value '{}': {}", s, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> AppConfig {
        AppConfig {
            environment: default_environment(),
            port: default_port(),
            database_url: "postgres://localhost/bidding".to_string(),
            jwt_secret: "test".to_string(),
            jwt_expiry_seconds: default_jwt_expiry(),
            auth_disabled: true,
            minimum_bid_amount: default_minimum_bid_amount(),
            maximum_bid_amount: default_maximum_bid_amount(),
            compensation_percent: default_compensation_percent(),
            eligibility_window_days: default_eligibility_window_days(),
            default_max_rounds: default_max_rounds(),
            default_round_duration_seconds: default_round_duration_seconds(),
            default_minimum_increment_percent: default_minimum_increment_percent(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }

    #[test]
    fn test_bidding_config_defaults() {
        let bidding = config().bidding_config();
        assert_eq!(bidding.minimum_bid_amount, dec!(50));
        assert_eq!(bidding.maximum_bid_amount, dec!(10000));
        assert_eq!(bidding.compensation_percent, dec!(25));
        assert_eq!(bidding.default_max_rounds, 3);
    }

    #[test]
    fn test_bidding_config_bad_decimal_falls_back() {
        let mut cfg = config();
        cfg.compensation_percent = "not-a-number".to_string();
        let bidding = cfg.bidding_config();
        assert_eq!(bidding.compensation_percent, dec!(25));
    }
}
