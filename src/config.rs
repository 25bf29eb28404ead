use chrono::{FixedOffset, Offset, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::models::AlertPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub telegram: TelegramConfig,
    pub alerts: AlertsConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub user_agent: String,
    pub accept_language: String,
    /// Whole-request timeout in seconds. Expiry counts as an extraction failure.
    pub request_timeout: u64,
    pub connect_timeout: u64,
    pub max_concurrent_checks: usize,
    /// Pass-through fetch relay. When set, every page fetch goes through it.
    pub relay_url: Option<String>,
    pub relay_token: Option<String>,
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub api_base: String,
    pub bot_token: String,
    pub chat_id: String,
    /// Long-poll window for getUpdates, in seconds.
    pub poll_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    pub policy: AlertPolicy,
    pub utc_offset_minutes: i32,
    pub currency_symbol: String,
}

impl AlertsConfig {
    /// Offset used for timestamps shown to users.
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or(Utc.fix())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub cron: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub directory: Option<String>,
    pub file_prefix: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "WATCHER_"
            .add_source(Environment::with_prefix("WATCHER").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.database.url.starts_with("sqlite:") {
            return Err(ConfigError::Message("Database url must be a sqlite: url".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if self.scraper.request_timeout == 0 || self.scraper.connect_timeout == 0 {
            return Err(ConfigError::Message("Scraper timeouts must be greater than 0".into()));
        }

        if self.scraper.max_concurrent_checks == 0 {
            return Err(ConfigError::Message("Scraper max_concurrent_checks must be greater than 0".into()));
        }

        if let Some(relay) = &self.scraper.relay_url {
            if Url::parse(relay).is_err() {
                return Err(ConfigError::Message("Invalid relay_url format".into()));
            }
        }

        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::Message("Telegram bot_token is required".into()));
        }

        if self.telegram.chat_id.trim().is_empty() {
            return Err(ConfigError::Message("Telegram chat_id is required".into()));
        }

        if Url::parse(&self.telegram.api_base).is_err() {
            return Err(ConfigError::Message("Invalid telegram api_base format".into()));
        }

        if self.alerts.utc_offset_minutes.abs() > 14 * 60 {
            return Err(ConfigError::Message("Alerts utc_offset_minutes must be within +/-14h".into()));
        }

        if !is_valid_cron(&self.scheduler.cron) {
            return Err(ConfigError::Message("Invalid cron expression in scheduler.cron".into()));
        }

        Ok(())
    }
}

/// Five fields: minute hour day month weekday, with Sunday as 0 or 7.
/// Checked with the same parser the scheduler uses.
pub fn is_valid_cron(cron_expr: &str) -> bool {
    job_cron(cron_expr).is_some_and(|expr| cron::Schedule::from_str(&expr).is_ok())
}

/// Rewrites a five-field expression into the six-field form the job
/// scheduler runs: a zero seconds field in front, weekdays numbered 1-7
/// from Sunday.
pub fn job_cron(cron_expr: &str) -> Option<String> {
    let fields: Vec<&str> = cron_expr.split_whitespace().collect();
    let &[minute, hour, day, month, weekday] = fields.as_slice() else {
        return None;
    };

    let weekday = if weekday == "*" {
        weekday.to_string()
    } else {
        let mut days = BTreeSet::new();
        for item in weekday.split(',') {
            days.extend(weekday_item(item)?);
        }
        days.iter().map(|d| (d + 1).to_string()).collect::<Vec<_>>().join(",")
    };
    Some(format!("0 {} {} {} {} {}", minute, hour, day, month, weekday))
}

/// Expands one weekday list item (`3`, `1-5`, `*/2`, `0-6/3`) to days 0-6.
fn weekday_item(item: &str) -> Option<Vec<u8>> {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => (range, step.parse::<usize>().ok().filter(|s| *s > 0)?),
        None => (item, 1),
    };
    let (low, high): (u8, u8) = match range.split_once('-') {
        _ if range == "*" => (0, 7),
        Some((low, high)) => (low.parse().ok()?, high.parse().ok()?),
        None => {
            let day = range.parse().ok()?;
            (day, if step > 1 { 7 } else { day })
        }
    };
    if low > high || high > 7 {
        return None;
    }
    Some((low..=high).step_by(step).map(|d| d % 7).collect())
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        scraper: ScraperConfig {
            user_agent: "TestAgent/1.0".to_string(),
            accept_language: "en-IN,en;q=0.9".to_string(),
            request_timeout: 5,
            connect_timeout: 2,
            max_concurrent_checks: 2,
            relay_url: None,
            relay_token: None,
        },
        telegram: TelegramConfig {
            api_base: "https://api.telegram.org".to_string(),
            bot_token: "123:abc".to_string(),
            chat_id: "42".to_string(),
            poll_timeout: 0,
        },
        alerts: AlertsConfig {
            policy: AlertPolicy::EveryCycle,
            utc_offset_minutes: 330,
            currency_symbol: "₹".to_string(),
        },
        scheduler: SchedulerConfig {
            cron: "0 * * * *".to_string(),
        },
        logging: LoggingConfig {
            directory: None,
            file_prefix: "watcher.log".to_string(),
        },
    }
}
