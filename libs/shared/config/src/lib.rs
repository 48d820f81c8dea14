use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_EDITING_GRACE_MINUTES: i64 = 5;
pub const DEFAULT_GRID_START_HOUR: u8 = 8;
pub const DEFAULT_GRID_END_HOUR: u8 = 20;
pub const DEFAULT_MAX_QUERY_DAYS: i64 = 62;
pub const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub server_port: u16,
    pub scheduling: SchedulingConfig,
}

/// Knobs for the availability engine and the booking-window guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingConfig {
    /// Minutes before start and after end during which an appointment stays editable.
    pub editing_grace_minutes: i64,
    pub grid_start_hour: u8,
    pub grid_end_hour: u8,
    pub max_query_days: i64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            editing_grace_minutes: DEFAULT_EDITING_GRACE_MINUTES,
            grid_start_hour: DEFAULT_GRID_START_HOUR,
            grid_end_hour: DEFAULT_GRID_END_HOUR,
            max_query_days: DEFAULT_MAX_QUERY_DAYS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            server_port: parse_or_default("SERVER_PORT", DEFAULT_SERVER_PORT),
            scheduling: SchedulingConfig::from_env(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let mut config = Self {
            editing_grace_minutes: parse_or_default("EDITING_GRACE_MINUTES", DEFAULT_EDITING_GRACE_MINUTES),
            grid_start_hour: parse_or_default("AVAILABILITY_GRID_START_HOUR", DEFAULT_GRID_START_HOUR),
            grid_end_hour: parse_or_default("AVAILABILITY_GRID_END_HOUR", DEFAULT_GRID_END_HOUR),
            max_query_days: parse_or_default("AVAILABILITY_MAX_QUERY_DAYS", DEFAULT_MAX_QUERY_DAYS),
        };

        if config.editing_grace_minutes < 0 {
            warn!("EDITING_GRACE_MINUTES is negative, using default");
            config.editing_grace_minutes = DEFAULT_EDITING_GRACE_MINUTES;
        }

        if config.grid_end_hour > 24 || config.grid_start_hour >= config.grid_end_hour {
            warn!(
                "Availability grid {}..{} is invalid, using default {}..{}",
                config.grid_start_hour, config.grid_end_hour, DEFAULT_GRID_START_HOUR, DEFAULT_GRID_END_HOUR
            );
            config.grid_start_hour = DEFAULT_GRID_START_HOUR;
            config.grid_end_hour = DEFAULT_GRID_END_HOUR;
        }

        if config.max_query_days < 1 {
            warn!("AVAILABILITY_MAX_QUERY_DAYS must be positive, using default");
            config.max_query_days = DEFAULT_MAX_QUERY_DAYS;
        }

        config
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has unparseable value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduling_defaults() {
        let config = SchedulingConfig::default();
        assert_eq!(config.editing_grace_minutes, 5);
        assert_eq!(config.grid_start_hour, 8);
        assert_eq!(config.grid_end_hour, 20);
        assert_eq!(config.max_query_days, 62);
    }

    #[test]
    fn test_parse_or_default_falls_back_when_missing() {
        let value: i64 = parse_or_default("SHARED_CONFIG_TEST_MISSING_KEY", 42);
        assert_eq!(value, 42);
    }
}
