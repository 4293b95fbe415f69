use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// How far ahead of a slot's start time bookings, reschedules and
    /// patient cancellations must arrive, in hours.
    pub modification_lead_time_hours: i64,
    /// How early a patient may check in before the slot start, in minutes.
    pub checkin_grace_minutes: i64,
    /// Bounded retry budget for reserve/release when the versioned
    /// slot update loses a race.
    pub reserve_max_retries: u32,
    pub bind_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            modification_lead_time_hours: parse_var("MODIFICATION_LEAD_TIME_HOURS", 2),
            checkin_grace_minutes: parse_var("CHECKIN_GRACE_MINUTES", 15),
            reserve_max_retries: parse_var("RESERVE_MAX_RETRIES", 3),
            bind_port: parse_var("BIND_PORT", 3000),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            modification_lead_time_hours: 2,
            checkin_grace_minutes: 15,
            reserve_max_retries: 3,
            bind_port: 3000,
        }
    }
}

fn parse_var<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.modification_lead_time_hours, 2);
        assert_eq!(config.checkin_grace_minutes, 15);
        assert_eq!(config.reserve_max_retries, 3);
    }
}
