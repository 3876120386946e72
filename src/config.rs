use std::path::PathBuf;

use crate::limits::MAX_UPCOMING_DAYS;
use crate::planner::PlannerSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// JSON file with services, staff, schedules and appointments.
    pub seed_path: Option<PathBuf>,
    pub planner: PlannerSettings,
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid { var: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { var, value } => write!(f, "invalid value for {var}: {value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = PlannerSettings::default();

        let step_minutes = parse_or("SLOTWISE_STEP_MINUTES", &lookup, defaults.step_minutes)?;
        if step_minutes == 0 {
            return Err(invalid("SLOTWISE_STEP_MINUTES", "0"));
        }
        let upcoming_days = parse_or("SLOTWISE_UPCOMING_DAYS", &lookup, defaults.upcoming_days)?;
        if upcoming_days > MAX_UPCOMING_DAYS {
            return Err(invalid("SLOTWISE_UPCOMING_DAYS", &upcoming_days.to_string()));
        }
        let upcoming_per_day =
            parse_or("SLOTWISE_UPCOMING_PER_DAY", &lookup, defaults.upcoming_per_day)?;
        let metrics_port = match lookup("SLOTWISE_METRICS_PORT") {
            Some(raw) => Some(
                raw.parse()
                    .map_err(|_| invalid("SLOTWISE_METRICS_PORT", &raw))?,
            ),
            None => None,
        };

        Ok(Self {
            seed_path: lookup("SLOTWISE_SEED").map(PathBuf::from),
            planner: PlannerSettings {
                step_minutes,
                upcoming_days,
                upcoming_per_day,
            },
            metrics_port,
        })
    }
}

fn invalid(var: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(var, &raw)),
        None => Ok(default),
    }
}
