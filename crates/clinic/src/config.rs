//! Clinic configuration loaded from environment variables.

use std::str::FromStr;

use domain::QrSettings;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Clinic configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `CLINIC_LABEL`: label embedded in QR payloads (default: `"Veterinary Clinic"`)
/// - `QR_VALIDITY_HOURS`: lifetime of a QR instruction, at most one year (default: `24`)
/// - `NEAR_EXPIRY_DAYS`: window for near-expiry alerts (default: `30`)
/// - `COMMAND_RETRIES`: attempts per workflow on a write conflict (default: `3`)
/// - `DATABASE_URL`: Postgres connection string; in-memory store when unset
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
#[derive(Debug, Clone)]
pub struct ClinicConfig {
    pub clinic_label: String,
    pub qr_validity_hours: i64,
    pub near_expiry_days: u32,
    pub command_retries: u32,
    pub database_url: Option<String>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl ClinicConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source. Unparseable
    /// values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            clinic_label: lookup("CLINIC_LABEL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.clinic_label),
            qr_validity_hours: parse_var(&lookup, "QR_VALIDITY_HOURS")
                .filter(|h: &i64| (1..=QrSettings::MAX_VALIDITY_HOURS).contains(h))
                .unwrap_or(defaults.qr_validity_hours),
            near_expiry_days: parse_var(&lookup, "NEAR_EXPIRY_DAYS")
                .unwrap_or(defaults.near_expiry_days),
            command_retries: parse_var(&lookup, "COMMAND_RETRIES")
                .filter(|r: &u32| *r > 0)
                .unwrap_or(defaults.command_retries),
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
        }
    }

    pub fn qr_settings(&self) -> QrSettings {
        QrSettings::new(self.clinic_label.clone(), self.qr_validity_hours)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            clinic_label: "Veterinary Clinic".to_string(),
            qr_validity_hours: 24,
            near_expiry_days: 30,
            command_retries: 3,
            database_url: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = ClinicConfig::from_lookup(lookup(&[]));
        assert_eq!(config.clinic_label, "Veterinary Clinic");
        assert_eq!(config.qr_validity_hours, 24);
        assert_eq!(config.near_expiry_days, 30);
        assert_eq!(config.command_retries, 3);
        assert!(config.database_url.is_none());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let config = ClinicConfig::from_lookup(lookup(&[
            ("CLINIC_LABEL", "Northside Vets"),
            ("QR_VALIDITY_HOURS", "2"),
            ("NEAR_EXPIRY_DAYS", "60"),
            ("COMMAND_RETRIES", "5"),
            ("DATABASE_URL", "postgres://localhost/clinic"),
            ("LOG_FORMAT", "JSON"),
        ]));
        assert_eq!(config.clinic_label, "Northside Vets");
        assert_eq!(config.qr_validity_hours, 2);
        assert_eq!(config.near_expiry_days, 60);
        assert_eq!(config.command_retries, 5);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/clinic"));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ClinicConfig::from_lookup(lookup(&[
            ("QR_VALIDITY_HOURS", "-4"),
            ("COMMAND_RETRIES", "0"),
            ("NEAR_EXPIRY_DAYS", "soon"),
            ("LOG_FORMAT", "xml"),
            ("DATABASE_URL", "  "),
        ]));
        assert_eq!(config.qr_validity_hours, 24);
        assert_eq!(config.command_retries, 3);
        assert_eq!(config.near_expiry_days, 30);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_qr_validity_beyond_a_year_falls_back() {
        let config =
            ClinicConfig::from_lookup(lookup(&[("QR_VALIDITY_HOURS", "100000000000")]));
        assert_eq!(config.qr_validity_hours, 24);
        assert_eq!(config.qr_settings().validity, chrono::Duration::hours(24));
    }

    #[test]
    fn test_qr_settings_follow_config() {
        let config = ClinicConfig {
            clinic_label: "Northside Vets".to_string(),
            qr_validity_hours: 2,
            ..ClinicConfig::default()
        };
        let settings = config.qr_settings();
        assert_eq!(settings.clinic_label, "Northside Vets");
        assert_eq!(settings.validity, chrono::Duration::hours(2));
    }
}
