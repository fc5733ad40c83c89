use std::env;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Upper bound for every hour-based setting (one year).
const MAX_HOURS: i64 = 24 * 365;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub account_token_ttl_hours: i64,
    pub require_account_activation: bool,
    pub public_base_url: String,
    pub reminder_lead_hours: i64,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Optional values that fail to
    /// parse fall back to their defaults; hour settings are clamped to a year.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let session_ttl_hours = parse_or(&lookup, "SESSION_TTL_HOURS", 24_i64).clamp(1, MAX_HOURS);
        let account_token_ttl_hours =
            parse_or(&lookup, "ACCOUNT_TOKEN_TTL_HOURS", 24_i64).clamp(1, MAX_HOURS);
        let reminder_lead_hours = parse_or(&lookup, "REMINDER_LEAD_HOURS", 24_i64).clamp(0, MAX_HOURS);
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES);

        let require_account_activation = lookup("REQUIRE_ACCOUNT_ACTIVATION")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let public_base_url = lookup("PUBLIC_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://{bind_addr}"));

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            account_token_ttl_hours,
            require_account_activation,
            public_base_url,
            reminder_lead_hours,
            max_upload_bytes,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let cfg = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/clinic")]))
            .unwrap();

        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");
        assert_eq!(cfg.session_ttl_hours, 24);
        assert_eq!(cfg.reminder_lead_hours, 24);
        assert_eq!(cfg.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(!cfg.require_account_activation);
        assert_eq!(cfg.public_base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn missing_database_url_is_an_error() {
        assert!(Config::from_lookup(lookup_from(&[])).is_err());
    }

    #[test]
    fn bad_numbers_fall_back_and_flags_parse() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/clinic"),
            ("SESSION_TTL_HOURS", "soon"),
            ("REMINDER_LEAD_HOURS", "48"),
            ("REQUIRE_ACCOUNT_ACTIVATION", "TRUE"),
            ("PUBLIC_BASE_URL", "https://clinic.example.com/"),
        ]))
        .unwrap();

        assert_eq!(cfg.session_ttl_hours, 24);
        assert_eq!(cfg.reminder_lead_hours, 48);
        assert!(cfg.require_account_activation);
        assert_eq!(cfg.public_base_url, "https://clinic.example.com");
    }

    #[test]
    fn hour_settings_are_clamped() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/clinic"),
            ("SESSION_TTL_HOURS", "9223372036854775807"),
            ("ACCOUNT_TOKEN_TTL_HOURS", "0"),
            ("REMINDER_LEAD_HOURS", "-5"),
        ]))
        .unwrap();

        assert_eq!(cfg.session_ttl_hours, MAX_HOURS);
        assert_eq!(cfg.account_token_ttl_hours, 1);
        assert_eq!(cfg.reminder_lead_hours, 0);
    }
}
