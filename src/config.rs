//! Process-wide configuration read from the environment: read, trim,
//! lower-case, clamp, and fall back to a documented default rather than
//! failing.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub verify_ssl: bool,
    pub api_football_key: Option<String>,
    pub model_default_window_years: u32,

    pub ia_request_timeout: Duration,
    pub ia_league_timeout: Duration,
    pub ia_min_request_gap: Duration,
    pub ia_rate_limit_backoff: Duration,

    pub pp_fixture_timeout: Duration,
    pub ap_max_seasons: usize,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            verify_ssl: env_bool("VERIFY_SSL", true),
            api_football_key: env::var("API_FOOTBALL_KEY")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            model_default_window_years: env_usize("MODEL_DEFAULT_WINDOW_YEARS", 3).clamp(2, 4)
                as u32,

            ia_request_timeout: Duration::from_secs(env_u64("IA_REQUEST_TIMEOUT_SECS", 30)),
            ia_league_timeout: Duration::from_secs(env_u64("IA_LEAGUE_TIMEOUT_SECS", 600)),
            ia_min_request_gap: Duration::from_secs(env_u64("IA_MIN_REQUEST_GAP_SECS", 6)),
            ia_rate_limit_backoff: Duration::from_secs(env_u64("IA_RATE_LIMIT_BACKOFF_SECS", 60)),

            pp_fixture_timeout: Duration::from_secs(env_u64("PP_FIXTURE_TIMEOUT_SECS", 5)),
            ap_max_seasons: env_usize("AP_MAX_SEASONS", 7),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_env_absent() {
        // SAFETY: test-only env mutation, no concurrent readers in this test binary.
        unsafe {
            env::remove_var("MODEL_DEFAULT_WINDOW_YEARS");
        }
        let cfg = EngineConfig::from_env();
        assert_eq!(cfg.model_default_window_years, 3);
        assert!(cfg.verify_ssl);
    }
}
