use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::services::llm_provider::{normalize_endpoint, LLMConfig};
use crate::tutor::TutorConfig;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LLM_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    /// Daily rolling log files are written here when set.
    pub file_dir: Option<PathBuf>,
}

/// Everything the service reads at startup, resolved once.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub tutor: TutorConfig,
    pub llm: LLMConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unset, blank or
    /// unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let parse = |key: &str| get(key).and_then(|v| v.parse::<f64>().ok()).filter(|v| v.is_finite());

        let server = ServerConfig {
            host: parsed(get("HOST")).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            port: parsed(get("PORT")).unwrap_or(DEFAULT_PORT),
        };

        let file_logs = get("ENABLE_FILE_LOGS").is_some_and(|v| v == "true" || v == "1");
        let logging = LoggingConfig {
            level: get("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            file_dir: file_logs
                .then(|| PathBuf::from(get("LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()))),
        };

        let mut tutor = TutorConfig::default();
        if let Some(val) = parse("TUTOR_MASTERY_THRESHOLD") {
            tutor.bkt.mastery_threshold = val.clamp(0.5, 0.99);
        }
        if let Some(val) = parsed(get("TUTOR_MAX_SKILLS_PER_SESSION")) {
            tutor.scaffold.max_skills_per_session = val;
        }
        if let Some(val) = parse("TUTOR_RETRIEVAL_SPACING_HOURS") {
            tutor.scheduler.retrieval_spacing_hours = val.max(0.0);
        }
        if let Some(val) = parse("TUTOR_ASSESSMENT_MIN_MINUTES") {
            tutor.assessment.min_minutes_between = val.max(0.0);
        }
        if let Some(val) = parsed(get("TUTOR_MAX_ATTEMPT_DURATION_MS")) {
            tutor.exploration.max_attempt_duration_ms = val;
        }
        if let Some(val) = get("TUTOR_LLM_ENABLED") {
            tutor.llm.enabled = val.parse().unwrap_or(true);
        }
        if let Some(val) = parsed(get("TUTOR_LLM_TIMEOUT_MS")) {
            tutor.llm.timeout_ms = val;
        }

        let llm = LLMConfig {
            api_key: get("LLM_API_KEY"),
            model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            api_endpoint: normalize_endpoint(
                get("LLM_API_ENDPOINT").unwrap_or_else(|| DEFAULT_LLM_ENDPOINT.to_string()),
            ),
            timeout: Duration::from_millis(
                parsed(get("LLM_TIMEOUT")).unwrap_or(DEFAULT_LLM_TIMEOUT_MS),
            ),
        };

        Self {
            server,
            logging,
            tutor,
            llm,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}

fn parsed<T: FromStr>(value: Option<String>) -> Option<T> {
    value?.parse().ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]);
        assert_eq!(config.bind_addr(), "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file_dir.is_none());
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.llm.api_endpoint, "https://api.openai.com/v1");
        assert_eq!(
            config.tutor.exploration.max_attempt_duration_ms,
            TutorConfig::default().exploration.max_attempt_duration_ms
        );
    }

    #[test]
    fn tutor_overrides_are_clamped() {
        let config = config_from(&[
            ("TUTOR_MASTERY_THRESHOLD", "1.5"),
            ("TUTOR_RETRIEVAL_SPACING_HOURS", "-3"),
            ("TUTOR_MAX_ATTEMPT_DURATION_MS", "60000"),
            ("TUTOR_LLM_ENABLED", "false"),
        ]);
        assert_eq!(config.tutor.bkt.mastery_threshold, 0.99);
        assert_eq!(config.tutor.scheduler.retrieval_spacing_hours, 0.0);
        assert_eq!(config.tutor.exploration.max_attempt_duration_ms, 60_000);
        assert!(!config.tutor.llm.enabled);
    }

    #[test]
    fn blank_and_malformed_values_fall_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("RUST_LOG", "   "),
            ("LLM_API_KEY", " "),
            ("TUTOR_MASTERY_THRESHOLD", "NaN"),
        ]);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.level, "info");
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.tutor.bkt.mastery_threshold, TutorConfig::default().bkt.mastery_threshold);
    }

    #[test]
    fn file_logging_and_llm_settings_are_read() {
        let config = config_from(&[
            ("ENABLE_FILE_LOGS", "1"),
            ("LOG_DIR", "/var/log/tutor"),
            ("LLM_API_KEY", "sk-test"),
            ("LLM_API_ENDPOINT", "http://localhost:8080/"),
            ("LLM_TIMEOUT", "1500"),
        ]);
        assert_eq!(config.logging.file_dir, Some(PathBuf::from("/var/log/tutor")));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.api_endpoint, "http://localhost:8080/v1");
        assert_eq!(config.llm.timeout, Duration::from_millis(1500));
    }
}
