use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tripsmith_planner::DEFAULT_GEMINI_MODEL;

pub const DEFAULT_BIND: &str = "0.0.0.0:3001";
pub const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:5173";
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Startup settings read from `TRIPSMITH_*` environment variables.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub database_url: Option<String>,
    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: Option<String>,
    /// Canned model answer served when no API key is configured.
    pub offline_response: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
    pub allow_vercel_previews: bool,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub generation_attempts: u32,
    pub evening_anchors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            google_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: None,
            offline_response: None,
            allowed_origins: vec![DEFAULT_FRONTEND_ORIGIN.to_string()],
            allow_vercel_previews: true,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 30,
            generation_attempts: 3,
            evening_anchors: false,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut allowed_origins = defaults.allowed_origins;
        if let Some(origin) = non_empty_var("TRIPSMITH_FRONTEND_ORIGIN") {
            let origin = origin.trim_end_matches('/').to_string();
            if !allowed_origins.contains(&origin) {
                allowed_origins.push(origin);
            }
        }

        Self {
            database_url: non_empty_var("TRIPSMITH_DATABASE_URL"),
            google_api_key: non_empty_var("TRIPSMITH_GOOGLE_API_KEY")
                .or_else(|| non_empty_var("GOOGLE_API_KEY")),
            gemini_model: non_empty_var("TRIPSMITH_GEMINI_MODEL")
                .unwrap_or(defaults.gemini_model),
            gemini_base_url: non_empty_var("TRIPSMITH_GEMINI_BASE_URL"),
            offline_response: non_empty_var("TRIPSMITH_OFFLINE_RESPONSE").map(PathBuf::from),
            allowed_origins,
            allow_vercel_previews: env_flag(
                "TRIPSMITH_ALLOW_VERCEL_PREVIEWS",
                defaults.allow_vercel_previews,
            ),
            rate_limit_window: parsed_var("TRIPSMITH_RATE_LIMIT_WINDOW_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            rate_limit_max: parsed_var("TRIPSMITH_RATE_LIMIT_MAX")
                .unwrap_or(defaults.rate_limit_max),
            generation_attempts: parsed_var("TRIPSMITH_GENERATION_ATTEMPTS")
                .unwrap_or(defaults.generation_attempts),
            evening_anchors: env_flag("TRIPSMITH_EVENING_ANCHORS", defaults.evening_anchors),
        }
    }

    /// Exact match against the configured origins, plus `https://*.vercel.app`
    /// preview deployments when enabled.
    pub fn origin_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim().trim_end_matches('/');
        if self.allowed_origins.iter().any(|allowed| allowed == origin) {
            return true;
        }

        self.allow_vercel_previews
            && origin
                .strip_prefix("https://")
                .and_then(|host| host.strip_suffix(".vercel.app"))
                .is_some_and(|sub| !sub.is_empty() && !sub.contains('/'))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    non_empty_var(name).and_then(|value| value.parse::<T>().ok())
}

fn env_flag(name: &str, default: bool) -> bool {
    match non_empty_var(name).map(|value| value.to_ascii_lowercase()) {
        Some(value) if matches!(value.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(value) if matches!(value.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vercel_previews_and_configured_origins_pass() {
        let config = ApiConfig::default();
        assert!(config.origin_allowed("http://localhost:5173"));
        assert!(config.origin_allowed("https://tripsmith-git-main.vercel.app"));
        assert!(!config.origin_allowed("https://vercel.app"));
        assert!(!config.origin_allowed("http://tripsmith.vercel.app"));
        assert!(!config.origin_allowed("https://evil.example.com"));

        let strict = ApiConfig {
            allow_vercel_previews: false,
            ..ApiConfig::default()
        };
        assert!(!strict.origin_allowed("https://tripsmith.vercel.app"));
    }
}
