// Configuration constants for the server

use std::time::Duration;

#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    /// Directory holding `info.json`, `config.json` and the checkpoints.
    pub model_dir: String,
    /// Directory with the static browser UI.
    pub web_dir: String,
    /// Character limit for synthesis text; `None` disables the cap.
    pub text_limit: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8085,
            rate_limit_per_minute: 60,
            request_timeout_secs: 60,
            cors_allowed_origins: None,
            model_dir: "models".into(),
            web_dir: "server/web".into(),
            text_limit: Some(100),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let rate_limit_per_minute = std::env::var("RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.rate_limit_per_minute);

        let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.request_timeout_secs);

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| origins.split(',').map(|s| s.trim().to_string()).collect());

        let model_dir = std::env::var("MODEL_DIR").unwrap_or(defaults.model_dir);
        let web_dir = std::env::var("WEB_DIR").unwrap_or(defaults.web_dir);

        // TEXT_LIMIT=0 disables the cap
        let text_limit = match std::env::var("TEXT_LIMIT").ok().and_then(|v| v.parse::<usize>().ok()) {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.text_limit,
        };

        Self {
            port,
            rate_limit_per_minute,
            request_timeout_secs,
            cors_allowed_origins,
            model_dir,
            web_dir,
            text_limit,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn manifest_path(&self) -> String {
        format!("{}/info.json", self.model_dir)
    }

    pub fn hparams_path(&self) -> String {
        format!("{}/config.json", self.model_dir)
    }
}
