use anyhow::{Context, Result};

const DEFAULT_HF_API_URL: &str = "https://router.huggingface.co/hf-inference/models";
const DEFAULT_HF_MODEL: &str = "facebook/bart-large-cnn";
const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub secret_key: String,
    pub access_token_expire_minutes: i64,
    pub port: u16,
    pub rust_log: String,
    pub run_migrations: bool,
    pub huggingface: ProviderConfig,
    pub gemini: ProviderConfig,
    pub admin_seed: Option<AdminSeed>,
}

/// Connection settings for one hosted model provider.
/// `api_key` is `None` when the provider is not configured.
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Clone)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let database_url = match get("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                require("POSTGRES_USER")?,
                require("POSTGRES_PASSWORD")?,
                get("POSTGRES_SERVER").unwrap_or_else(|| "localhost".to_string()),
                get("POSTGRES_PORT").unwrap_or_else(|| "5432".to_string()),
                get("POSTGRES_DB").unwrap_or_else(|| "school_management".to_string()),
            ),
        };

        let admin_seed = match (get("ADMIN_USERNAME"), get("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminSeed { username, password }),
            _ => None,
        };

        Ok(Config {
            database_url,
            secret_key: require("SECRET_KEY")?,
            access_token_expire_minutes: get("ACCESS_TOKEN_EXPIRE_MINUTES")
                .unwrap_or_else(|| "30".to_string())
                .parse::<i64>()
                .context("ACCESS_TOKEN_EXPIRE_MINUTES must be an integer")?,
            port: get("PORT")
                .unwrap_or_else(|| "8000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            run_migrations: get("RUN_MIGRATIONS")
                .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
            huggingface: ProviderConfig {
                api_key: get("HUGGINGFACE_API_TOKEN"),
                api_url: get("HUGGINGFACE_API_URL").unwrap_or_else(|| DEFAULT_HF_API_URL.to_string()),
                model: get("HUGGINGFACE_MODEL").unwrap_or_else(|| DEFAULT_HF_MODEL.to_string()),
            },
            gemini: ProviderConfig {
                api_key: get("GEMINI_API_KEY"),
                api_url: get("GEMINI_API_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_API_URL.to_string()),
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            },
            admin_seed,
        })
    }
}
