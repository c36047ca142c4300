use crate::core::errors::ConfigError;
use std::env;
use tracing::Level;

/// Default candidate models, most-preferred first. Order is a strict
/// priority: the captioner walks this list top to bottom.
const DEFAULT_CAPTION_MODELS: &[&str] = &[
    "anthropic.claude-3-5-sonnet-20240620-v1:0",
    "anthropic.claude-3-sonnet-20240229-v1:0",
    "anthropic.claude-3-haiku-20240307-v1:0",
];

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// Object store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub bucket: String,
    /// Key prefix under which caption-able images live
    pub object_path: String,
    pub timeout_seconds: u64,
}

/// Working area configuration
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    pub root: String,
}

/// Caption invocation configuration
#[derive(Debug, Clone)]
pub struct CaptionConfig {
    pub models: Vec<String>,
    pub api_url: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub workspace: WorkspaceConfig,
    pub caption: CaptionConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Result<Self, ConfigError> {
        // Parse log level
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        let models = env::var("CAPTION_MODELS")
            .ok()
            .map(|raw| parse_model_list(&raw))
            .unwrap_or_else(|| {
                DEFAULT_CAPTION_MODELS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        Ok(Self {
            server: ServerConfig {
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8080),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
            },
            store: StoreConfig {
                base_url: env::var("STORE_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:9000".to_string()),
                bucket: env::var("STORE_BUCKET")
                    .unwrap_or_else(|_| "gallery-images".to_string()),
                object_path: env::var("STORE_OBJECT_PATH")
                    .unwrap_or_else(|_| "images/face-image/".to_string()),
                timeout_seconds: env::var("STORE_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            workspace: WorkspaceConfig {
                root: env::var("WORKSPACE_ROOT").unwrap_or_else(|_| "workspace".to_string()),
            },
            caption: CaptionConfig {
                models,
                api_url: env::var("CAPTION_API_URL")
                    .unwrap_or_else(|_| "http://localhost:8443".to_string()),
                max_tokens: env::var("CAPTION_MAX_TOKENS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
                timeout_seconds: env::var("CAPTION_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            },
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidServerConfig(
                "port must be > 0".to_string(),
            ));
        }
        if self.store.base_url.is_empty() {
            return Err(ConfigError::InvalidStoreConfig(
                "base URL must not be empty".to_string(),
            ));
        }
        if self.store.bucket.is_empty() {
            return Err(ConfigError::InvalidStoreConfig(
                "bucket must not be empty".to_string(),
            ));
        }
        if self.workspace.root.is_empty() {
            return Err(ConfigError::InvalidWorkspaceRoot(
                "workspace root must not be empty".to_string(),
            ));
        }
        if self.caption.max_tokens == 0 {
            return Err(ConfigError::InvalidCaptionConfig(
                "max_tokens must be > 0".to_string(),
            ));
        }
        // An empty model list is deliberately NOT rejected here: the
        // captioner reports it as a distinct misconfiguration outcome
        // at invoke time.
        Ok(())
    }

    // Accessor methods
    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn store_base_url(&self) -> &str {
        &self.store.base_url
    }

    pub fn bucket(&self) -> &str {
        &self.store.bucket
    }

    pub fn object_path(&self) -> &str {
        &self.store.object_path
    }

    pub fn workspace_root(&self) -> &str {
        &self.workspace.root
    }

    pub fn caption_models(&self) -> &[String] {
        &self.caption.models
    }

    pub fn caption_api_url(&self) -> &str {
        &self.caption.api_url
    }

    pub fn caption_max_tokens(&self) -> u32 {
        self.caption.max_tokens
    }
}

/// Split a comma-separated model list, trimming blanks.
///
/// An all-whitespace value yields an empty list, which the captioner
/// reports as a misconfiguration rather than quota exhaustion.
pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_list() {
        let models = parse_model_list("model-a, model-b ,model-c");
        assert_eq!(models, vec!["model-a", "model-b", "model-c"]);
    }

    #[test]
    fn test_parse_model_list_empty() {
        assert!(parse_model_list("").is_empty());
        assert!(parse_model_list(" , ,").is_empty());
    }

    #[test]
    fn test_parse_model_list_preserves_order() {
        let models = parse_model_list("third,first,second");
        assert_eq!(models[0], "third");
        assert_eq!(models[2], "second");
    }
}
