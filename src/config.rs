use config::ConfigError;
use secrecy::Secret;
use serde::Deserialize;

use crate::services::role_resolver::RosterConfig;

/// Optional file holding the `[school]` roster; email keys cannot be
/// expressed as environment variable names.
pub const CONFIG_FILE: &str = "hallpass";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub host: String,
    pub port: u16,

    // Pass and session storage; in-memory when absent
    pub database_url: Option<String>,

    // Google sign-in
    pub google: Option<GoogleConfig>,

    pub school: RosterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("school.admin_emails")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(&config)
    }

    pub fn from_config(config: &config::Config) -> Result<Self, ConfigError> {
        let google = match (
            config.get::<String>("google_client_id").ok(),
            config.get::<String>("google_client_secret").ok(),
        ) {
            (Some(client_id), Some(client_secret)) => Some(GoogleConfig {
                client_id,
                client_secret: Secret::new(client_secret),
            }),
            _ => None,
        };

        let school = match config.get::<RosterConfig>("school") {
            Ok(school) => school,
            Err(ConfigError::NotFound(_)) => RosterConfig::default(),
            Err(e) => return Err(e),
        };

        Ok(Self {
            base_url: config
                .get::<String>("base_url")?
                .trim_end_matches('/')
                .to_string(),
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            database_url: config
                .get::<String>("database_url")
                .ok()
                .filter(|url| !url.trim().is_empty()),

            google,
            school,
        })
    }
}
