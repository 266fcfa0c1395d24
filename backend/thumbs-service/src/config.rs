/// Configuration management for thumbs-service
///
/// Built once at startup from environment variables (plus an optional
/// thumbnail settings file) and handed to every component by reference.
use object_storage::{GcsConfig, S3Config};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use std::fmt;
use std::path::Path;
use thiserror::Error;

const DEFAULT_THUMBS_CONFIG: &str = include_str!("../config/defaults.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to load thumbnail settings: {0}")]
    File(#[from] config::ConfigError),

    #[error("Invalid thumbnail settings: {0}")]
    Thumbs(String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub broker: BrokerConfig,
    pub thumbs: ThumbsConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub enum StorageBackend {
    /// Self-hosted MinIO (or any S3-compatible server)
    Minio(S3Config),
    /// Google Cloud Storage
    Gcs(GcsConfig),
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub photos_bucket: String,
    pub thumbs_bucket: String,
}

#[derive(Clone, Debug)]
pub struct BrokerConfig {
    pub url: String,
    pub queue: String,
    /// Fanout exchange receiving photo upload events
    pub bucket_exchange: String,
    /// Fanout exchange receiving completion events
    pub worker_exchange: String,
    pub prefetch_count: u16,
    /// Requeue failed deliveries instead of dead-lettering them
    pub nack_requeue: bool,
    pub dead_letter_exchange: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ThumbsConfig {
    pub dimensions: Vec<u32>,
    pub quality: u8,
}

#[derive(Deserialize)]
struct ThumbsFile {
    thumbs: ThumbsConfig,
}

impl ThumbsConfig {
    /// Load thumbnail settings, layering `path` (YAML, TOML or JSON) over the
    /// built-in defaults.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().add_source(config::File::from_str(
            DEFAULT_THUMBS_CONFIG,
            config::FileFormat::Toml,
        ));

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(Path::new(path)).required(true));
        }

        let file: ThumbsFile = builder.build()?.try_deserialize()?;
        file.thumbs.validate()?;
        Ok(file.thumbs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimensions.is_empty() {
            return Err(ConfigError::Thumbs("at least one dimension is required".into()));
        }
        if self.dimensions.contains(&0) {
            return Err(ConfigError::Thumbs("dimensions must be positive".into()));
        }
        let mut seen = self.dimensions.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.dimensions.len() {
            return Err(ConfigError::Thumbs("dimensions must be unique".into()));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::Thumbs(format!(
                "quality must be within 1..=100, got {}",
                self.quality
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let backend = match vars
            .optional("STORAGE_BACKEND")
            .unwrap_or_else(|| "minio".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "minio" | "s3" => {
                let secure = vars.parse_or("MINIO_SECURE", false)?;
                let mut s3 = S3Config::minio(
                    &vars.required("MINIO_ENDPOINT")?,
                    &vars.optional("MINIO_ROOT_USER").unwrap_or_default(),
                    &vars.optional("MINIO_ROOT_PASSWORD").unwrap_or_default(),
                    secure,
                );
                if let Some(region) = vars.optional("MINIO_REGION") {
                    s3.region = region;
                }
                StorageBackend::Minio(s3)
            }
            "gcs" => {
                let gcs = GcsConfig {
                    service_account_json: vars.optional("GCS_SERVICE_ACCOUNT_JSON"),
                    service_account_json_path: vars.optional("GCS_SERVICE_ACCOUNT_JSON_PATH"),
                    host: vars
                        .optional("GCS_HOST")
                        .unwrap_or_else(|| "storage.googleapis.com".to_string()),
                };
                if gcs.service_account_json.is_none() && gcs.service_account_json_path.is_none() {
                    return Err(ConfigError::Missing(
                        "GCS_SERVICE_ACCOUNT_JSON or GCS_SERVICE_ACCOUNT_JSON_PATH",
                    ));
                }
                StorageBackend::Gcs(gcs)
            }
            other => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    value: other.to_string(),
                    reason: "expected minio or gcs".to_string(),
                })
            }
        };

        let config_file = vars.optional("CONFIG_FILE");

        // Zero would mean unlimited prefetch.
        let prefetch_count: u16 = vars.parse_or("PREFETCH_COUNT", 1)?;
        if prefetch_count == 0 {
            return Err(ConfigError::Invalid {
                key: "PREFETCH_COUNT",
                value: prefetch_count.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Config {
            app: AppConfig {
                host: vars
                    .optional("THUMBS_SERVICE_HOST")
                    .unwrap_or_else(|| "0.0.0.0".to_string()),
                port: vars.parse_or("THUMBS_SERVICE_PORT", 8082)?,
            },
            database: DatabaseConfig {
                host: vars.required("DB_HOST")?,
                port: vars.parse_or("DB_PORT", 5432)?,
                user: vars.required("DB_USER")?,
                password: vars.optional("DB_PASSWORD").unwrap_or_default(),
                name: vars.required("DB_NAME")?,
                max_connections: vars.parse_or("DB_MAX_CONNECTIONS", 5)?,
            },
            storage: StorageConfig {
                backend,
                photos_bucket: vars.required("PHOTOS_BUCKET")?,
                thumbs_bucket: vars.required("THUMBS_BUCKET")?,
            },
            broker: BrokerConfig {
                url: vars.required("RABBITMQ_URL")?,
                queue: vars.required("QUEUE_NAME")?,
                bucket_exchange: vars.required("BUCKET_EXCHANGE_NAME")?,
                worker_exchange: vars.required("WORKER_EXCHANGE_NAME")?,
                prefetch_count,
                nack_requeue: vars.parse_or("NACK_REQUEUE", false)?,
                dead_letter_exchange: vars.optional("DEAD_LETTER_EXCHANGE"),
            },
            thumbs: ThumbsConfig::load(config_file.as_deref())?,
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn parse_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(key) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        }
    }
}
