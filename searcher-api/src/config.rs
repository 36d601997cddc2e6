use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_with::serde_as;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub elastic: ElasticSettings,
    pub redis: RedisSettings,
    pub mongo: MongoSettings,
    pub cors: CorsSettings,
    pub embeddings: EmbeddingsSettings,
}

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub port: u16,
}

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct ElasticSettings {
    pub host: String,
    pub user: String,
    pub password: String,
    pub ca_path: PathBuf,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub tls_insecure: bool,
}

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct RedisSettings {
    pub host: String,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub port: u16,
    pub stream_name: String,
    pub consumer_group: String,
}

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct MongoSettings {
    pub host: String,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub port: u16,
    pub database: String,
    pub collection: String,
}

/// CORS lists arrive as space-separated strings, `*` meaning "any".
#[serde_as]
#[derive(Deserialize, Clone)]
pub struct CorsSettings {
    pub allowed_origins: String,
    pub allowed_methods: String,
    pub allowed_headers: String,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub allow_credentials: bool,
}

impl CorsSettings {
    pub fn origins(&self) -> Vec<&str> {
        self.allowed_origins.split_whitespace().collect()
    }

    pub fn methods(&self) -> Vec<&str> {
        self.allowed_methods.split_whitespace().collect()
    }

    pub fn headers(&self) -> Vec<&str> {
        self.allowed_headers.split_whitespace().collect()
    }
}

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct EmbeddingsSettings {
    /// Required for the API binary; the ingester runs without a model.
    pub model_path: Option<PathBuf>,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub dimension: usize,
}

impl EmbeddingsSettings {
    pub fn require_model_path(&self) -> Result<&Path, config::ConfigError> {
        self.model_path.as_deref().ok_or_else(|| {
            config::ConfigError::Message(
                "EMBEDDINGS_MODEL_PATH environment variable is not set".to_string(),
            )
        })
    }
}

/// Defaults overlaid with the process environment.
pub fn read_config() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "0.0.0.0")?
        .set_default("application.port", "8000")?
        .set_default("elastic.host", "https://localhost:9200")?
        .set_default("elastic.user", "elastic")?
        .set_default("elastic.ca_path", "certs/_data/ca/ca.crt")?
        .set_default("elastic.tls_insecure", "false")?
        .set_default("redis.host", "localhost")?
        .set_default("redis.port", "6379")?
        .set_default("redis.stream_name", "analyzer_articles")?
        .set_default("redis.consumer_group", "searcher_api")?
        .set_default("mongo.host", "localhost")?
        .set_default("mongo.port", "27017")?
        .set_default("mongo.database", "analyzer")?
        .set_default("mongo.collection", "analyzed_articles")?
        .set_default("cors.allowed_origins", "http://localhost")?
        .set_default("cors.allowed_methods", "*")?
        .set_default("cors.allowed_headers", "*")?
        .set_default("cors.allow_credentials", "true")?
        .set_default("embeddings.dimension", "384")?
        .set_override_option("application.host", env("APP_HOST"))?
        .set_override_option("application.port", env("APP_PORT"))?
        .set_override_option("elastic.host", env("ELASTIC_HOST"))?
        .set_override_option("elastic.user", env("ELASTIC_USER"))?
        .set_override_option("elastic.password", env("ELASTIC_PASSWORD"))?
        .set_override_option("elastic.ca_path", env("ELASTIC_CA_PATH"))?
        .set_override_option("elastic.tls_insecure", env("ELASTIC_TLS_INSECURE"))?
        .set_override_option("redis.host", env("REDIS_HOST"))?
        .set_override_option("redis.port", env("REDIS_PORT"))?
        .set_override_option("redis.stream_name", env("REDIS_STREAM_NAME"))?
        .set_override_option("redis.consumer_group", env("REDIS_CONSUMER_GROUP"))?
        .set_override_option("mongo.host", env("MONGO_HOST"))?
        .set_override_option("mongo.port", env("MONGO_PORT"))?
        .set_override_option("mongo.database", env("MONGO_DB_ANALYZER"))?
        .set_override_option("mongo.collection", env("MONGO_COLLECTION_ANALYZER"))?
        .set_override_option("cors.allowed_origins", env("CORS_ALLOWED_ORIGINS"))?
        .set_override_option("cors.allowed_methods", env("CORS_ALLOWED_METHODS"))?
        .set_override_option("cors.allowed_headers", env("CORS_ALLOWED_HEADERS"))?
        .set_override_option("cors.allow_credentials", env("CORS_ALLOW_CREDENTIALS"))?
        .set_override_option("embeddings.model_path", env("EMBEDDINGS_MODEL_PATH"))?
        .set_override_option("embeddings.dimension", env("EMBEDDINGS_DIMENSION"))?
        .build()?;

    settings.try_deserialize::<Settings>()
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
