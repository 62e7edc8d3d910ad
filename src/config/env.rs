//! Environment-only configuration
//!
//! Mirrors the variables a hosting platform usually injects: a `PORT`, the
//! bucket name and the individual fields of a Google service account key.

use super::{
    normalize_bucket, unescape_private_key, Config, ConfigError, LoggingConfig, MetricsConfig,
    S3Config, ServerConfig, ServiceAccountKey, StorageBackend, StorageConfig, UploadConfig,
};
use std::str::FromStr;

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid value for {}: {}", name, e))
        }),
        None => Ok(None),
    }
}

fn service_account_from_env() -> Option<ServiceAccountKey> {
    // Without the two signing fields there is no usable key.
    let private_key = var("PRIVATE_KEY")?;
    let client_email = var("CLIENT_EMAIL")?;

    Some(ServiceAccountKey {
        account_type: var("TYPE").unwrap_or_else(|| "service_account".to_string()),
        project_id: var("PROJECT_ID").unwrap_or_default(),
        private_key_id: var("PRIVATE_KEY_ID").unwrap_or_default(),
        private_key: unescape_private_key(&private_key),
        client_email,
        client_id: var("CLIENT_ID").unwrap_or_default(),
        auth_uri: var("AUTH_URI").unwrap_or_default(),
        token_uri: var("TOKEN_URI").unwrap_or_default(),
        auth_provider_x509_cert_url: var("AUTH_PROVIDER_X509_CERT_URL").unwrap_or_default(),
        client_x509_cert_url: var("CLIENT_X509_CERT_URL").unwrap_or_default(),
    })
}

fn s3_from_env() -> Result<S3Config, ConfigError> {
    Ok(S3Config {
        region: var("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
        endpoint: var("S3_ENDPOINT"),
        access_key: var("AWS_ACCESS_KEY_ID"),
        secret_key: var("AWS_SECRET_ACCESS_KEY"),
        force_path_style: parse_var("S3_FORCE_PATH_STYLE")?.unwrap_or(false),
    })
}

pub(super) fn from_env() -> Result<Config, ConfigError> {
    let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
    let port: u16 = parse_var("PORT")?.unwrap_or(4001);

    let backend = match var("STORAGE_BACKEND") {
        Some(raw) => StorageBackend::from_str(&raw)?,
        None => StorageBackend::Gcs,
    };

    let bucket = var("STORAGE_BUCKET")
        .or_else(|| var("BUCKET"))
        .map(|b| normalize_bucket(&b))
        .unwrap_or_default();

    let s3 = match backend {
        StorageBackend::S3 => Some(s3_from_env()?),
        _ => None,
    };

    let mut upload = UploadConfig::default();
    if let Some(max) = parse_var("MAX_UPLOAD_BYTES")? {
        upload.max_file_size = max;
    }
    if let Some(ttl) = parse_var("SIGNED_URL_TTL_SECS")? {
        upload.signed_url_ttl_secs = ttl;
    }
    upload.staging_dir = var("STAGING_DIR").map(Into::into);

    let mut metrics = MetricsConfig::default();
    if let Some(enabled) = parse_var("METRICS_ENABLED")? {
        metrics.enabled = enabled;
    }
    if let Some(port) = parse_var("METRICS_PORT")? {
        metrics.port = port;
    }

    let mut logging = LoggingConfig::default();
    if let Some(format) = var("LOG_FORMAT") {
        logging.format = format;
    }

    Ok(Config {
        server: ServerConfig {
            address: if host.contains(':') {
                format!("[{}]:{}", host, port)
            } else {
                format!("{}:{}", host, port)
            },
        },
        storage: StorageConfig {
            backend,
            bucket,
            service_account: service_account_from_env(),
            s3,
        },
        upload,
        metrics,
        logging,
    })
}
