//! Configuration module for the server.
//!
//! - [`types`]: the YAML configuration types
//! - [`pem`]: PEM loading for certificates and the private key
//! - [`validate`]: validation and construction of the runtime pieces
//!
//! The main entry points are [`load_config`] and [`load_certificate_bundle`].

mod pem;
mod types;
mod validate;

use std::path::Path;

pub use types::*;
pub use validate::{
    create_handler, create_worker, create_worker_settings, load_certificate_bundle, validate_config,
};

use crate::error::StartupError;

/// Reads and validates a config file. JSON is accepted as well since it is a
/// subset of YAML.
pub async fn load_config(path: &Path) -> Result<ServerConfig, StartupError> {
    let config_bytes = tokio::fs::read(path)
        .await
        .map_err(|e| StartupError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

    let config = serde_yaml::from_slice::<ServerConfig>(&config_bytes).map_err(|e| {
        StartupError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_missing_config() {
        let result = load_config(Path::new("/nonexistent/kdpassd.yaml")).await;
        assert!(matches!(result, Err(StartupError::Read { .. })));
    }

    #[tokio::test]
    async fn test_load_sample_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("kdpassd.yaml");
        let config = load_config(&path).await.unwrap();
        assert_eq!(config.exchange, ExchangeMode::Single);
        assert_eq!(config.record_buffer_size, 8192);
    }

    #[tokio::test]
    async fn test_load_rejects_non_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/root.pem");
        let result = load_config(&path).await;
        assert!(matches!(result, Err(StartupError::ConfigParse { .. })));
    }
}
