//! Configuration validation - checks a parsed ServerConfig and turns it into
//! the runtime pieces the listener needs.

use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::app_handler::{
    ApplicationHandler, EchoHandler, InMemoryWordCountStore, WordCountHandler,
};
use crate::bundle::CertificateBundle;
use crate::connection_worker::{ConnectionWorker, WorkerSettings};
use crate::error::StartupError;
use crate::util::Timeouts;

use super::pem::{parse_private_key, read_pem_source};
use super::types::{HandlerConfig, ServerConfig, Transport};

// Smallest buffer that can hold an IV plus one byte of payload.
const MIN_RECORD_BUFFER_SIZE: usize = 17;
const MAX_RECORD_BUFFER_SIZE: usize = 65536;

pub fn validate_config(config: &ServerConfig) -> Result<(), StartupError> {
    if config.read_timeout_secs == 0 {
        return Err(StartupError::InvalidConfig(
            "read_timeout_secs must be greater than 0".to_string(),
        ));
    }
    if config.write_timeout_secs == 0 {
        return Err(StartupError::InvalidConfig(
            "write_timeout_secs must be greater than 0".to_string(),
        ));
    }
    if config.transport == Transport::Secure {
        for (name, value) in [
            ("root_cert", &config.root_cert),
            ("leaf_cert", &config.leaf_cert),
            ("private_key", &config.private_key),
        ] {
            if value.is_none() {
                return Err(StartupError::InvalidConfig(format!(
                    "{name} is required for the secure transport"
                )));
            }
        }
    }
    if !(MIN_RECORD_BUFFER_SIZE..=MAX_RECORD_BUFFER_SIZE).contains(&config.record_buffer_size) {
        return Err(StartupError::InvalidConfig(format!(
            "record_buffer_size must be between {MIN_RECORD_BUFFER_SIZE} and {MAX_RECORD_BUFFER_SIZE}, got {}",
            config.record_buffer_size
        )));
    }
    Ok(())
}

/// Loads and cross-checks the certificates and private key named by the
/// config.
pub async fn load_certificate_bundle(
    config: &ServerConfig,
) -> Result<CertificateBundle, StartupError> {
    let root_certificate = read_pem_source(required(&config.root_cert, "root_cert")?).await?;
    let leaf_certificate = read_pem_source(required(&config.leaf_cert, "leaf_cert")?).await?;
    let key_pem = read_pem_source(required(&config.private_key, "private_key")?).await?;
    let private_key = parse_private_key(&key_pem)?;

    let bundle = CertificateBundle::new(root_certificate, leaf_certificate, private_key)?;
    info!("Loaded certificate bundle: {bundle:?}");
    Ok(bundle)
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, StartupError> {
    value
        .as_deref()
        .ok_or_else(|| StartupError::InvalidConfig(format!("{name} is not set")))
}

/// Builds the connection worker for the configured transport, loading the
/// certificate bundle when the transport needs one.
pub async fn create_worker(config: &ServerConfig) -> Result<ConnectionWorker, StartupError> {
    let handler = create_handler(&config.handler);
    let settings = create_worker_settings(config);
    match config.transport {
        Transport::Secure => {
            let bundle = load_certificate_bundle(config).await?;
            Ok(ConnectionWorker::new(Arc::new(bundle), handler, settings))
        }
        Transport::Plain => {
            info!("Serving plaintext, no handshake");
            Ok(ConnectionWorker::new_plain(handler, settings))
        }
    }
}

pub fn create_worker_settings(config: &ServerConfig) -> WorkerSettings {
    WorkerSettings {
        timeouts: Timeouts {
            read: Duration::from_secs(config.read_timeout_secs),
            write: Duration::from_secs(config.write_timeout_secs),
        },
        exchange_mode: config.exchange,
        record_buffer_size: config.record_buffer_size,
    }
}

pub fn create_handler(config: &HandlerConfig) -> Arc<dyn ApplicationHandler> {
    match config {
        HandlerConfig::Echo { suffix } => Arc::new(EchoHandler::new(suffix.as_bytes())),
        HandlerConfig::WordCount => Arc::new(WordCountHandler::new(Arc::new(
            InMemoryWordCountStore::new(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::test_fixtures::{LEAF_KEY, LEAF_PEM, ROOT_KEY, ROOT_PEM};
    use crate::config::ExchangeMode;

    fn testdata(name: &str) -> String {
        format!("{}/testdata/{name}", env!("CARGO_MANIFEST_DIR"))
    }

    fn config_with_files() -> ServerConfig {
        ServerConfig {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            transport: Transport::Secure,
            root_cert: Some(testdata("root.pem")),
            leaf_cert: Some(testdata("leaf.pem")),
            private_key: Some(testdata("leaf.key")),
            exchange: ExchangeMode::Single,
            handler: HandlerConfig::default(),
            read_timeout_secs: 10,
            write_timeout_secs: 10,
            record_buffer_size: 8192,
        }
    }

    #[test]
    fn test_validate_record_buffer_size() {
        let mut config = config_with_files();
        assert!(validate_config(&config).is_ok());

        for size in [0, 16, 65537] {
            config.record_buffer_size = size;
            assert!(matches!(
                validate_config(&config),
                Err(StartupError::InvalidConfig(_))
            ));
        }

        config.record_buffer_size = 17;
        assert!(validate_config(&config).is_ok());
        config.record_buffer_size = 65536;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = config_with_files();
        config.read_timeout_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = config_with_files();
        config.write_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_load_bundle_from_files() {
        let bundle = load_certificate_bundle(&config_with_files()).await.unwrap();
        assert_eq!(bundle.root_certificate(), ROOT_PEM.as_bytes());
        assert_eq!(bundle.leaf_certificate(), LEAF_PEM.as_bytes());
    }

    #[tokio::test]
    async fn test_load_bundle_inline_pkcs8() {
        let mut config = config_with_files();
        config.root_cert = Some(ROOT_PEM.to_string());
        config.leaf_cert = Some(LEAF_PEM.to_string());
        config.private_key = Some(testdata("leaf_pkcs8.key"));
        assert!(load_certificate_bundle(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_load_bundle_wrong_key() {
        let mut config = config_with_files();
        config.private_key = Some(ROOT_KEY.to_string());
        assert!(matches!(
            load_certificate_bundle(&config).await,
            Err(StartupError::CertificateKeyMismatch)
        ));
    }

    #[tokio::test]
    async fn test_load_bundle_missing_file() {
        let mut config = config_with_files();
        config.leaf_cert = Some(testdata("missing.pem"));
        assert!(matches!(
            load_certificate_bundle(&config).await,
            Err(StartupError::Read { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_bundle_garbage_key() {
        let mut config = config_with_files();
        config.private_key = Some(LEAF_PEM.to_string());
        assert!(matches!(
            load_certificate_bundle(&config).await,
            Err(StartupError::InvalidPrivateKey(_))
        ));
        // Sanity check that the real key is still accepted inline.
        config.private_key = Some(LEAF_KEY.to_string());
        assert!(load_certificate_bundle(&config).await.is_ok());
    }

    #[test]
    fn test_secure_transport_requires_certificates() {
        let mut config = config_with_files();
        config.leaf_cert = None;
        assert!(matches!(
            validate_config(&config),
            Err(StartupError::InvalidConfig(_))
        ));

        config.transport = Transport::Plain;
        config.root_cert = None;
        config.private_key = None;
        assert!(validate_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_plain_worker_skips_certificates() {
        let mut config = config_with_files();
        config.transport = Transport::Plain;
        // Would fail to load if the plain transport touched it.
        config.root_cert = Some(testdata("missing.pem"));
        assert!(create_worker(&config).await.is_ok());

        config.transport = Transport::Secure;
        assert!(matches!(
            create_worker(&config).await,
            Err(StartupError::Read { .. })
        ));
    }

    #[test]
    fn test_worker_settings_from_config() {
        let mut config = config_with_files();
        config.read_timeout_secs = 3;
        config.write_timeout_secs = 5;
        config.exchange = ExchangeMode::Continuous;
        config.record_buffer_size = 4096;

        let settings = create_worker_settings(&config);
        assert_eq!(settings.timeouts.read, Duration::from_secs(3));
        assert_eq!(settings.timeouts.write, Duration::from_secs(5));
        assert_eq!(settings.exchange_mode, ExchangeMode::Continuous);
        assert_eq!(settings.record_buffer_size, 4096);
    }

    #[tokio::test]
    async fn test_create_handler() {
        let echo = create_handler(&HandlerConfig::Echo {
            suffix: "!".to_string(),
        });
        assert_eq!(echo.handle_message(b"hi").await.unwrap(), b"hi!");

        let word_count = create_handler(&HandlerConfig::WordCount);
        let first = word_count.handle_message(b"a").await.unwrap();
        let second = word_count.handle_message(b"a").await.unwrap();
        assert_ne!(first, second);
    }
}
