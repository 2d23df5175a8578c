use std::io;
use thiserror::Error;

/// Unified error type for the proxy control plane
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Listener bind error
    #[error("Bind error: {0}")]
    Bind(String),

    /// Persisted-state encode/decode error
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ProxyError>;

impl From<anyhow::Error> for ProxyError {
    fn from(err: anyhow::Error) -> Self {
        ProxyError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: ProxyError = io_err.into();
        let display = format!("{}", err);
        assert!(display.contains("IO error"));
        assert!(display.contains("file not found"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ProxyError::Config("invalid port".to_string());
        let display = format!("{}", err);
        assert!(display.contains("Configuration error"));
        assert!(display.contains("invalid port"));
    }

    #[test]
    fn test_bind_error_display() {
        let err = ProxyError::Bind("address in use".to_string());
        let display = format!("{}", err);
        assert!(display.contains("Bind error"));
        assert!(display.contains("address in use"));
    }

    #[test]
    fn test_persistence_error_display() {
        let err = ProxyError::Persistence("bad magic".to_string());
        let display = format!("{}", err);
        assert!(display.contains("Persistence error"));
        assert!(display.contains("bad magic"));
    }

    #[test]
    fn test_from_anyhow_error() {
        let anyhow_err = anyhow::anyhow!("some anyhow error");
        let err: ProxyError = anyhow_err.into();
        assert!(format!("{}", err).contains("some anyhow error"));
    }

    #[test]
    fn test_result_type_alias() {
        fn test_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(test_fn().unwrap(), 42);
    }
}
