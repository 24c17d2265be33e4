//! Crate-level error type.

use thiserror::Error;

use weft_core::{AccessError, SchemaError};

use crate::config::ConfigError;

/// Any error produced by the engine.
///
/// Each operation returns its narrow error type; `WeftError` lets
/// application code collect them behind one `?`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WeftError {
    /// A schema failed to build.
    #[error("schema: {0}")]
    Schema(#[from] SchemaError),
    /// A slot read or write was rejected.
    #[error("access: {0}")]
    Access(#[from] AccessError),
    /// A store configuration was invalid.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_with_prefix() {
        let e: WeftError = ConfigError::EmptyLabel.into();
        assert_eq!(e.to_string(), "config: store label must not be empty");
        let e: WeftError = SchemaError::EmptyName.into();
        assert!(matches!(e, WeftError::Schema(SchemaError::EmptyName)));
    }
}
