//! Error types for the HDF4 to CF attribute engine.

use thiserror::Error;

/// Result type alias using H4Error.
pub type H4Result<T> = Result<T, H4Error>;

/// Primary error type for attribute and metadata processing.
#[derive(Debug, Error)]
pub enum H4Error {
    // === Input Attribute Errors ===
    /// An attribute had the wrong element count, a missing separator,
    /// an out-of-range value or non-numeric text where a number was expected.
    #[error("malformed attribute '{name}': {reason}")]
    MalformedAttribute { name: String, reason: String },

    /// `.N` and `.N.M` numeric suffixes were mixed for one ECS basename.
    #[error("ambiguous ecs fragment suffixes for '{basename}'")]
    EcsSuffixConflict { basename: String },

    /// An ECS fragment or metadata name could not be used.
    #[error("ecs metadata error: {0}")]
    EcsBuffer(String),

    /// The external metadata grammar parser raised.
    #[error("metadata parse failure in '{name}': {detail}")]
    MetadataParse { name: String, detail: String },

    // === Library Errors ===
    /// An HDF4 / HDF-EOS2 library call returned its failure sentinel.
    #[error("library call {call} failed: {detail}")]
    Library { call: &'static str, detail: String },

    // === Unsupported Input ===
    #[error("unsupported datatype: {0}")]
    UnsupportedType(String),

    #[error("unsupported rank {0}; dimension maps need rank <= 2")]
    UnsupportedRank(usize),

    /// Caller supplied arguments that do not fit the data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // === Infrastructure ===
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl H4Error {
    /// Create a MalformedAttribute error.
    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedAttribute {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a Library error for the named call.
    pub fn library(call: &'static str, detail: impl Into<String>) -> Self {
        Self::Library {
            call,
            detail: detail.into(),
        }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error came from malformed file content rather than
    /// from the library or the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            H4Error::MalformedAttribute { .. }
                | H4Error::EcsSuffixConflict { .. }
                | H4Error::EcsBuffer(_)
                | H4Error::MetadataParse { .. }
                | H4Error::UnsupportedType(_)
                | H4Error::UnsupportedRank(_)
        )
    }
}
