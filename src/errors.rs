//! Error handling for the gitlab2github crate.
use std::{error::Error as StdError, fmt};

use crate::platform::PlatformType;

/// Error type for the gitlab2github crate.
#[derive(Debug)]
pub struct MigrateError {
    /// Inner error.
    inner: Box<Inner>,
}

impl MigrateError {
    /// Create a new error.
    pub(crate) fn new(kind: MigrateErrorKind) -> Self {
        Self {
            inner: Box::new(Inner {
                kind,
                text: None,
                source: None,
                platform: None,
            }),
        }
    }

    /// Create a new error wrapping a source error.
    pub(crate) fn with_source<E>(kind: MigrateErrorKind, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        let mut error = Self::new(kind);
        error.inner.source = Some(source.into());
        error
    }

    /// Attach a human readable detail (usually a response body or git message).
    pub(crate) fn with_text(mut self, text: &str) -> Self {
        self.inner.text = Some(text.to_string());
        self
    }

    /// Attach the platform the error comes from.
    pub(crate) fn with_platform(mut self, platform: PlatformType) -> Self {
        self.inner.platform = Some(platform);
        self
    }

    /// Kind of the error
    pub fn kind(&self) -> MigrateErrorKind {
        self.inner.kind
    }

    /// Platform the error comes from, if known
    pub fn platform(&self) -> Option<PlatformType> {
        self.inner.platform
    }

    /// Whether the error must stop the run before any repository is touched
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.inner.kind,
            MigrateErrorKind::Auth | MigrateErrorKind::Config
        )
    }
}

/// Type alias for a boxed error.
pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// Inner error type for the gitlab2github crate.
#[derive(Debug)]
struct Inner {
    /// Error kind.
    kind: MigrateErrorKind,

    /// Detail text.
    text: Option<String>,

    /// Platform error
    platform: Option<PlatformType>,

    /// Source error.
    source: Option<BoxError>,
}

/// Classification of every error the migration can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateErrorKind {
    /// Bad or missing credentials.
    Auth,

    /// Missing or invalid setting.
    Config,

    /// The git mirror (clone or push) failed.
    Transfer,

    /// Rate limit retries exhausted.
    RateLimitExceeded,

    /// A single entity was skipped because it can't be represented on the destination.
    ValidationSkip,

    /// Unexpected response from one of the platforms.
    UnknownApi,

    /// Local I/O failure.
    Io,
}

impl fmt::Display for MigrateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrateErrorKind::Auth => "AuthError",
            MigrateErrorKind::Config => "ConfigError",
            MigrateErrorKind::Transfer => "TransferError",
            MigrateErrorKind::RateLimitExceeded => "RateLimitExceeded",
            MigrateErrorKind::ValidationSkip => "ValidationSkip",
            MigrateErrorKind::UnknownApi => "UnknownApiError",
            MigrateErrorKind::Io => "IoError",
        };
        f.write_str(name)
    }
}

impl fmt::Display for MigrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.kind)?;
        if let Some(platform) = &self.inner.platform {
            write!(f, " ({platform})")?;
        }
        if let Some(text) = &self.inner.text {
            write!(f, ": {text}")?;
        }
        if let Some(source) = &self.inner.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for MigrateError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

impl From<&str> for MigrateError {
    fn from(text: &str) -> Self {
        Self::new(MigrateErrorKind::Config).with_text(text)
    }
}

impl From<String> for MigrateError {
    fn from(text: String) -> Self {
        Self::new(MigrateErrorKind::Config).with_text(&text)
    }
}

impl From<reqwest::Error> for MigrateError {
    fn from(e: reqwest::Error) -> Self {
        Self::with_source(MigrateErrorKind::UnknownApi, e)
    }
}

impl From<serde_json::Error> for MigrateError {
    fn from(e: serde_json::Error) -> Self {
        Self::with_source(MigrateErrorKind::UnknownApi, e)
    }
}

impl From<std::io::Error> for MigrateError {
    fn from(e: std::io::Error) -> Self {
        Self::with_source(MigrateErrorKind::Io, e)
    }
}

impl From<git2::Error> for MigrateError {
    fn from(e: git2::Error) -> Self {
        Self::with_source(MigrateErrorKind::Transfer, e)
    }
}

impl From<toml::de::Error> for MigrateError {
    fn from(e: toml::de::Error) -> Self {
        Self::with_source(MigrateErrorKind::Config, e)
    }
}

impl From<url::ParseError> for MigrateError {
    fn from(e: url::ParseError) -> Self {
        Self::with_source(MigrateErrorKind::Config, e)
    }
}
