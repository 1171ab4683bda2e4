//! Domain error taxonomy and the non-exceptional `Alert` channel.
//!
//! Invariant violations are bugs and are raised as panics via `assert!`/
//! `debug_assert!` at their call sites, never as `Result::Err` values.
//! Everything else that is a value lives here.

use std::fmt;
use thiserror::Error;

/// Errors surfaced from value-returning operations: malformed input,
/// bad transform configuration, or resource exhaustion. Invariant
/// violations never reach this type; they panic where they are found.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),

    #[error("attribute `{0}` already registered")]
    DuplicateAttribute(String),

    #[error("invalid attribute name `{0}`: must match [A-Za-z_][A-Za-z0-9_ ]*")]
    InvalidAttributeName(String),

    #[error("malformed transform condition: {0}")]
    InvalidCondition(String),

    #[error("transform `{action}` aborted: {message}")]
    TransformAborted { action: String, message: String },

    #[error("component {0:?} not found")]
    ComponentNotFound(crate::id::ComponentId),

    #[error("resource exhausted during `{operation}`: {detail}")]
    ResourceExhausted { operation: String, detail: String },

    #[error("malformed save file: {0}")]
    MalformedSaveFile(String),

    #[error("unsupported save format version {found}, expected {expected}")]
    UnsupportedSaveVersion { found: u16, expected: u16 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Severity of an [`Alert`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

/// Where an [`Alert`] originated, for observers that want to group or
/// filter them without parsing the message text.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AlertSource {
    Document,
    Transform { action: String, index: usize },
    Adapter { format: String },
}

impl fmt::Display for AlertSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSource::Document => write!(f, "document"),
            AlertSource::Transform { action, index } => write!(f, "transform[{index}] {action}"),
            AlertSource::Adapter { format } => write!(f, "adapter({format})"),
        }
    }
}

/// A single diagnostic record. Alerts are data, not `Result::Err`: a
/// transform run may raise zero, one, or several over its lifetime,
/// and a prior alert never precludes later progress on its own.
#[derive(Debug, Clone)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    pub source: AlertSource,
}

impl Alert {
    pub fn new(level: AlertLevel, message: impl Into<String>, source: AlertSource) -> Self {
        Self {
            level,
            message: message.into(),
            source,
        }
    }

    pub fn info(message: impl Into<String>, source: AlertSource) -> Self {
        Self::new(AlertLevel::Info, message, source)
    }

    pub fn warning(message: impl Into<String>, source: AlertSource) -> Self {
        Self::new(AlertLevel::Warning, message, source)
    }

    pub fn error(message: impl Into<String>, source: AlertSource) -> Self {
        Self::new(AlertLevel::Error, message, source)
    }

    pub fn is_error(&self) -> bool {
        self.level == AlertLevel::Error
    }
}

/// Append-only list owned by a `Document` (or, transiently, by a single
/// transform invocation before it is merged into the document's list).
/// Observers are notified once per batch rather than once per alert.
#[derive(Debug, Default)]
pub struct AlertList {
    alerts: Vec<Alert>,
}

impl AlertList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, alert: Alert) {
        tracing::event!(
            match alert.level {
                AlertLevel::Info => tracing::Level::INFO,
                AlertLevel::Warning => tracing::Level::WARN,
                AlertLevel::Error => tracing::Level::ERROR,
            },
            source = %alert.source,
            "{}",
            alert.message
        );
        self.alerts.push(alert);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.alerts.iter().any(Alert::is_error)
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_list_tracks_errors() {
        let mut alerts = AlertList::new();
        assert!(!alerts.has_errors());
        alerts.push(Alert::warning("cache invalidated", AlertSource::Document));
        assert!(!alerts.has_errors());
        alerts.push(Alert::error("bad config", AlertSource::Transform {
            action: "filter".into(),
            index: 0,
        }));
        assert!(alerts.has_errors());
        assert_eq!(alerts.iter().count(), 2);
    }
}
