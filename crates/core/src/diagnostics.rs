use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
    Debug,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
            Severity::Hint => write!(f, "hint"),
            Severity::Debug => write!(f, "debug"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub payload: Option<serde_json::Value>,
}

/// Non-fatal observations gathered during one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    prefix: Option<String>,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Diagnostics {
            prefix: Some(prefix.into()),
            entries: Vec::new(),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            severity,
            message: message.into(),
            payload: None,
        });
    }

    pub fn push_with_payload(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        payload: serde_json::Value,
    ) {
        self.entries.push(Diagnostic {
            severity,
            message: message.into(),
            payload: Some(payload),
        });
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    pub fn hint(&mut self, message: impl Into<String>) {
        self.push(Severity::Hint, message);
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.push(Severity::Debug, message);
    }

    pub fn has(&self, severity: Severity) -> bool {
        self.entries.iter().any(|d| d.severity == severity)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.of_severity(severity).count()
    }

    pub fn of_severity(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.severity == severity)
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }

    /// Forwards every entry to `tracing` at the matching level.
    pub fn log_all(&self) {
        let prefix = self.prefix.as_deref().unwrap_or("diagnostics");
        for d in &self.entries {
            let payload = d.payload.as_ref().map(|p| p.to_string()).unwrap_or_default();
            match d.severity {
                Severity::Error => tracing::error!(source = prefix, payload = %payload, "{}", d.message),
                Severity::Warning => tracing::warn!(source = prefix, payload = %payload, "{}", d.message),
                Severity::Info => tracing::info!(source = prefix, payload = %payload, "{}", d.message),
                Severity::Hint => tracing::info!(source = prefix, payload = %payload, "hint: {}", d.message),
                Severity::Debug => tracing::debug!(source = prefix, payload = %payload, "{}", d.message),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_severity() {
        let mut d = Diagnostics::with_prefix("import");
        d.error("bad date");
        d.warning("empty batch");
        d.debug("unknown row");
        d.debug("another");
        assert!(d.has(Severity::Error));
        assert!(!d.has(Severity::Hint));
        assert_eq!(d.count(Severity::Debug), 2);
        assert_eq!(d.len(), 4);
        assert_eq!(d.prefix(), Some("import"));
    }

    #[test]
    fn payload_is_kept() {
        let mut d = Diagnostics::new();
        d.push_with_payload(Severity::Error, "cast failed", serde_json::json!({"row": 3}));
        assert_eq!(d.entries()[0].payload.as_ref().unwrap()["row"], 3);
    }

    #[test]
    fn drain_empties_collector() {
        let mut d = Diagnostics::new();
        d.info("one");
        let drained = d.drain();
        assert_eq!(drained.len(), 1);
        assert!(d.is_empty());
    }

    #[test]
    fn severity_orders_error_first() {
        assert!(Severity::Error < Severity::Warning);
        assert!(Severity::Hint < Severity::Debug);
    }
}
