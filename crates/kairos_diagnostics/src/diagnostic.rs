//! Diagnostic records anchored to simulation time.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single diagnostic emitted during a simulation run.
///
/// Unlike compiler diagnostics there is no source text to point into; the
/// anchor is the simulation instant (femtoseconds) at which the condition
/// was observed, plus optionally the process it concerns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// How serious this is.
    pub severity: Severity,
    /// The structured code identifying the condition.
    pub code: DiagnosticCode,
    /// The main message.
    pub message: String,
    /// Simulation time in femtoseconds, if the condition has one.
    pub time_fs: Option<u64>,
    /// The process this concerns, by registered name.
    pub process: Option<String>,
    /// Extra context lines.
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Creates a warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Creates a note diagnostic.
    pub fn note(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Note, code, message)
    }

    fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            time_fs: None,
            process: None,
            notes: Vec::new(),
        }
    }

    /// Anchors this diagnostic to a simulation instant.
    pub fn at_time(mut self, fs: u64) -> Self {
        self.time_fs = Some(fs);
        self
    }

    /// Names the process this diagnostic concerns.
    pub fn for_process(mut self, name: impl Into<String>) -> Self {
        self.process = Some(name.into());
        self
    }

    /// Appends a context note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(fs) = self.time_fs {
            write!(f, " (at {fs} fs)")?;
        }
        if let Some(p) = &self.process {
            write!(f, " [process {p}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    #[test]
    fn warning_builder() {
        let code = DiagnosticCode::new(Category::Warning, 101);
        let d = Diagnostic::warning(code, "semaphore over-release")
            .at_time(5_000_000)
            .for_process("producer")
            .with_note("available rose above the initial count");
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.time_fs, Some(5_000_000));
        assert_eq!(d.process.as_deref(), Some("producer"));
        assert_eq!(d.notes.len(), 1);
    }

    #[test]
    fn error_severity() {
        let code = DiagnosticCode::new(Category::Error, 1);
        let d = Diagnostic::error(code, "bad handle");
        assert!(d.severity.is_error());
        assert!(d.time_fs.is_none());
    }

    #[test]
    fn display_includes_code_and_anchor() {
        let code = DiagnosticCode::new(Category::Scheduling, 2);
        let d = Diagnostic::note(code, "run ended deadlocked").at_time(42);
        assert_eq!(d.to_string(), "note[S002]: run ended deadlocked (at 42 fs)");
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::new(Category::Warning, 103);
        let d = Diagnostic::warning(code, "nba overwrite").at_time(10);
        let json = serde_json::to_string(&d).unwrap();
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(back.message, "nba overwrite");
        assert_eq!(back.time_fs, Some(10));
    }
}
