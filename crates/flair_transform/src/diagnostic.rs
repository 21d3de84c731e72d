//! Diagnostics and transform logs.
//!
//! Parse errors coming from oxc are mapped into [`Diagnostic`] before they
//! reach the caller. Recoverable conditions met while transforming (a style
//! block with no owner, an unresolved theme token, a cache write that failed)
//! are collected as [`LogEntry`] values and returned with the output, so the
//! host can render them however it likes. Every entry is also emitted as a
//! `tracing` event.

use std::fmt;

/// Severity level for a parse diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Hint,
}

/// A labeled source span within a diagnostic.
#[derive(Debug, Clone)]
pub struct DiagnosticLabel {
    /// Optional label text (e.g. "expected `}` here").
    pub text: Option<String>,
    /// Byte offset of the span start.
    pub start: u32,
    /// Byte offset of the span end (exclusive).
    pub end: u32,
    /// 1-based line number.
    pub line: u32,
    /// 0-based column number.
    pub column: u32,
}

impl DiagnosticLabel {
    /// Create a label from byte offsets, computing line/column from source text.
    pub fn new(text: Option<String>, start: u32, end: u32, source_text: &str) -> Self {
        let (line, column) = byte_offset_to_line_column(source_text, start as usize);
        Self {
            text,
            start,
            end,
            line,
            column,
        }
    }
}

/// A parse diagnostic for a source module.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    /// Human-readable message text.
    pub text: String,
    /// Optional hint for fixing the issue.
    pub hint: Option<String>,
    /// Labeled source spans.
    pub labels: Vec<DiagnosticLabel>,
}

impl Diagnostic {
    /// Create a diagnostic from an oxc `OxcDiagnostic`.
    #[expect(clippy::cast_possible_truncation)]
    pub fn from_oxc(source_text: &str, diag: &oxc_diagnostics::OxcDiagnostic) -> Self {
        let severity = match diag.severity {
            oxc_diagnostics::Severity::Error => DiagnosticSeverity::Error,
            oxc_diagnostics::Severity::Warning => DiagnosticSeverity::Warning,
            oxc_diagnostics::Severity::Advice => DiagnosticSeverity::Hint,
        };

        let labels = diag
            .labels
            .as_ref()
            .map(|labels| {
                labels
                    .iter()
                    .map(|label| {
                        DiagnosticLabel::new(
                            label.label().map(ToString::to_string),
                            label.offset() as u32,
                            (label.offset() + label.len()) as u32,
                            source_text,
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            severity,
            text: diag.message.to_string(),
            hint: diag.help.as_ref().map(ToString::to_string),
            labels,
        }
    }

    /// Batch-convert a list of oxc diagnostics.
    pub fn from_oxc_list(
        source_text: &str,
        diagnostics: &[oxc_diagnostics::OxcDiagnostic],
    ) -> Vec<Self> {
        diagnostics
            .iter()
            .map(|d| Self::from_oxc(source_text, d))
            .collect()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)?;
        if let Some(label) = self.labels.first() {
            write!(f, " ({}:{})", label.line, label.column)?;
        }
        Ok(())
    }
}

/// Convert a UTF-8 byte offset to a 1-based line and 0-based column.
pub(crate) fn byte_offset_to_line_column(source: &str, offset: usize) -> (u32, u32) {
    let mut line = 1u32;
    let mut col = 0u32;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Level of a [`LogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message recorded while transforming one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// Per-transform log collector.
///
/// A fresh collector is created for every call to [`crate::transform`], so
/// concurrent transforms never observe each other's entries.
#[derive(Debug, Default)]
pub struct Logs {
    entries: Vec<LogEntry>,
}

impl Logs {
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message.into());
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    fn push(&mut self, level: LogLevel, message: String) {
        match level {
            LogLevel::Error => tracing::error!(target: "flair", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "flair", "{message}"),
            LogLevel::Info => tracing::info!(target: "flair", "{message}"),
        }
        self.entries.push(LogEntry { level, message });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_column_counts_from_one_and_zero() {
        let source = "const a = 1;\nconst b = <div>;\n";
        assert_eq!(byte_offset_to_line_column(source, 0), (1, 0));
        assert_eq!(byte_offset_to_line_column(source, 19), (2, 6));
    }

    #[test]
    fn logs_keep_insertion_order() {
        let mut logs = Logs::default();
        logs.info("first");
        logs.warn("second");
        logs.error("third");

        let levels: Vec<_> = logs.entries().iter().map(|e| e.level.as_str()).collect();
        assert_eq!(levels, ["info", "warn", "error"]);
        assert_eq!(logs.into_entries()[1].message, "second");
    }
}
