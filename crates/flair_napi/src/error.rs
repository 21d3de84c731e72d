use std::fmt::Write;

use flair_transform::{Diagnostic, DiagnosticSeverity, TransformError};
use napi::Status;

/// Convert a transform failure into the error thrown to JavaScript.
///
/// Parse failures list every diagnostic as `file:line:column: message`,
/// followed by its help text when there is one.
pub fn to_napi_error(err: &TransformError) -> napi::Error {
    let reason = match err {
        TransformError::Parse {
            file_path,
            diagnostics,
        } => render_diagnostics(file_path, diagnostics),
        other => other.to_string(),
    };
    napi::Error::new(Status::GenericFailure, reason)
}

fn render_diagnostics(file_path: &str, diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("failed to parse {file_path}");
    for diagnostic in diagnostics {
        let severity = match diagnostic.severity {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Hint => "hint",
        };
        out.push('\n');
        match diagnostic.labels.first() {
            Some(label) => {
                let _ = write!(out, "{file_path}:{}:{}: ", label.line, label.column + 1);
            }
            None => {
                let _ = write!(out, "{file_path}: ");
            }
        }
        let _ = write!(out, "{severity}: {}", diagnostic.text);
        if let Some(hint) = &diagnostic.hint {
            let _ = write!(out, "\n  help: {hint}");
        }
    }
    out
}

pub fn invalid_arg(message: impl Into<String>) -> napi::Error {
    napi::Error::new(Status::InvalidArg, message.into())
}
