use std::io;
use std::path::PathBuf;

use crate::diagnostic::Diagnostic;

/// A failure that aborts the transform of one module.
///
/// Everything recoverable (missing owners, unresolved theme tokens, cache
/// write failures) is reported through [`crate::LogEntry`] instead.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("failed to parse {file_path}: {}", first_message(.diagnostics))]
    Parse {
        file_path: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error(transparent)]
    CssCompile(#[from] CssCompileError),

    #[error("css preprocessor failed for {file_path}: {message}")]
    Preprocess { file_path: String, message: String },
}

fn first_message(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .first()
        .map_or_else(|| "unknown parse error".to_string(), ToString::to_string)
}

/// The CSS module compiler rejected a style block.
#[derive(Debug, thiserror::Error)]
#[error("failed to compile css for {module_id}: {message}")]
pub struct CssCompileError {
    pub module_id: String,
    pub message: String,
}

impl CssCompileError {
    pub fn new(module_id: impl Into<String>, message: impl ToString) -> Self {
        Self {
            module_id: module_id.into(),
            message: message.to_string(),
        }
    }
}

/// Writing generated CSS to disk failed.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no css output directory configured")]
    MissingOutDir,

    #[error("no css output path configured")]
    MissingOutputPath,

    #[error("failed to create css directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write css file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Loading a theme definition failed.
#[derive(Debug, thiserror::Error)]
pub enum ThemeLoadError {
    #[error("failed to read theme file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid theme file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
