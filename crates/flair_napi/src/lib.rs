//! Flair transform bindings for Node.js.

mod error;

#[cfg(all(
    feature = "allocator",
    not(any(
        target_arch = "arm",
        target_os = "freebsd",
        target_os = "windows",
        target_family = "wasm"
    ))
))]
#[global_allocator]
static ALLOC: mimalloc_safe::MiMalloc = mimalloc_safe::MiMalloc;

use std::mem;

use napi::bindgen_prelude::{AsyncTask, FnArgs, Function};
use napi::Task;
use napi_derive::napi;

use flair_transform::{CssPreprocessor, LogEntry, LogLevel, OutputType, ThemeConfig};

use crate::error::{invalid_arg, to_napi_error};

/// Options for `transformCode`.
#[napi(object)]
#[derive(Default, Clone)]
pub struct TransformOptions {
    /// Directory that receives generated CSS files.
    /// Required when `outputType` is `"inject-import"`.
    pub css_out_dir: Option<String>,

    /// Specifier prefix for the injected CSS import, e.g. a virtual module
    /// prefix. Defaults to the path of the generated file.
    pub css_import_prefix: Option<String>,

    /// Extra JSX attributes holding class names. Entries written as
    /// `/pattern/flags` are regular expressions. `className` is always included.
    pub class_name_list: Option<Vec<String>>,

    /// Resolve `$token.path` references and `@screen` rules against `theme`.
    ///
    /// @default false
    pub use_theme: Option<bool>,

    /// Theme configuration (`tokens`, `breakpoints`, `prefix`, `selector`, `themes`).
    pub theme: Option<serde_json::Value>,

    /// Append a timestamp to generated CSS file names.
    ///
    /// @default false
    pub append_timestamp_to_css_file: Option<bool>,

    /// @default "inject-import"
    #[napi(ts_type = "'inject-import' | 'write-css-file'")]
    pub output_type: Option<String>,

    /// CSS file written when `outputType` is `"write-css-file"`.
    pub output_path: Option<String>,

    /// Remove `<Style>` elements from the emitted code.
    ///
    /// @default false
    pub production: Option<bool>,
}

/// A message logged while transforming a module.
#[napi(object)]
#[derive(Clone)]
pub struct TransformLog {
    #[napi(ts_type = "'error' | 'warn' | 'info'")]
    pub level: String,
    pub message: String,
}

impl From<LogEntry> for TransformLog {
    fn from(entry: LogEntry) -> Self {
        Self {
            level: entry.level.as_str().to_string(),
            message: entry.message,
        }
    }
}

/// Result of transforming one module.
#[napi(object)]
pub struct TransformResult {
    pub code: String,
    /// Source map v3 JSON.
    pub sourcemap: Option<String>,
    /// Compiled CSS of all style blocks in the module.
    pub css: Option<String>,
    /// Name of the CSS file written to `cssOutDir`.
    pub generated_css_name: Option<String>,
    pub logs: Vec<TransformLog>,
}

fn output_type(name: Option<&str>) -> napi::Result<OutputType> {
    match name {
        None => Ok(OutputType::default()),
        Some(name) => OutputType::from_name(name)
            .ok_or_else(|| invalid_arg(format!("unknown outputType `{name}`"))),
    }
}

fn theme_config(value: serde_json::Value) -> napi::Result<ThemeConfig> {
    ThemeConfig::from_value(value).map_err(|err| invalid_arg(format!("invalid theme: {err}")))
}

fn transform_impl(
    code: &str,
    file_path: &str,
    options: &TransformOptions,
    preprocessor: Option<&dyn CssPreprocessor>,
) -> napi::Result<Option<TransformResult>> {
    let mut logs = Vec::new();

    let mut core = flair_transform::TransformOptions::new()
        .with_output_type(output_type(options.output_type.as_deref())?)
        .with_use_theme(options.use_theme.unwrap_or(false))
        .with_append_timestamp_to_css_file(options.append_timestamp_to_css_file.unwrap_or(false))
        .with_production(options.production.unwrap_or(false));
    if let Some(dir) = &options.css_out_dir {
        core = core.with_css_out_dir(dir);
    }
    if let Some(prefix) = &options.css_import_prefix {
        core = core.with_css_import_prefix(prefix);
    }
    if let Some(entries) = &options.class_name_list {
        core = core.with_class_name_list(entries.as_slice());
    }
    if let Some(path) = &options.output_path {
        core.output_path = Some(path.into());
    }
    if let Some(preprocessor) = preprocessor {
        core = core.with_css_preprocessor(preprocessor);
    }
    if core.use_theme
        && let Some(theme) = options.theme.clone()
    {
        match theme_config(theme) {
            Ok(theme) => core = core.with_theme(theme),
            Err(err) => logs.push(TransformLog {
                level: LogLevel::Warn.as_str().to_string(),
                message: format!("{}; continuing without theme", err.reason),
            }),
        }
    }

    let Some(output) = flair_transform::transform(code, file_path, &core)
        .map_err(|err| to_napi_error(&err))?
    else {
        return Ok(None);
    };

    logs.extend(output.logs.into_iter().map(TransformLog::from));
    Ok(Some(TransformResult {
        code: output.code,
        sourcemap: output.sourcemap,
        css: output.css,
        generated_css_name: output.generated_css_name,
        logs,
    }))
}

/// Extract co-located CSS from a `.tsx`/`.jsx` module and rewrite its class
/// names. Returns `null` for other file types.
///
/// `cssPreprocessor` receives `(css, filePath)` for every style block and
/// returns the CSS to compile.
///
/// @example
/// ```javascript
/// import { transformCode } from '@flairjs/core';
///
/// const result = transformCode(source, '/src/Button.tsx', {
///   cssOutDir: '/node_modules/.flair',
/// });
/// ```
#[napi]
pub fn transform_code(
    code: String,
    file_path: String,
    options: Option<TransformOptions>,
    css_preprocessor: Option<Function<'_, FnArgs<(String, String)>, String>>,
) -> napi::Result<Option<TransformResult>> {
    let options = options.unwrap_or_default();
    match css_preprocessor {
        Some(callback) => {
            let preprocess = |css: &str, file_path: &str| -> Result<String, String> {
                callback
                    .call(FnArgs::from((css.to_string(), file_path.to_string())))
                    .map_err(|err| err.reason)
            };
            transform_impl(&code, &file_path, &options, Some(&preprocess))
        }
        None => transform_impl(&code, &file_path, &options, None),
    }
}

pub struct TransformTask {
    code: String,
    file_path: String,
    options: TransformOptions,
}

#[napi]
impl Task for TransformTask {
    type JsValue = Option<TransformResult>;
    type Output = Option<TransformResult>;

    fn compute(&mut self) -> napi::Result<Self::Output> {
        let code = mem::take(&mut self.code);
        transform_impl(&code, &self.file_path, &self.options, None)
    }

    fn resolve(&mut self, _: napi::Env, result: Self::Output) -> napi::Result<Self::JsValue> {
        Ok(result)
    }
}

/// Transform on a worker thread. JavaScript preprocessors cannot run off the
/// main thread, so this variant takes none.
#[napi]
pub fn transform_code_async(
    code: String,
    file_path: String,
    options: Option<TransformOptions>,
) -> AsyncTask<TransformTask> {
    AsyncTask::new(TransformTask {
        code,
        file_path,
        options: options.unwrap_or_default(),
    })
}

/// Render the CSS custom properties declared by a theme.
///
/// @example
/// ```javascript
/// buildThemeTokens({ prefix: 't', tokens: { colors: { red: { 100: '#fee' } } } });
/// // ':root {\n--t-colors-red-100: #fee;\n}\n'
/// ```
#[napi]
pub fn build_theme_tokens(
    theme: serde_json::Value,
    theme_name: Option<String>,
) -> napi::Result<String> {
    let config = theme_config(theme)?;
    Ok(flair_transform::build_theme_tokens(&config, theme_name.as_deref()))
}
