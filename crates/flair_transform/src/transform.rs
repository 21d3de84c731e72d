//! The transform pipeline.

use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_ast::ast::{ImportOrExportKind, Program, Statement};
use oxc_ast::{AstBuilder, NONE};
use oxc_ast_visit::VisitMut;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::{SPAN, SourceType, Span};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::cache::{self, write_css_file};
use crate::css_module::{ClassExportMap, CompileMode};
use crate::diagnostic::{Diagnostic, LogEntry, Logs};
use crate::error::{CacheError, TransformError};
use crate::locator::{ImportBindings, StyleBlock, locate_style_blocks};
use crate::options::{OutputType, TransformOptions};
use crate::rewriter::{ClassNameRewriter, MarkerRemover};
use crate::theme::resolve_theme_references;

/// Result of transforming one module.
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub code: String,
    /// Source map JSON, absent when the code was returned untouched.
    pub sourcemap: Option<String>,
    /// Compiled CSS of every style block in the module.
    pub css: Option<String>,
    /// File name written to the CSS output directory (`inject-import` only).
    pub generated_css_name: Option<String>,
    pub logs: Vec<LogEntry>,
}

impl TransformOutput {
    fn unchanged(code: &str, logs: Logs) -> Self {
        Self {
            code: code.to_string(),
            logs: logs.into_entries(),
            ..Self::default()
        }
    }
}

/// Source type for a module path, if the transform handles it.
fn source_type_for(file_path: &str) -> Option<SourceType> {
    match Path::new(file_path).extension()?.to_str()? {
        "tsx" => Some(SourceType::tsx()),
        "jsx" => Some(SourceType::jsx()),
        _ => None,
    }
}

/// Extract the co-located CSS of `code` and rewrite its class references.
///
/// Returns `Ok(None)` for files that are not `.tsx` or `.jsx`. A module
/// without style blocks comes back byte-identical.
///
/// # Errors
///
/// Fails when the module does not parse, a style block does not compile, or
/// the configured CSS preprocessor rejects a block. Everything else is
/// reported through [`TransformOutput::logs`].
pub fn transform(
    code: &str,
    file_path: &str,
    options: &TransformOptions<'_>,
) -> Result<Option<TransformOutput>, TransformError> {
    let Some(source_type) = source_type_for(file_path) else {
        return Ok(None);
    };

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, source_type).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return Err(TransformError::Parse {
            file_path: file_path.to_string(),
            diagnostics: Diagnostic::from_oxc_list(code, &ret.errors),
        });
    }
    let mut program = ret.program;
    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();

    let mut logs = Logs::default();
    for pattern in options.class_name_list.rejected_patterns() {
        logs.warn(format!(
            "class name pattern `{pattern}` is not a valid regular expression; matching it literally"
        ));
    }

    let bindings = ImportBindings::collect(&program, options);
    let located = locate_style_blocks(&program, &scoping, &bindings, options, code, &mut logs);
    if located.blocks.is_empty() {
        return Ok(Some(TransformOutput::unchanged(code, logs)));
    }

    let compiled = compile_blocks(&located.blocks, file_path, options, &mut logs)?;
    let css = compiled.css.join("\n");

    let generated_css_name = match options.output_type {
        OutputType::InjectImport => match persist_css(file_path, &css, options) {
            Ok(name) => Some(name),
            Err(err) => {
                logs.error(format!("{file_path}: {err}"));
                return Ok(Some(TransformOutput {
                    css: Some(css),
                    ..TransformOutput::unchanged(code, logs)
                }));
            }
        },
        OutputType::WriteCssFile => {
            let written = options
                .output_path
                .as_deref()
                .ok_or(CacheError::MissingOutputPath)
                .and_then(|path| write_css_file(path, &css));
            if let Err(err) = written {
                logs.error(format!("{file_path}: {err}"));
            }
            None
        }
    };

    let ast = AstBuilder::new(&allocator);
    ClassNameRewriter::new(
        ast,
        &scoping,
        &options.class_name_list,
        &bindings.class_utilities,
        &compiled.owners,
    )
    .rewrite(&mut program);

    if options.production {
        let markers: FxHashSet<Span> = located.marker_spans.iter().copied().collect();
        MarkerRemover::new(&markers).visit_program(&mut program);
    }

    if let Some(name) = &generated_css_name {
        inject_import(ast, &mut program, &import_specifier(name, options));
    }

    let codegen_options = CodegenOptions {
        source_map_path: Some(PathBuf::from(file_path)),
        ..CodegenOptions::default()
    };
    let printed = Codegen::new().with_options(codegen_options).build(&program);

    Ok(Some(TransformOutput {
        code: printed.code,
        sourcemap: printed.map.map(|map| map.to_json_string()),
        css: Some(css),
        generated_css_name,
        logs: logs.into_entries(),
    }))
}

struct CompiledBlocks {
    css: Vec<String>,
    /// Merged export map of every owner with a scoped block.
    owners: FxHashMap<Span, ClassExportMap>,
}

fn compile_blocks(
    blocks: &[StyleBlock],
    file_path: &str,
    options: &TransformOptions<'_>,
    logs: &mut Logs,
) -> Result<CompiledBlocks, TransformError> {
    let theme = if options.use_theme {
        if options.theme.is_none() {
            logs.warn("useTheme is enabled but no theme was provided; theme references are left as-is");
        }
        options.theme.as_deref()
    } else {
        None
    };

    let mut compiled = CompiledBlocks {
        css: Vec::with_capacity(blocks.len()),
        owners: FxHashMap::default(),
    };

    for block in blocks {
        let module_id = block.module_id(file_path);

        let mut raw_css = match theme {
            Some(theme) => {
                let (resolved, unresolved) = resolve_theme_references(&block.raw_css, theme);
                for reference in unresolved {
                    logs.warn(format!("{module_id}: unknown theme token `{reference}`"));
                }
                resolved
            }
            None => block.raw_css.clone(),
        };

        if let Some(preprocessor) = options.css_preprocessor {
            raw_css = preprocessor.process(&raw_css, file_path).map_err(|message| {
                TransformError::Preprocess {
                    file_path: file_path.to_string(),
                    message,
                }
            })?;
        }

        let mode = if block.is_global { CompileMode::Global } else { CompileMode::Scoped };
        let output = options.css_compiler.compile(&raw_css, &module_id, mode)?;

        if mode == CompileMode::Scoped {
            compiled
                .owners
                .entry(block.owner.span)
                .or_default()
                .extend(output.exports);
        }
        compiled.css.push(output.css);
    }

    Ok(compiled)
}

fn persist_css(
    file_path: &str,
    css: &str,
    options: &TransformOptions<'_>,
) -> Result<String, CacheError> {
    let out_dir = options.css_out_dir.as_deref().ok_or(CacheError::MissingOutDir)?;
    let timestamp = options.append_timestamp_to_css_file.then(cache::unix_millis);
    options.cache().persist(out_dir, file_path, css, timestamp)
}

fn import_specifier(name: &str, options: &TransformOptions<'_>) -> String {
    match (&options.css_import_prefix, &options.css_out_dir) {
        (Some(prefix), _) => format!("{}/{name}", prefix.trim_end_matches('/')),
        (None, Some(out_dir)) => out_dir.join(name).to_string_lossy().replace('\\', "/"),
        (None, None) => name.to_string(),
    }
}

fn inject_import<'a>(ast: AstBuilder<'a>, program: &mut Program<'a>, specifier: &str) {
    let source = ast.string_literal(SPAN, ast.atom(specifier), None);
    let import = ast.module_declaration_import_declaration(
        SPAN,
        None,
        source,
        None,
        NONE,
        ImportOrExportKind::Value,
    );
    program.body.push(Statement::from(import));
}
