//! CSS module compilation.
//!
//! A style block is compiled once into a stylesheet plus a [`ClassExportMap`]
//! from authored class names to their scoped export names. The transform only
//! depends on the [`CssModuleCompiler`] trait; [`LightningCssCompiler`] is the
//! default implementation.

use lightningcss::css_modules;
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserFlags, ParserOptions, StyleSheet};
use lightningcss::targets::{Features, Targets};
use rustc_hash::FxHashMap;

use crate::error::CssCompileError;

/// Authored class name → compiled export name.
pub type ClassExportMap = FxHashMap<String, String>;

/// Whether class names in a block are scoped or left global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileMode {
    /// Class names are renamed and an export map is produced.
    #[default]
    Scoped,
    /// CSS is compiled as-is, the export map is empty.
    Global,
}

/// Output of compiling one style block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledCss {
    pub css: String,
    pub exports: ClassExportMap,
}

/// Compiles raw CSS into a stylesheet and class export map.
///
/// Implementations must be deterministic: the same `(raw_css, module_id)`
/// always yields the same export names, and distinct module ids must not
/// produce colliding names for the same authored class.
pub trait CssModuleCompiler: Send + Sync {
    fn compile(
        &self,
        raw_css: &str,
        module_id: &str,
        mode: CompileMode,
    ) -> Result<CompiledCss, CssCompileError>;
}

/// [`CssModuleCompiler`] backed by lightningcss.
///
/// Names follow the default CSS modules pattern `[hash]_[local]`, where the
/// hash is derived from the module id. Nesting is lowered and the output is
/// minified.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightningCssCompiler;

impl LightningCssCompiler {
    fn targets() -> Targets {
        Targets {
            include: Features::Nesting,
            ..Targets::default()
        }
    }
}

impl CssModuleCompiler for LightningCssCompiler {
    fn compile(
        &self,
        raw_css: &str,
        module_id: &str,
        mode: CompileMode,
    ) -> Result<CompiledCss, CssCompileError> {
        let options = ParserOptions {
            filename: module_id.to_string(),
            css_modules: match mode {
                CompileMode::Scoped => Some(css_modules::Config::default()),
                CompileMode::Global => None,
            },
            flags: ParserFlags::NESTING,
            ..ParserOptions::default()
        };

        let mut stylesheet = StyleSheet::parse(raw_css, options)
            .map_err(|err| CssCompileError::new(module_id, err))?;

        stylesheet
            .minify(MinifyOptions {
                targets: Self::targets(),
                ..MinifyOptions::default()
            })
            .map_err(|err| CssCompileError::new(module_id, err))?;

        let result = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                targets: Self::targets(),
                ..PrinterOptions::default()
            })
            .map_err(|err| CssCompileError::new(module_id, err))?;

        let exports = result
            .exports
            .unwrap_or_default()
            .into_iter()
            .map(|(local, export)| (local, export.name))
            .collect();

        Ok(CompiledCss {
            css: result.code,
            exports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(css: &str, module_id: &str) -> CompiledCss {
        LightningCssCompiler
            .compile(css, module_id, CompileMode::Scoped)
            .unwrap()
    }

    #[test]
    fn scoped_classes_are_exported() {
        let compiled = compile(".box { color: red; } .title { font-weight: bold; }", "a.tsx#Box");

        let box_name = &compiled.exports["box"];
        let title_name = &compiled.exports["title"];
        assert_ne!(box_name, "box");
        assert!(box_name.ends_with("_box"), "unexpected export {box_name}");
        assert!(compiled.css.contains(&format!(".{box_name}{{")), "{}", compiled.css);
        assert!(compiled.css.contains(&format!(".{title_name}{{")), "{}", compiled.css);
    }

    #[test]
    fn module_id_changes_export_names() {
        let first = compile(".box { color: red; }", "a.tsx#First");
        let second = compile(".box { color: red; }", "a.tsx#Second");
        assert_ne!(first.exports["box"], second.exports["box"]);
    }

    #[test]
    fn same_input_is_deterministic() {
        let first = compile(".box { color: red; }", "a.tsx#Box");
        let second = compile(".box { color: red; }", "a.tsx#Box");
        assert_eq!(first, second);
    }

    #[test]
    fn nesting_is_lowered() {
        let compiled = compile(".card { color: red; &:hover { color: blue; } }", "a.tsx#Card");
        let card = &compiled.exports["card"];
        assert!(compiled.css.contains(&format!(".{card}:hover")), "{}", compiled.css);
        assert!(!compiled.css.contains('&'), "{}", compiled.css);
    }

    #[test]
    fn global_mode_keeps_names() {
        let compiled = LightningCssCompiler
            .compile("body .box { margin: 0; }", "a.tsx#App", CompileMode::Global)
            .unwrap();
        assert!(compiled.exports.is_empty());
        assert_eq!(compiled.css, "body .box{margin:0}");
    }

    #[test]
    fn invalid_selector_is_an_error() {
        let err = LightningCssCompiler
            .compile("..box { color: red; }", "a.tsx#Box", CompileMode::Scoped)
            .unwrap_err();
        assert_eq!(err.module_id, "a.tsx#Box");
        assert!(err.to_string().starts_with("failed to compile css for a.tsx#Box"));
    }
}
