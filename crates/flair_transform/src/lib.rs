//! Flair Transform
//!
//! Compile-time extraction of component-scoped CSS from TSX/JSX modules.
//!
//! Component authors write CSS next to a component, either as the children of
//! a style marker or as a property assigned to the component:
//!
//! ```tsx
//! import { Style } from "@flairjs/client";
//!
//! export const Button = () => (
//!   <button className="button primary">
//!     Click
//!     <Style>{`.button { padding: 4px; } .primary { color: blue; }`}</Style>
//!   </button>
//! );
//! ```
//!
//! [`transform`] compiles every such block into a CSS-modules stylesheet and
//! rewrites the class names used inside the owning component to the compiled
//! names. Depending on [`OutputType`], the stylesheet is written next to a
//! side-effect import appended to the module, or to a single output file.
//!
//! ```
//! use flair_transform::{TransformOptions, transform};
//!
//! let code = "export const Box = () => <div className=\"box\" />;";
//! let output = transform(code, "Box.tsx", &TransformOptions::new()).unwrap().unwrap();
//! assert_eq!(output.code, code);
//! ```

mod background;
mod cache;
mod css_module;
mod diagnostic;
mod error;
mod extract;
mod locator;
mod options;
mod rewriter;
mod theme;
mod theme_loader;
mod transform;

pub use cache::{CssCache, STALE_FILE_DELAY, css_file_name, write_css_file};
pub use css_module::{
    ClassExportMap, CompileMode, CompiledCss, CssModuleCompiler, LightningCssCompiler,
};
pub use diagnostic::{Diagnostic, DiagnosticLabel, DiagnosticSeverity, LogEntry, LogLevel, Logs};
pub use error::{CacheError, CssCompileError, ThemeLoadError, TransformError};
pub use options::{
    ClassNameMatcher, ClassUtility, CssPreprocessor, DEFAULT_STYLE_PACKAGES, OutputType,
    TransformOptions,
};
pub use rewriter::map_class_tokens;
pub use theme::{
    SelectorFn, SubTheme, ThemeConfig, ThemeSelector, ThemeToken, ThemeTokens,
    build_theme_tokens, resolve_theme_references,
};
pub use theme_loader::{THEME_FILE_NAMES, ThemeLoader, ThemeWatch};
pub use transform::{TransformOutput, transform};
