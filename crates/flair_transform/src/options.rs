//! Options for the flair transform.
//!
//! [`TransformOptions`] is built once per host configuration and shared by
//! every call to [`crate::transform`]. All fields have working defaults, so
//! `TransformOptions::new().with_css_out_dir(dir)` is a complete setup for
//! the import-injecting output mode.

use std::path::PathBuf;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use rustc_hash::FxHashSet;

use crate::cache::CssCache;
use crate::css_module::{CssModuleCompiler, LightningCssCompiler};
use crate::theme::ThemeConfig;

/// Packages whose `Style`, `flair`, `css`, `c` and `cn` exports are recognized.
pub const DEFAULT_STYLE_PACKAGES: [&str; 5] = [
    "@flairjs/client",
    "@flairjs/client/react",
    "@flairjs/client/preact",
    "@flairjs/client/solid",
    "@flairjs/react",
];

/// How compiled CSS leaves the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputType {
    /// Write a content-addressed CSS file per module and append a side-effect
    /// import of it to the module.
    #[default]
    InjectImport,
    /// Write the module's CSS to a single configured path, with no import.
    WriteCssFile,
}

impl OutputType {
    /// Parse the host-facing name (`"inject-import"` / `"write-css-file"`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "inject-import" => Some(Self::InjectImport),
            "write-css-file" => Some(Self::WriteCssFile),
            _ => None,
        }
    }
}

/// Hook run on raw CSS before it reaches the CSS module compiler.
pub trait CssPreprocessor {
    /// Returns the processed CSS, or a message describing the failure.
    fn process(&self, css: &str, file_path: &str) -> Result<String, String>;
}

impl<F> CssPreprocessor for F
where
    F: Fn(&str, &str) -> Result<String, String>,
{
    fn process(&self, css: &str, file_path: &str) -> Result<String, String> {
        self(css, file_path)
    }
}

/// A function treated as a class-list utility, e.g. `clsx` or `cn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassUtility {
    /// Module specifier the function is imported from.
    pub package: String,
    /// Export name, or `None` for the default export.
    pub export: Option<String>,
}

impl ClassUtility {
    pub fn named(package: impl Into<String>, export: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            export: Some(export.into()),
        }
    }

    pub fn default_export(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            export: None,
        }
    }
}

fn default_class_utilities() -> Vec<ClassUtility> {
    let mut utilities = Vec::new();
    for package in DEFAULT_STYLE_PACKAGES {
        utilities.push(ClassUtility::named(package, "c"));
        utilities.push(ClassUtility::named(package, "cn"));
    }
    utilities.push(ClassUtility::default_export("clsx"));
    utilities.push(ClassUtility::named("clsx", "clsx"));
    utilities.push(ClassUtility::default_export("classnames"));
    utilities
}

/// Decides which JSX attributes carry class names.
///
/// `className` always matches. Extra entries are attribute names, or regular
/// expressions written as `/pattern/flags`.
#[derive(Debug, Clone)]
pub struct ClassNameMatcher {
    names: FxHashSet<String>,
    patterns: Vec<Regex>,
    rejected: Vec<String>,
}

impl Default for ClassNameMatcher {
    fn default() -> Self {
        let mut names = FxHashSet::default();
        names.insert("className".to_string());
        Self {
            names,
            patterns: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl ClassNameMatcher {
    /// Build a matcher from host entries.
    ///
    /// An entry that looks like a regular expression but does not compile is
    /// kept as a literal name and reported by [`Self::rejected_patterns`].
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Self {
        let mut matcher = Self::default();
        for entry in entries {
            matcher.add(entry.as_ref());
        }
        matcher
    }

    pub fn add(&mut self, entry: &str) {
        match parse_regex_literal(entry) {
            Some(Ok(regex)) => self.patterns.push(regex),
            Some(Err(_)) => {
                self.rejected.push(entry.to_string());
                self.names.insert(entry.to_string());
            }
            None => {
                self.names.insert(entry.to_string());
            }
        }
    }

    pub fn matches(&self, attribute: &str) -> bool {
        self.names.contains(attribute) || self.patterns.iter().any(|re| re.is_match(attribute))
    }

    /// Entries written as `/…/` that failed to compile.
    pub fn rejected_patterns(&self) -> &[String] {
        &self.rejected
    }
}

/// `/pattern/flags` → regex. `None` when the entry is not in that form.
fn parse_regex_literal(entry: &str) -> Option<Result<Regex, regex::Error>> {
    let body = entry.strip_prefix('/')?;
    let end = body.rfind('/')?;
    let (pattern, flags) = (&body[..end], &body[end + 1..]);
    if pattern.is_empty() || !flags.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(
        RegexBuilder::new(pattern)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .build(),
    )
}

/// Options for a flair transform.
pub struct TransformOptions<'p> {
    /// Directory receiving generated CSS files in [`OutputType::InjectImport`]
    /// mode. Created on demand.
    pub css_out_dir: Option<PathBuf>,

    /// Module specifier prefix used for the injected import, e.g.
    /// `"@flairjs/client/generated-css"`. When `None`, the import points at
    /// the generated file's path.
    pub css_import_prefix: Option<String>,

    /// Attributes whose values are rewritten.
    pub class_name_list: ClassNameMatcher,

    /// Resolve `$token.path` references and `@screen` rules against [`Self::theme`].
    pub use_theme: bool,

    /// The loaded theme, if any.
    pub theme: Option<Arc<ThemeConfig>>,

    /// Called on raw CSS before compilation.
    pub css_preprocessor: Option<&'p dyn CssPreprocessor>,

    /// Append a `-<unix millis>` suffix to generated file names so every
    /// rebuild produces a fresh file.
    ///
    /// @default false
    pub append_timestamp_to_css_file: bool,

    pub output_type: OutputType,

    /// Destination for [`OutputType::WriteCssFile`].
    pub output_path: Option<PathBuf>,

    /// Remove `<Style>` elements from the emitted code.
    ///
    /// @default false
    pub production: bool,

    /// Packages recognized as flair style sources.
    pub style_packages: Vec<String>,

    /// Functions whose arguments are rewritten as class lists.
    pub class_utilities: Vec<ClassUtility>,

    /// Property name that attaches scoped CSS to a component.
    ///
    /// @default "flair"
    pub style_property: String,

    /// Property name that attaches global CSS to a component.
    ///
    /// @default "globalFlair"
    pub global_style_property: String,

    pub css_compiler: Arc<dyn CssModuleCompiler>,

    /// Cache of generated file names. `None` uses [`CssCache::global`].
    pub cache: Option<Arc<CssCache>>,
}

impl Default for TransformOptions<'_> {
    fn default() -> Self {
        Self {
            css_out_dir: None,
            css_import_prefix: None,
            class_name_list: ClassNameMatcher::default(),
            use_theme: false,
            theme: None,
            css_preprocessor: None,
            append_timestamp_to_css_file: false,
            output_type: OutputType::default(),
            output_path: None,
            production: false,
            style_packages: DEFAULT_STYLE_PACKAGES.iter().map(ToString::to_string).collect(),
            class_utilities: default_class_utilities(),
            style_property: "flair".to_string(),
            global_style_property: "globalFlair".to_string(),
            css_compiler: Arc::new(LightningCssCompiler),
            cache: None,
        }
    }
}

impl std::fmt::Debug for TransformOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformOptions")
            .field("css_out_dir", &self.css_out_dir)
            .field("css_import_prefix", &self.css_import_prefix)
            .field("class_name_list", &self.class_name_list)
            .field("use_theme", &self.use_theme)
            .field("theme", &self.theme)
            .field(
                "css_preprocessor",
                &self.css_preprocessor.as_ref().map(|_| "Some(<fn>)"),
            )
            .field("append_timestamp_to_css_file", &self.append_timestamp_to_css_file)
            .field("output_type", &self.output_type)
            .field("output_path", &self.output_path)
            .field("production", &self.production)
            .field("style_packages", &self.style_packages)
            .field("class_utilities", &self.class_utilities)
            .field("style_property", &self.style_property)
            .field("global_style_property", &self.global_style_property)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<'p> TransformOptions<'p> {
    /// Create new options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_css_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.css_out_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_css_import_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.css_import_prefix = Some(prefix.into());
        self
    }

    /// Add attribute names (or `/regex/` entries) to the class-name list.
    #[must_use]
    pub fn with_class_name_list<S: AsRef<str>>(mut self, entries: &[S]) -> Self {
        for entry in entries {
            self.class_name_list.add(entry.as_ref());
        }
        self
    }

    /// Enable theme resolution with the given theme.
    #[must_use]
    pub fn with_theme(mut self, theme: impl Into<Arc<ThemeConfig>>) -> Self {
        self.use_theme = true;
        self.theme = Some(theme.into());
        self
    }

    #[must_use]
    pub fn with_use_theme(mut self, enabled: bool) -> Self {
        self.use_theme = enabled;
        self
    }

    #[must_use]
    pub fn with_css_preprocessor(mut self, preprocessor: &'p dyn CssPreprocessor) -> Self {
        self.css_preprocessor = Some(preprocessor);
        self
    }

    #[must_use]
    pub fn with_append_timestamp_to_css_file(mut self, enabled: bool) -> Self {
        self.append_timestamp_to_css_file = enabled;
        self
    }

    /// Switch to [`OutputType::WriteCssFile`] with the given destination.
    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_type = OutputType::WriteCssFile;
        self.output_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = output_type;
        self
    }

    #[must_use]
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    #[must_use]
    pub fn with_class_utility(mut self, utility: ClassUtility) -> Self {
        self.class_utilities.push(utility);
        self
    }

    #[must_use]
    pub fn with_style_package(mut self, package: impl Into<String>) -> Self {
        self.style_packages.push(package.into());
        self
    }

    #[must_use]
    pub fn with_css_compiler(mut self, compiler: Arc<dyn CssModuleCompiler>) -> Self {
        self.css_compiler = compiler;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<CssCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub(crate) fn cache(&self) -> &CssCache {
        self.cache.as_deref().unwrap_or_else(|| CssCache::global())
    }

    pub(crate) fn is_style_package(&self, specifier: &str) -> bool {
        self.style_packages.iter().any(|package| package == specifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_name_is_always_matched() {
        let matcher = ClassNameMatcher::from_entries(&["containerClass"]);
        assert!(matcher.matches("className"));
        assert!(matcher.matches("containerClass"));
        assert!(!matcher.matches("class"));
    }

    #[test]
    fn regex_entries_match_attribute_names() {
        let matcher = ClassNameMatcher::from_entries(&["/^class[A-Z][A-Za-z0-9_]*/"]);
        assert!(matcher.matches("classHeader"));
        assert!(!matcher.matches("headerClass"));
        assert!(matcher.rejected_patterns().is_empty());
    }

    #[test]
    fn regex_flags_are_honored() {
        let matcher = ClassNameMatcher::from_entries(&["/Classes$/i"]);
        assert!(matcher.matches("innerclasses"));
    }

    #[test]
    fn invalid_regex_falls_back_to_literal() {
        let matcher = ClassNameMatcher::from_entries(&["/(unclosed/"]);
        assert_eq!(matcher.rejected_patterns(), ["/(unclosed/"]);
        assert!(matcher.matches("/(unclosed/"));
    }

    #[test]
    fn plain_slash_is_a_literal() {
        assert!(parse_regex_literal("/").is_none());
        assert!(parse_regex_literal("tw").is_none());
        assert!(parse_regex_literal("//").is_none());
    }

    #[test]
    fn output_type_names() {
        assert_eq!(OutputType::from_name("inject-import"), Some(OutputType::InjectImport));
        assert_eq!(OutputType::from_name("write-css-file"), Some(OutputType::WriteCssFile));
        assert_eq!(OutputType::from_name("css"), None);
    }

    #[test]
    fn output_path_switches_mode() {
        let options = TransformOptions::new().with_output_path("dist/app.css");
        assert_eq!(options.output_type, OutputType::WriteCssFile);
    }

    #[test]
    fn style_packages_are_exact_matches() {
        let options = TransformOptions::new().with_style_package("my-flair");
        assert!(options.is_style_package("@flairjs/client"));
        assert!(options.is_style_package("my-flair"));
        assert!(!options.is_style_package("@flairjs/client/extra"));
    }
}
