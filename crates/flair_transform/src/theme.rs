//! Theme tokens.
//!
//! A [`ThemeConfig`] is a tree of design tokens. [`build_theme_tokens`] turns
//! it into CSS custom-property declarations, and
//! [`resolve_theme_references`] lets component CSS refer to those tokens as
//! `$colors.red.100` and to breakpoints as `@screen md`.

use std::fmt;
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde::Deserialize;

/// A token tree: names map to leaf values or nested groups.
pub type ThemeTokens = IndexMap<String, ThemeToken>;

/// One node of a token tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ThemeToken {
    Text(String),
    Number(serde_json::Number),
    Group(ThemeTokens),
    /// Booleans, nulls and arrays carry no CSS value and are skipped.
    Ignored(serde::de::IgnoredAny),
}

impl ThemeToken {
    fn leaf_value(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Number(number) => Some(number.to_string()),
            Self::Group(_) | Self::Ignored(_) => None,
        }
    }
}

/// Custom selector wrapper: `(declarations, theme_name) -> css`.
pub type SelectorFn = dyn Fn(&str, Option<&str>) -> String + Send + Sync;

/// How the declarations of a theme are wrapped.
#[derive(Clone)]
pub enum ThemeSelector {
    /// `selector {\n<declarations>}\n`
    Css(String),
    /// Fully custom output.
    Custom(Arc<SelectorFn>),
}

impl Default for ThemeSelector {
    fn default() -> Self {
        Self::Css(":root".to_string())
    }
}

impl From<String> for ThemeSelector {
    fn from(selector: String) -> Self {
        Self::Css(selector)
    }
}

impl From<&str> for ThemeSelector {
    fn from(selector: &str) -> Self {
        Self::Css(selector.to_string())
    }
}

impl<'de> Deserialize<'de> for ThemeSelector {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::Css)
    }
}

impl fmt::Debug for ThemeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => f.debug_tuple("Css").field(selector).finish(),
            Self::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

/// A named variant of the root theme (e.g. `dark`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTheme {
    pub tokens: ThemeTokens,
    #[serde(default)]
    pub selector: Option<ThemeSelector>,
    #[serde(default)]
    pub prefix: Option<String>,
}

/// User theme definition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeConfig {
    pub tokens: ThemeTokens,
    /// Breakpoint name → min width, used by `@screen`.
    #[serde(default)]
    pub breakpoints: IndexMap<String, ThemeToken>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub selector: ThemeSelector,
    #[serde(default)]
    pub themes: IndexMap<String, SubTheme>,
}

impl ThemeConfig {
    /// Parse a theme from its JSON representation.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Parse a theme from an already decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn with_selector(mut self, selector: impl Into<ThemeSelector>) -> Self {
        self.selector = selector.into();
        self
    }

    /// Look up a leaf token by its dotted path segments.
    pub fn token(&self, path: &[&str]) -> Option<String> {
        let (last, groups) = path.split_last()?;
        let mut current = &self.tokens;
        for segment in groups {
            match current.get(*segment)? {
                ThemeToken::Group(group) => current = group,
                _ => return None,
            }
        }
        current.get(*last)?.leaf_value()
    }

    fn breakpoint(&self, name: &str) -> Option<String> {
        let token = self.breakpoints.get(name)?;
        match token {
            ThemeToken::Number(number) => Some(format!("{number}px")),
            other => other.leaf_value(),
        }
    }

    fn variable_name(&self, path: &[&str]) -> String {
        let mut name = String::from("--");
        if let Some(prefix) = &self.prefix {
            name.push_str(prefix);
            name.push('-');
        }
        name.push_str(&path.join("-"));
        name
    }
}

/// Render the custom-property declarations for a theme and its sub-themes.
///
/// Leaves emit `--<prefix>-<path…>: <value>;\n` in insertion order. The root
/// block is wrapped by the theme selector; each sub-theme inherits the root
/// prefix and selector unless it overrides them, and its name is passed to a
/// custom selector.
pub fn build_theme_tokens(config: &ThemeConfig, theme_name: Option<&str>) -> String {
    let mut css = render_theme(
        &config.tokens,
        config.prefix.as_deref(),
        &config.selector,
        theme_name,
    );

    for (name, theme) in &config.themes {
        css.push_str(&render_theme(
            &theme.tokens,
            theme.prefix.as_deref().or(config.prefix.as_deref()),
            theme.selector.as_ref().unwrap_or(&config.selector),
            Some(name),
        ));
    }

    css
}

fn render_theme(
    tokens: &ThemeTokens,
    prefix: Option<&str>,
    selector: &ThemeSelector,
    theme_name: Option<&str>,
) -> String {
    let mut declarations = String::new();
    let mut path: Vec<&str> = prefix.into_iter().collect();
    collect_declarations(tokens, &mut path, &mut declarations);

    match selector {
        ThemeSelector::Css(selector) => format!("{selector} {{\n{declarations}}}\n"),
        ThemeSelector::Custom(wrap) => wrap(&declarations, theme_name),
    }
}

/// Array-index keys (`"0"`, `"100"`) ascending, then the other keys in
/// insertion order. This is the order JavaScript enumerates object keys in.
fn ordered_tokens(tokens: &ThemeTokens) -> Vec<(&String, &ThemeToken)> {
    let mut entries: Vec<_> = tokens.iter().collect();
    entries.sort_by_key(|(key, _)| array_index(key).map_or((1, 0), |index| (0, index)));
    entries
}

fn array_index(key: &str) -> Option<u32> {
    let canonical = !key.is_empty()
        && key.bytes().all(|byte| byte.is_ascii_digit())
        && (key.len() == 1 || !key.starts_with('0'));
    if !canonical {
        return None;
    }
    key.parse::<u32>().ok().filter(|&index| index != u32::MAX)
}

fn collect_declarations<'t>(tokens: &'t ThemeTokens, path: &mut Vec<&'t str>, out: &mut String) {
    for (key, token) in ordered_tokens(tokens) {
        path.push(key);
        match token {
            ThemeToken::Group(group) => collect_declarations(group, path, out),
            leaf => {
                if let Some(value) = leaf.leaf_value() {
                    out.push_str("--");
                    out.push_str(&path.join("-"));
                    out.push_str(": ");
                    out.push_str(&value);
                    out.push_str(";\n");
                }
            }
        }
        path.pop();
    }
}

static TOKEN_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([A-Za-z_][\w-]*(?:\.[\w-]+)+)").expect("token reference pattern is valid")
});

static SCREEN_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@screen\s+([A-Za-z0-9_-]+)").expect("screen rule pattern is valid")
});

/// Replace `$group.token` references with `var(--…)` and `@screen name` with
/// a min-width media query.
///
/// Unknown references are left as written and returned as the second value.
pub fn resolve_theme_references(css: &str, theme: &ThemeConfig) -> (String, Vec<String>) {
    let mut unresolved = Vec::new();

    let css = TOKEN_REFERENCE.replace_all(css, |caps: &Captures<'_>| {
        let path: Vec<&str> = caps[1].split('.').collect();
        if theme.token(&path).is_some() {
            format!("var({})", theme.variable_name(&path))
        } else {
            unresolved.push(caps[0].to_string());
            caps[0].to_string()
        }
    });

    let css = SCREEN_RULE.replace_all(&css, |caps: &Captures<'_>| {
        if let Some(width) = theme.breakpoint(&caps[1]) {
            format!("@media (min-width: {width})")
        } else {
            unresolved.push(caps[0].to_string());
            caps[0].to_string()
        }
    });

    (css.into_owned(), unresolved)
}
