//! Raw CSS extraction from style blocks.

use oxc_ast::ast::*;

/// Concatenate the CSS carried by the children of a style-marker element.
///
/// Text children and the static parts of template literals (tagged or not)
/// are joined in document order. Interpolations are dropped.
pub fn marker_css(element: &JSXElement<'_>) -> String {
    let mut css = String::new();
    for child in &element.children {
        match child {
            JSXChild::Text(text) => css.push_str(&text.value),
            JSXChild::ExpressionContainer(container) => match &container.expression {
                JSXExpression::TemplateLiteral(template) => push_quasis(&mut css, template),
                JSXExpression::TaggedTemplateExpression(tagged) => {
                    push_quasis(&mut css, &tagged.quasi);
                }
                JSXExpression::StringLiteral(literal) => css.push_str(&literal.value),
                _ => {}
            },
            _ => {}
        }
    }
    css
}

/// The static text of a template literal.
pub fn template_css(template: &TemplateLiteral<'_>) -> String {
    let mut css = String::new();
    push_quasis(&mut css, template);
    css
}

fn push_quasis(css: &mut String, template: &TemplateLiteral<'_>) {
    for quasi in &template.quasis {
        css.push_str(&quasi.value.raw);
    }
}

/// Render a `flair({...})` style object as CSS.
///
/// Keys with object values are selectors and are kept verbatim; other keys
/// are properties and go from camelCase to kebab-case. String, number and
/// boolean values are supported, anything else is skipped.
pub fn object_css(object: &ObjectExpression<'_>) -> String {
    let mut css = String::new();
    for property in &object.properties {
        let ObjectPropertyKind::ObjectProperty(property) = property else {
            continue;
        };
        let key = match &property.key {
            PropertyKey::StringLiteral(literal) => literal.value.as_str(),
            PropertyKey::StaticIdentifier(ident) => ident.name.as_str(),
            _ => continue,
        };
        match &property.value {
            Expression::ObjectExpression(nested) => {
                css.push_str(key);
                css.push_str(" {\n");
                css.push_str(&object_css(nested));
                css.push_str("}\n");
            }
            value => {
                let Some(value) = literal_value(value) else {
                    continue;
                };
                css.push_str(&camel_to_kebab(key));
                css.push_str(": ");
                css.push_str(&value);
                css.push_str(";\n");
            }
        }
    }
    css
}

fn literal_value(expression: &Expression<'_>) -> Option<String> {
    match expression {
        Expression::StringLiteral(literal) => Some(literal.value.to_string()),
        Expression::NumericLiteral(literal) => Some(literal.value.to_string()),
        Expression::BooleanLiteral(literal) => Some(literal.value.to_string()),
        Expression::TemplateLiteral(template) if template.expressions.is_empty() => {
            Some(template_css(template))
        }
        _ => None,
    }
}

/// `backgroundColor` → `background-color`. Custom properties are untouched.
fn camel_to_kebab(key: &str) -> String {
    if key.starts_with("--") {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
