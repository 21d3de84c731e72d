//! Style-block discovery.
//!
//! Two passes over the immutable AST:
//!
//! 1. [`ImportBindings::collect`] resolves which local symbols are the style
//!    marker, the style factories (`flair`, `css`) and the class-list
//!    utilities, through whatever aliases the module imports them under.
//! 2. [`locate_style_blocks`] walks the program with a stack of component
//!    boundaries. A marker element belongs to the innermost boundary; a
//!    top-level `Component.flair = …` assignment belongs to the declaration of
//!    `Component`.

use oxc_ast::ast::*;
use oxc_ast_visit::{Visit, walk};
use oxc_semantic::Scoping;
use oxc_span::Span;
use oxc_syntax::operator::AssignmentOperator;
use oxc_syntax::scope::ScopeFlags;
use oxc_syntax::symbol::SymbolId;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::diagnostic::{Logs, byte_offset_to_line_column};
use crate::extract;
use crate::options::TransformOptions;

const STYLE_MARKER: &str = "Style";
const STYLE_FACTORIES: [&str; 2] = ["flair", "css"];

/// Local symbols bound to flair imports.
#[derive(Debug, Default)]
pub struct ImportBindings {
    pub markers: FxHashSet<SymbolId>,
    pub factories: FxHashSet<SymbolId>,
    pub class_utilities: FxHashSet<SymbolId>,
}

impl ImportBindings {
    pub fn collect(program: &Program<'_>, options: &TransformOptions<'_>) -> Self {
        let mut bindings = Self::default();

        for statement in &program.body {
            let Statement::ImportDeclaration(decl) = statement else {
                continue;
            };
            if decl.import_kind.is_type() {
                continue;
            }
            let Some(specifiers) = &decl.specifiers else {
                continue;
            };
            let source = decl.source.value.as_str();
            let is_style_package = options.is_style_package(source);

            for specifier in specifiers {
                match specifier {
                    ImportDeclarationSpecifier::ImportSpecifier(spec) => {
                        if spec.import_kind.is_type() {
                            continue;
                        }
                        let imported = spec.imported.name();
                        let symbol_id = spec.local.symbol_id();
                        if is_style_package && imported.as_str() == STYLE_MARKER {
                            bindings.markers.insert(symbol_id);
                        }
                        if is_style_package && STYLE_FACTORIES.contains(&imported.as_str()) {
                            bindings.factories.insert(symbol_id);
                        }
                        if options.class_utilities.iter().any(|utility| {
                            utility.package == source
                                && utility.export.as_deref() == Some(imported.as_str())
                        }) {
                            bindings.class_utilities.insert(symbol_id);
                        }
                    }
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(spec) => {
                        if options
                            .class_utilities
                            .iter()
                            .any(|utility| utility.package == source && utility.export.is_none())
                        {
                            bindings.class_utilities.insert(spec.local.symbol_id());
                        }
                    }
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(_) => {}
                }
            }
        }

        bindings
    }
}

/// The function or class that owns a style block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentBoundary {
    /// Span of the owning function, arrow or class node.
    pub span: Span,
    pub name: Option<String>,
}

/// A CSS-bearing region of a module.
#[derive(Debug, Clone)]
pub struct StyleBlock {
    pub raw_css: String,
    pub owner: ComponentBoundary,
    pub is_global: bool,
    /// Identifies the owner within the module; blocks of one owner share it.
    pub owner_key: String,
}

impl StyleBlock {
    /// Module id handed to the CSS module compiler.
    pub fn module_id(&self, file_path: &str) -> String {
        format!("{file_path}#{}", self.owner_key)
    }
}

/// Result of [`locate_style_blocks`].
#[derive(Debug, Default)]
pub struct LocatedStyles {
    pub blocks: Vec<StyleBlock>,
    /// Spans of every marker element, owned or not.
    pub marker_spans: Vec<Span>,
}

/// Find every style block in `program`.
///
/// Blocks without a resolvable owner are skipped with an `info` log.
pub fn locate_style_blocks(
    program: &Program<'_>,
    scoping: &Scoping,
    bindings: &ImportBindings,
    options: &TransformOptions<'_>,
    source_text: &str,
    logs: &mut Logs,
) -> LocatedStyles {
    let mut locator = StyleLocator {
        scoping,
        bindings,
        source_text,
        logs,
        boundaries: Vec::new(),
        declarations: FxHashMap::default(),
        boundary_names: FxHashMap::default(),
        located: LocatedStyles::default(),
    };
    locator.visit_program(program);
    locator.collect_property_blocks(program, options);

    let StyleLocator {
        boundary_names,
        mut located,
        ..
    } = locator;
    assign_owner_keys(&mut located.blocks, &boundary_names);
    located
}

fn assign_owner_keys(blocks: &mut [StyleBlock], names: &FxHashMap<Span, String>) {
    let mut keys: FxHashMap<Span, String> = FxHashMap::default();
    let mut taken: FxHashSet<String> = FxHashSet::default();

    for block in blocks {
        if block.owner.name.is_none() {
            block.owner.name = names.get(&block.owner.span).cloned();
        }
        let span = block.owner.span;
        let key = keys.entry(span).or_insert_with(|| {
            let key = match &block.owner.name {
                Some(name) if !taken.contains(name) => name.clone(),
                Some(name) => format!("{name}@{}", span.start),
                None => span.start.to_string(),
            };
            taken.insert(key.clone());
            key
        });
        block.owner_key.clone_from(key);
    }
}

struct StyleLocator<'s> {
    scoping: &'s Scoping,
    bindings: &'s ImportBindings,
    source_text: &'s str,
    logs: &'s mut Logs,
    boundaries: Vec<ComponentBoundary>,
    /// Declared components by symbol, for property assignments.
    declarations: FxHashMap<SymbolId, ComponentBoundary>,
    /// Binding names of anonymous boundaries (`const Box = () => …`).
    boundary_names: FxHashMap<Span, String>,
    located: LocatedStyles,
}

impl StyleLocator<'_> {
    fn position(&self, span: Span) -> String {
        let (line, column) = byte_offset_to_line_column(self.source_text, span.start as usize);
        format!("{line}:{column}")
    }

    fn resolve(&self, ident: &IdentifierReference<'_>) -> Option<SymbolId> {
        self.scoping.get_reference(ident.reference_id()).symbol_id()
    }

    fn is_marker(&self, name: &JSXElementName<'_>) -> bool {
        match name {
            JSXElementName::IdentifierReference(ident) => self
                .resolve(ident)
                .is_some_and(|symbol_id| self.bindings.markers.contains(&symbol_id)),
            _ => false,
        }
    }

    fn is_factory_call(&self, call: &CallExpression<'_>) -> bool {
        match &call.callee {
            Expression::Identifier(ident) => self
                .resolve(ident)
                .is_some_and(|symbol_id| self.bindings.factories.contains(&symbol_id)),
            _ => false,
        }
    }

    fn with_boundary(&mut self, boundary: ComponentBoundary, f: impl FnOnce(&mut Self)) {
        self.boundaries.push(boundary);
        f(self);
        self.boundaries.pop();
    }

    fn collect_property_blocks(&mut self, program: &Program<'_>, options: &TransformOptions<'_>) {
        for statement in &program.body {
            let Statement::ExpressionStatement(statement) = statement else {
                continue;
            };
            let Expression::AssignmentExpression(assignment) = &statement.expression else {
                continue;
            };
            if assignment.operator != AssignmentOperator::Assign {
                continue;
            }
            let AssignmentTarget::StaticMemberExpression(member) = &assignment.left else {
                continue;
            };
            let property = member.property.name.as_str();
            let is_global = if property == options.style_property {
                false
            } else if property == options.global_style_property {
                true
            } else {
                continue;
            };
            let Expression::Identifier(object) = &member.object else {
                continue;
            };

            let owner = self
                .resolve(object)
                .and_then(|symbol_id| self.declarations.get(&symbol_id))
                .cloned();
            let Some(owner) = owner else {
                let message = format!(
                    "{}: `{}.{property}` does not refer to a component declared in this module; skipped",
                    self.position(statement.span),
                    object.name
                );
                self.logs.info(message);
                continue;
            };

            let raw_css = match &assignment.right {
                Expression::StringLiteral(literal) => literal.value.to_string(),
                Expression::TemplateLiteral(template) => extract::template_css(template),
                Expression::TaggedTemplateExpression(tagged) => extract::template_css(&tagged.quasi),
                Expression::ObjectExpression(object) => extract::object_css(object),
                Expression::CallExpression(call) if self.is_factory_call(call) => {
                    match call.arguments.first().and_then(Argument::as_expression) {
                        Some(Expression::ObjectExpression(object)) => extract::object_css(object),
                        _ => {
                            let message = format!(
                                "{}: `{}` expects a style object; skipped",
                                self.position(call.span),
                                object.name
                            );
                            self.logs.info(message);
                            continue;
                        }
                    }
                }
                _ => {
                    let message = format!(
                        "{}: unsupported value for `{}.{property}`; skipped",
                        self.position(statement.span),
                        object.name
                    );
                    self.logs.info(message);
                    continue;
                }
            };

            self.located.blocks.push(StyleBlock {
                raw_css,
                owner,
                is_global,
                owner_key: String::new(),
            });
        }
    }
}

/// The component a declarator initializer defines, looking through wrapper
/// calls such as `forwardRef(…)` and `memo(…)`.
fn initializer_boundary(expression: &Expression<'_>) -> Option<ComponentBoundary> {
    match expression {
        Expression::FunctionExpression(function) => Some(ComponentBoundary {
            span: function.span,
            name: None,
        }),
        Expression::ArrowFunctionExpression(arrow) => Some(ComponentBoundary {
            span: arrow.span,
            name: None,
        }),
        Expression::ClassExpression(class) => Some(ComponentBoundary {
            span: class.span,
            name: None,
        }),
        Expression::CallExpression(call) => call
            .arguments
            .iter()
            .filter_map(Argument::as_expression)
            .find_map(initializer_boundary),
        Expression::ParenthesizedExpression(paren) => initializer_boundary(&paren.expression),
        Expression::TSAsExpression(expr) => initializer_boundary(&expr.expression),
        Expression::TSSatisfiesExpression(expr) => initializer_boundary(&expr.expression),
        _ => None,
    }
}

fn is_global_marker(opening: &JSXOpeningElement<'_>) -> bool {
    opening.attributes.iter().any(|item| {
        let JSXAttributeItem::Attribute(attribute) = item else {
            return false;
        };
        let JSXAttributeName::Identifier(name) = &attribute.name else {
            return false;
        };
        if name.name.as_str() != "global" {
            return false;
        }
        match &attribute.value {
            None => true,
            Some(JSXAttributeValue::ExpressionContainer(container)) => matches!(
                &container.expression,
                JSXExpression::BooleanLiteral(literal) if literal.value
            ),
            Some(_) => false,
        }
    })
}

impl<'a> Visit<'a> for StyleLocator<'_> {
    fn visit_function(&mut self, it: &Function<'a>, flags: ScopeFlags) {
        let boundary = ComponentBoundary {
            span: it.span,
            name: it.id.as_ref().map(|id| id.name.to_string()),
        };
        if it.r#type == FunctionType::FunctionDeclaration
            && let Some(id) = &it.id
        {
            self.declarations.insert(id.symbol_id(), boundary.clone());
        }
        self.with_boundary(boundary, |this| walk::walk_function(this, it, flags));
    }

    fn visit_arrow_function_expression(&mut self, it: &ArrowFunctionExpression<'a>) {
        let boundary = ComponentBoundary {
            span: it.span,
            name: None,
        };
        self.with_boundary(boundary, |this| walk::walk_arrow_function_expression(this, it));
    }

    fn visit_class(&mut self, it: &Class<'a>) {
        let boundary = ComponentBoundary {
            span: it.span,
            name: it.id.as_ref().map(|id| id.name.to_string()),
        };
        if it.r#type == ClassType::ClassDeclaration
            && let Some(id) = &it.id
        {
            self.declarations.insert(id.symbol_id(), boundary.clone());
        }
        self.with_boundary(boundary, |this| walk::walk_class(this, it));
    }

    // Methods belong to their class: the method body is walked without
    // opening a boundary of its own.
    fn visit_method_definition(&mut self, it: &MethodDefinition<'a>) {
        for decorator in &it.decorators {
            self.visit_decorator(decorator);
        }
        self.visit_property_key(&it.key);
        walk::walk_function(self, &it.value, ScopeFlags::Function);
    }

    fn visit_variable_declarator(&mut self, it: &VariableDeclarator<'a>) {
        if let BindingPattern::BindingIdentifier(id) = &it.id
            && let Some(init) = &it.init
            && let Some(mut boundary) = initializer_boundary(init)
        {
            boundary.name = Some(id.name.to_string());
            self.boundary_names.insert(boundary.span, id.name.to_string());
            self.declarations.insert(id.symbol_id(), boundary);
        }
        walk::walk_variable_declarator(self, it);
    }

    fn visit_jsx_element(&mut self, it: &JSXElement<'a>) {
        if self.is_marker(&it.opening_element.name) {
            self.located.marker_spans.push(it.span);
            let raw_css = extract::marker_css(it);
            let is_global = is_global_marker(&it.opening_element);

            if let Some(owner) = self.boundaries.last().cloned() {
                self.located.blocks.push(StyleBlock {
                    raw_css,
                    owner,
                    is_global,
                    owner_key: String::new(),
                });
            } else {
                let message = format!(
                    "{}: style block is not inside a component; skipped",
                    self.position(it.span)
                );
                self.logs.info(message);
            }
        }
        walk::walk_jsx_element(self, it);
    }
}

#[cfg(test)]
mod tests {
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_semantic::SemanticBuilder;
    use oxc_span::SourceType;

    use super::*;
    use crate::diagnostic::LogLevel;

    fn locate(source: &str) -> (LocatedStyles, Logs) {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::tsx()).parse();
        assert!(ret.errors.is_empty(), "{:?}", ret.errors);
        let scoping = SemanticBuilder::new().build(&ret.program).semantic.into_scoping();
        let options = TransformOptions::new();
        let bindings = ImportBindings::collect(&ret.program, &options);
        let mut logs = Logs::default();
        let located =
            locate_style_blocks(&ret.program, &scoping, &bindings, &options, source, &mut logs);
        (located, logs)
    }

    #[test]
    fn aliased_marker_is_found() {
        let (located, logs) = locate(
            r#"import { Style as S } from "@flairjs/client";
export function Card() {
  return <div className="card"><S>{`.card { color: red; }`}</S></div>;
}"#,
        );
        assert!(logs.is_empty());
        assert_eq!(located.blocks.len(), 1);
        let block = &located.blocks[0];
        assert_eq!(block.raw_css, ".card { color: red; }");
        assert_eq!(block.owner.name.as_deref(), Some("Card"));
        assert_eq!(block.module_id("Card.tsx"), "Card.tsx#Card");
        assert!(!block.is_global);
    }

    #[test]
    fn unimported_style_is_not_a_marker() {
        let (located, _) = locate(
            r"const Style = (props) => null;
function Card() { return <Style>{`.a {}`}</Style>; }",
        );
        assert!(located.blocks.is_empty());
        assert!(located.marker_spans.is_empty());
    }

    #[test]
    fn top_level_marker_is_skipped_with_info() {
        let (located, logs) = locate(
            r#"import { Style } from "@flairjs/client";
export const styles = <Style>{`.a {}`}</Style>;"#,
        );
        assert!(located.blocks.is_empty());
        assert_eq!(located.marker_spans.len(), 1);
        assert_eq!(logs.entries().len(), 1);
        assert_eq!(logs.entries()[0].level, LogLevel::Info);
        assert!(logs.entries()[0].message.starts_with("2:22:"), "{:?}", logs.entries());
    }

    #[test]
    fn arrow_owner_takes_binding_name() {
        let (located, _) = locate(
            r#"import { Style } from "@flairjs/react";
const Button = () => <button><Style global>{`body { margin: 0 }`}</Style></button>;"#,
        );
        let block = &located.blocks[0];
        assert_eq!(block.owner.name.as_deref(), Some("Button"));
        assert!(block.is_global);
    }

    #[test]
    fn class_methods_belong_to_the_class() {
        let (located, _) = locate(
            r#"import { Style } from "@flairjs/client";
class Panel extends React.Component {
  render() { return <div><Style>{`.p {}`}</Style></div>; }
}"#,
        );
        assert_eq!(located.blocks[0].owner.name.as_deref(), Some("Panel"));
    }

    #[test]
    fn property_assignments_resolve_declarations() {
        let (located, logs) = locate(
            r#"import { forwardRef } from "react";
import { flair, css } from "@flairjs/client";
function A() { return <div className="a" />; }
const B = forwardRef((props, ref) => <div ref={ref} className="b" />);
class C extends React.Component { render() { return null; } }
const D = () => null;
A.flair = ".a { color: red; }";
B.flair = css`.b { color: ${"blue"}; }`;
C.globalFlair = `.c { top: 0 }`;
D.flair = flair({ d: { marginTop: 4 } });
Unknown.flair = ".x {}";
A.flair = someValue;"#,
        );

        let blocks = &located.blocks;
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].raw_css, ".a { color: red; }");
        assert_eq!(blocks[0].owner.name.as_deref(), Some("A"));
        assert_eq!(blocks[1].raw_css, ".b { color: ; }");
        assert_eq!(blocks[1].owner_key, "B");
        assert!(blocks[2].is_global);
        assert_eq!(blocks[2].owner.name.as_deref(), Some("C"));
        assert_eq!(blocks[3].raw_css, "d {\nmargin-top: 4;\n}\n");

        let messages: Vec<_> = logs.entries().iter().map(|entry| entry.message.as_str()).collect();
        assert_eq!(messages.len(), 2, "{messages:?}");
        assert!(messages[0].contains("`Unknown.flair` does not refer to a component"));
        assert!(messages[1].contains("unsupported value for `A.flair`"));
    }

    #[test]
    fn duplicate_owner_names_get_distinct_keys() {
        let (located, _) = locate(
            r#"import { Style } from "@flairjs/client";
function A() { function Item() { return <Style>{`.i {}`}</Style>; } return <Item />; }
function B() { function Item() { return <Style>{`.i {}`}</Style>; } return <Item />; }"#,
        );
        assert_eq!(located.blocks[0].owner_key, "Item");
        assert!(located.blocks[1].owner_key.starts_with("Item@"));
    }

    #[test]
    fn utilities_are_resolved_through_imports() {
        let allocator = Allocator::default();
        let source = r#"import cx from "classnames";
import { clsx as join } from "clsx";
import { cn } from "@flairjs/client";
import type { Style } from "@flairjs/client";"#;
        let ret = Parser::new(&allocator, source, SourceType::tsx()).parse();
        let _scoping = SemanticBuilder::new().build(&ret.program).semantic.into_scoping();
        let bindings = ImportBindings::collect(&ret.program, &TransformOptions::new());
        assert_eq!(bindings.class_utilities.len(), 3);
        assert!(bindings.markers.is_empty());
    }
}
