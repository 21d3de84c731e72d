//! Class-reference rewriting.
//!
//! Inside each component that owns scoped CSS, every class-name-bearing
//! expression is rewritten so authored names become the compiled export
//! names. Entry points are JSX attributes matched by the class-name list and
//! calls to class-list utilities (`clsx`, `cn`, …). From an entry point the
//! rewriter follows the expression shapes that can carry class names:
//!
//! | shape                     | handling                                        |
//! |---------------------------|-------------------------------------------------|
//! | `"a b"`                   | whitespace-separated tokens mapped              |
//! | `` `a ${x}` ``            | static parts mapped, expressions followed       |
//! | `name`                    | initializer of the `const`/`let` binding, later |
//! | `[a, b]`, `[a, b].join()` | elements followed                               |
//! | `{ a: x, "b c": y }`      | keys mapped, computed keys followed             |
//! | `x && a`                  | right side followed                             |
//! | `x \|\| a`, `x ?? a`      | both sides followed                             |
//! | `x ? a : b`               | both branches followed                          |
//! | `f(a, b)`                 | every argument followed                         |
//! | `a + b`                   | both operands followed                          |
//!
//! Anything else is left alone.
//!
//! Identifiers are resolved after the first walk: each referenced binding is
//! queued with the owner maps active at its first reference, and declarators
//! are revisited until no queued binding is left. A binding is rewritten at
//! most once, and a literal node is never mapped twice, so references
//! reachable through several paths (or cyclic ones) stay correct.

use std::mem;

use oxc_ast::AstBuilder;
use oxc_ast::ast::*;
use oxc_ast_visit::{VisitMut, walk_mut};
use oxc_semantic::Scoping;
use oxc_span::Span;
use oxc_syntax::operator::{BinaryOperator, LogicalOperator};
use oxc_syntax::scope::ScopeFlags;
use oxc_syntax::symbol::{SymbolFlags, SymbolId};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::css_module::ClassExportMap;
use crate::options::ClassNameMatcher;

/// Map whitespace-separated class tokens through `lookup`.
///
/// Whitespace runs are kept byte-for-byte. Returns `None` when no token
/// changed.
pub fn map_class_tokens<'m>(
    value: &str,
    lookup: impl Fn(&str) -> Option<&'m str>,
) -> Option<String> {
    let mut changed = false;
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while !rest.is_empty() {
        let gap = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
        out.push_str(&rest[..gap]);
        rest = &rest[gap..];

        let len = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let token = &rest[..len];
        if let Some(mapped) = lookup(token) {
            out.push_str(mapped);
            changed = true;
        } else {
            out.push_str(token);
        }
        rest = &rest[len..];
    }

    changed.then_some(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Walk owners, rewrite entry points, queue referenced bindings.
    References,
    /// Rewrite initializers of queued bindings.
    Bindings,
}

/// Rewrites class references for a set of owner boundaries.
pub struct ClassNameRewriter<'s, 'a> {
    ast: AstBuilder<'a>,
    scoping: &'s Scoping,
    class_names: &'s ClassNameMatcher,
    class_utilities: &'s FxHashSet<SymbolId>,
    /// Export map of each owner, keyed by boundary span.
    owners: &'s FxHashMap<Span, ClassExportMap>,
    phase: Phase,
    /// Owner maps in effect, outermost first.
    active: Vec<&'s ClassExportMap>,
    pending: FxHashMap<SymbolId, Vec<&'s ClassExportMap>>,
    rewritten_bindings: FxHashSet<SymbolId>,
    visited_literals: FxHashSet<Span>,
    progressed: bool,
}

impl<'s, 'a> ClassNameRewriter<'s, 'a> {
    pub fn new(
        ast: AstBuilder<'a>,
        scoping: &'s Scoping,
        class_names: &'s ClassNameMatcher,
        class_utilities: &'s FxHashSet<SymbolId>,
        owners: &'s FxHashMap<Span, ClassExportMap>,
    ) -> Self {
        Self {
            ast,
            scoping,
            class_names,
            class_utilities,
            owners,
            phase: Phase::References,
            active: Vec::new(),
            pending: FxHashMap::default(),
            rewritten_bindings: FxHashSet::default(),
            visited_literals: FxHashSet::default(),
            progressed: false,
        }
    }

    /// Rewrite every owner subtree of `program`.
    pub fn rewrite(mut self, program: &mut Program<'a>) {
        if self.owners.is_empty() {
            return;
        }

        self.phase = Phase::References;
        self.visit_program(program);

        self.phase = Phase::Bindings;
        while self.rewritten_bindings.len() < self.pending.len() {
            self.progressed = false;
            self.visit_program(program);
            if !self.progressed {
                break;
            }
        }
    }

    fn lookup(&self, token: &str) -> Option<&'s str> {
        self.active
            .iter()
            .rev()
            .find_map(|&map| map.get(token))
            .map(String::as_str)
    }

    fn enter_boundary(&mut self, span: Span) -> bool {
        if self.phase != Phase::References {
            return false;
        }
        let owners = self.owners;
        match owners.get(&span) {
            Some(map) => {
                self.active.push(map);
                true
            }
            None => false,
        }
    }

    fn leave_boundary(&mut self, entered: bool) {
        if entered {
            self.active.pop();
        }
    }

    fn in_owner(&self) -> bool {
        self.phase == Phase::References && !self.active.is_empty()
    }

    fn mapped_atom(&self, value: &str) -> Option<Atom<'a>> {
        map_class_tokens(value, |token| self.lookup(token)).map(|mapped| self.ast.atom(&mapped))
    }

    fn rewrite_expression(&mut self, expression: &mut Expression<'a>) {
        match expression {
            Expression::StringLiteral(literal) => self.rewrite_string_literal(literal),
            Expression::TemplateLiteral(template) => self.rewrite_template_literal(template),
            Expression::Identifier(ident) => self.queue_binding(ident),
            Expression::ArrayExpression(array) => self.rewrite_array(array),
            Expression::ObjectExpression(object) => self.rewrite_object(object),
            Expression::LogicalExpression(logical) => {
                if logical.operator != LogicalOperator::And {
                    self.rewrite_expression(&mut logical.left);
                }
                self.rewrite_expression(&mut logical.right);
            }
            Expression::ConditionalExpression(conditional) => {
                self.rewrite_expression(&mut conditional.consequent);
                self.rewrite_expression(&mut conditional.alternate);
            }
            Expression::CallExpression(call) => self.rewrite_call(call),
            Expression::BinaryExpression(binary) if binary.operator == BinaryOperator::Addition => {
                self.rewrite_expression(&mut binary.left);
                self.rewrite_expression(&mut binary.right);
            }
            Expression::ParenthesizedExpression(paren) => {
                self.rewrite_expression(&mut paren.expression);
            }
            Expression::TSAsExpression(expr) => self.rewrite_expression(&mut expr.expression),
            Expression::TSSatisfiesExpression(expr) => {
                self.rewrite_expression(&mut expr.expression);
            }
            Expression::TSNonNullExpression(expr) => self.rewrite_expression(&mut expr.expression),
            _ => {}
        }
    }

    fn rewrite_string_literal(&mut self, literal: &mut StringLiteral<'a>) {
        if !self.visited_literals.insert(literal.span) {
            return;
        }
        if let Some(value) = self.mapped_atom(&literal.value) {
            literal.value = value;
            literal.raw = None;
        }
    }

    fn rewrite_template_literal(&mut self, template: &mut TemplateLiteral<'a>) {
        for quasi in &mut template.quasis {
            if !self.visited_literals.insert(quasi.span) {
                continue;
            }
            if let Some(raw) = self.mapped_atom(&quasi.value.raw) {
                quasi.value.raw = raw;
                if let Some(cooked) = quasi.value.cooked {
                    quasi.value.cooked = Some(self.mapped_atom(&cooked).unwrap_or(cooked));
                }
            }
        }
        for expression in &mut template.expressions {
            self.rewrite_expression(expression);
        }
    }

    fn rewrite_array(&mut self, array: &mut ArrayExpression<'a>) {
        for element in &mut array.elements {
            if let Some(expression) = element.as_expression_mut() {
                self.rewrite_expression(expression);
            }
        }
    }

    fn rewrite_object(&mut self, object: &mut ObjectExpression<'a>) {
        for property in &mut object.properties {
            let ObjectPropertyKind::ObjectProperty(property) = property else {
                continue;
            };
            if property.computed {
                if let Some(key) = property.key.as_expression_mut() {
                    self.rewrite_expression(key);
                }
                continue;
            }

            let replacement = match &property.key {
                PropertyKey::StaticIdentifier(ident) => self.map_identifier_key(ident.span, &ident.name),
                _ => None,
            };
            if let Some(key) = replacement {
                property.key = key;
                property.shorthand = false;
            } else if let PropertyKey::StringLiteral(key) = &mut property.key {
                self.rewrite_string_literal(key);
            }
        }
    }

    /// `{ active: on }` → `{ "x_active": on }`.
    fn map_identifier_key(&mut self, span: Span, name: &str) -> Option<PropertyKey<'a>> {
        if !self.visited_literals.insert(span) {
            return None;
        }
        let value = self.mapped_atom(name)?;
        Some(PropertyKey::StringLiteral(
            self.ast.alloc_string_literal(span, value, None),
        ))
    }

    fn rewrite_call(&mut self, call: &mut CallExpression<'a>) {
        if let Expression::StaticMemberExpression(member) = &mut call.callee
            && member.property.name.as_str() == "join"
            && let Expression::ArrayExpression(array) = &mut member.object
        {
            self.rewrite_array(array);
            return;
        }
        for argument in &mut call.arguments {
            if let Some(expression) = argument.as_expression_mut() {
                self.rewrite_expression(expression);
            }
        }
    }

    fn queue_binding(&mut self, ident: &IdentifierReference<'a>) {
        let Some(symbol_id) = self.scoping.get_reference(ident.reference_id()).symbol_id() else {
            return;
        };
        if self.pending.contains_key(&symbol_id) || !self.is_rewritable_binding(symbol_id) {
            return;
        }
        self.pending.insert(symbol_id, self.active.clone());
    }

    /// `const` bindings, and `let` bindings that are never reassigned.
    fn is_rewritable_binding(&self, symbol_id: SymbolId) -> bool {
        let flags = self.scoping.symbol_flags(symbol_id);
        if flags.contains(SymbolFlags::ConstVariable) {
            return true;
        }
        flags.contains(SymbolFlags::BlockScopedVariable)
            && !self
                .scoping
                .get_resolved_references(symbol_id)
                .any(|reference| reference.is_write())
    }

    fn is_class_utility_call(&self, call: &CallExpression<'a>) -> bool {
        let Expression::Identifier(ident) = &call.callee else {
            return false;
        };
        self.scoping
            .get_reference(ident.reference_id())
            .symbol_id()
            .is_some_and(|symbol_id| self.class_utilities.contains(&symbol_id))
    }
}

impl<'a> VisitMut<'a> for ClassNameRewriter<'_, 'a> {
    fn visit_function(&mut self, it: &mut Function<'a>, flags: ScopeFlags) {
        let entered = self.enter_boundary(it.span);
        walk_mut::walk_function(self, it, flags);
        self.leave_boundary(entered);
    }

    fn visit_arrow_function_expression(&mut self, it: &mut ArrowFunctionExpression<'a>) {
        let entered = self.enter_boundary(it.span);
        walk_mut::walk_arrow_function_expression(self, it);
        self.leave_boundary(entered);
    }

    fn visit_class(&mut self, it: &mut Class<'a>) {
        let entered = self.enter_boundary(it.span);
        walk_mut::walk_class(self, it);
        self.leave_boundary(entered);
    }

    fn visit_jsx_attribute(&mut self, it: &mut JSXAttribute<'a>) {
        if self.in_owner()
            && let JSXAttributeName::Identifier(name) = &it.name
            && self.class_names.matches(&name.name)
        {
            match &mut it.value {
                Some(JSXAttributeValue::StringLiteral(literal)) => {
                    self.rewrite_string_literal(literal);
                }
                Some(JSXAttributeValue::ExpressionContainer(container)) => {
                    if let Some(expression) = container.expression.as_expression_mut() {
                        self.rewrite_expression(expression);
                    }
                }
                _ => {}
            }
        }
        walk_mut::walk_jsx_attribute(self, it);
    }

    fn visit_call_expression(&mut self, it: &mut CallExpression<'a>) {
        if self.in_owner() && self.is_class_utility_call(it) {
            self.rewrite_call(it);
        }
        walk_mut::walk_call_expression(self, it);
    }

    fn visit_variable_declarator(&mut self, it: &mut VariableDeclarator<'a>) {
        if self.phase == Phase::Bindings
            && let BindingPattern::BindingIdentifier(ident) = &it.id
            && let Some(init) = &mut it.init
        {
            let symbol_id = ident.symbol_id();
            if !self.rewritten_bindings.contains(&symbol_id)
                && let Some(maps) = self.pending.get(&symbol_id).cloned()
            {
                self.rewritten_bindings.insert(symbol_id);
                self.progressed = true;
                let outer = mem::replace(&mut self.active, maps);
                self.rewrite_expression(init);
                self.active = outer;
            }
        }
        walk_mut::walk_variable_declarator(self, it);
    }
}

/// Removes marker elements from JSX child lists.
pub struct MarkerRemover<'s> {
    markers: &'s FxHashSet<Span>,
}

impl<'s> MarkerRemover<'s> {
    pub fn new(markers: &'s FxHashSet<Span>) -> Self {
        Self { markers }
    }

    fn is_marker(&self, child: &JSXChild<'_>) -> bool {
        matches!(child, JSXChild::Element(element) if self.markers.contains(&element.span))
    }
}

impl<'a> VisitMut<'a> for MarkerRemover<'_> {
    fn visit_jsx_element(&mut self, it: &mut JSXElement<'a>) {
        it.children.retain_mut(|child| !self.is_marker(child));
        walk_mut::walk_jsx_element(self, it);
    }

    fn visit_jsx_fragment(&mut self, it: &mut JSXFragment<'a>) {
        it.children.retain_mut(|child| !self.is_marker(child));
        walk_mut::walk_jsx_fragment(self, it);
    }
}

#[cfg(test)]
mod tests {
    use oxc_allocator::Allocator;
    use oxc_codegen::Codegen;
    use oxc_parser::Parser;
    use oxc_semantic::SemanticBuilder;
    use oxc_span::SourceType;

    use super::*;
    use crate::diagnostic::Logs;
    use crate::locator::{ImportBindings, locate_style_blocks};
    use crate::options::TransformOptions;

    type Table<'t> = &'t [(&'t str, &'t str)];

    /// Rewrite `source` with a fixed export table per owner name.
    fn rewrite(source: &str, tables: &[(&str, Table<'_>)]) -> String {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::tsx()).parse();
        assert!(ret.errors.is_empty(), "{:?}", ret.errors);
        let mut program = ret.program;
        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let options = TransformOptions::new().with_class_name_list(&["/^class[A-Z]/"]);
        let bindings = ImportBindings::collect(&program, &options);
        let mut logs = Logs::default();
        let located =
            locate_style_blocks(&program, &scoping, &bindings, &options, source, &mut logs);

        let mut owners: FxHashMap<Span, ClassExportMap> = FxHashMap::default();
        for block in &located.blocks {
            let table = tables
                .iter()
                .find(|(name, _)| block.owner.name.as_deref() == Some(*name))
                .map_or(&[][..], |(_, table)| *table);
            owners.entry(block.owner.span).or_default().extend(
                table
                    .iter()
                    .map(|(from, to)| ((*from).to_string(), (*to).to_string())),
            );
        }

        ClassNameRewriter::new(
            AstBuilder::new(&allocator),
            &scoping,
            &options.class_name_list,
            &bindings.class_utilities,
            &owners,
        )
        .rewrite(&mut program);

        Codegen::new().build(&program).code
    }

    const HEADER: &str = "import { Style } from \"@flairjs/client\";\nimport clsx from \"clsx\";\n";

    const AB: Table<'static> = &[("a", "a_x7"), ("b", "b_y2")];

    fn component(body: &str) -> String {
        format!("{HEADER}function Box({{ on, props }}) {{\n{body}\n}}\n")
    }

    #[test]
    fn tokens_map_and_unknown_tokens_survive() {
        assert_eq!(map_class_tokens("a b c", |t| AB.iter().find(|(k, _)| *k == t).map(|(_, v)| *v)).as_deref(), Some("a_x7 b_y2 c"));
        assert_eq!(map_class_tokens("  a \t b ", |t| (t == "a").then_some("x")).as_deref(), Some("  x \t b "));
        assert_eq!(map_class_tokens("c d", |_| None), None);
        assert_eq!(map_class_tokens("", |_| Some("x")), None);
    }

    #[test]
    fn string_attribute() {
        let code = rewrite(
            &component(r#"return <p className="a b c"><Style>{`.a {} .b {}`}</Style></p>;"#),
            &[("Box", AB)],
        );
        assert!(code.contains("a_x7 b_y2 c"), "{code}");
    }

    #[test]
    fn identifier_bindings_are_followed_transitively() {
        let code = rewrite(
            &format!(
                "{HEADER}const base = \"a\";\nfunction Box() {{\n  const cls = base + \" b\";\n  return <p className={{cls}}><Style>{{`.a {{}}`}}</Style></p>;\n}}\n"
            ),
            &[("Box", AB)],
        );
        assert!(code.contains("const base = \"a_x7\""), "{code}");
        assert!(code.contains("\" b_y2\""), "{code}");
    }

    #[test]
    fn unresolvable_bindings_are_untouched() {
        let code = rewrite(
            &component(
                r#"let mutable = "a";
mutable = "b";
const { a } = props;
return <p className={mutable + on + a + props.className}><Style>{`.a {}`}</Style></p>;"#,
            ),
            &[("Box", AB)],
        );
        assert!(code.contains("let mutable = \"a\""), "{code}");
        assert!(code.contains("mutable = \"b\""), "{code}");
        assert!(!code.contains("_x7"), "{code}");
    }

    #[test]
    fn conditional_and_logical_shapes() {
        let code = rewrite(
            &component(
                r#"const fallback = "b";
return <p className={on ? "a" : "b"} classHeader={"a" && "b"} classBody={on || fallback}><Style>{`.a {}`}</Style></p>;"#,
            ),
            &[("Box", AB)],
        );
        assert!(code.contains("on ? \"a_x7\" : \"b_y2\""), "{code}");
        assert!(code.contains("\"a\" && \"b_y2\""), "{code}");
        assert!(code.contains("const fallback = \"b_y2\""), "{code}");
    }

    #[test]
    fn arrays_objects_and_utility_calls() {
        let code = rewrite(
            &component(
                r#"const key = "b";
const extra = clsx({ a: on, "a b": !on, [key]: true });
return <p className={["a", "b"].join(" ")}><Style>{`.a {}`}</Style>{extra}</p>;"#,
            ),
            &[("Box", AB)],
        );
        assert!(code.contains("[\"a_x7\", \"b_y2\"].join(\" \")"), "{code}");
        assert!(code.contains("\"a_x7\": on"), "{code}");
        assert!(code.contains("\"a_x7 b_y2\": !on"), "{code}");
        assert!(code.contains("const key = \"b_y2\""), "{code}");
    }

    #[test]
    fn template_literals_map_static_parts_and_follow_expressions() {
        let code = rewrite(
            &component(r#"return <p className={`a ${on ? "b" : ""} c`}><Style>{`.a {}`}</Style></p>;"#),
            &[("Box", AB)],
        );
        assert!(code.contains("`a_x7 ${on ? \"b_y2\" : \"\"} c`"), "{code}");
    }

    #[test]
    fn sibling_components_use_their_own_maps() {
        let source = format!(
            "{HEADER}function First() {{ return <p className=\"box\"><Style>{{`.box {{}}`}}</Style></p>; }}\nfunction Second() {{ return <p className=\"box\"><Style>{{`.box {{}}`}}</Style></p>; }}\nfunction Plain() {{ return <p className=\"box\" />; }}\n"
        );
        let code = rewrite(
            &source,
            &[("First", &[("box", "box_1")]), ("Second", &[("box", "box_2")])],
        );
        assert!(code.contains("\"box_1\""), "{code}");
        assert!(code.contains("\"box_2\""), "{code}");
        assert_eq!(code.matches("className=\"box\"").count(), 1, "{code}");
    }

    #[test]
    fn literals_are_mapped_once() {
        let chained: Table<'static> = &[("a", "b"), ("b", "c")];
        let code = rewrite(
            &component(r#"const cls = "a";
return <p className={cls}><span className={cls} /><Style>{`.a {}`}</Style></p>;"#),
            &[("Box", chained)],
        );
        assert!(code.contains("const cls = \"b\""), "{code}");
    }

    #[test]
    fn utility_calls_outside_owners_are_untouched() {
        let code = rewrite(
            &format!("{HEADER}const shared = clsx(\"a\");\nfunction Box() {{ return <p><Style>{{`.a {{}}`}}</Style></p>; }}\n"),
            &[("Box", AB)],
        );
        assert!(code.contains("clsx(\"a\")"), "{code}");
    }

    #[test]
    fn markers_are_removed_from_children() {
        let allocator = Allocator::default();
        let source = "const a = <div><Style /><span /><><Style /></></div>;";
        let mut program = Parser::new(&allocator, source, SourceType::tsx()).parse().program;

        let markers: FxHashSet<Span> = [Span::new(15, 24), Span::new(34, 43)].into_iter().collect();
        MarkerRemover::new(&markers).visit_program(&mut program);

        let code = Codegen::new().build(&program).code;
        assert!(!code.contains("Style"), "{code}");
        assert!(code.contains("<span />"), "{code}");
    }
}
