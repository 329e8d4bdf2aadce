// ABOUTME: Declared-type-occurrence resolution and the override/template check

use crate::ast::{ClassDecl, TypeExpr};
use crate::diagnostics::Diagnostic;
use crate::scope::{Scope, SymbolKind, SymbolNode};
use crate::types::{BaseKind, Builtin, Type};
use std::collections::HashMap;
use std::rc::Rc;

/// Resolves one written type occurrence against the built-in registry and
/// the module scope. `self_type`, when `Some`, is the enclosing receiver
/// type — required to resolve a written `self`, which is permitted only
/// within a class/enum method signature.
pub fn resolve_type_expr(texpr: &TypeExpr, scope: &Rc<Scope>, self_type: Option<&Type>) -> Result<Type, Diagnostic> {
    let base = if texpr.name == "self" {
        match self_type {
            Some(t) => t.base.clone(),
            None => {
                return Err(Diagnostic::semantic("`self` is not a valid type here")
                    .at(texpr.span.clone())
                    .with_hint("`self` may only appear as a type inside a class or enum method signature"))
            }
        }
    } else if let Some(b) = Builtin::from_name(&texpr.name) {
        BaseKind::Builtin(b)
    } else {
        match scope.resolve(&texpr.name) {
            Some(sym) if matches!(sym.kind, SymbolKind::Class | SymbolKind::Struct | SymbolKind::Enum) => {
                BaseKind::User(texpr.name.clone())
            }
            _ => {
                return Err(Diagnostic::semantic(format!("unknown type `{}`", texpr.name))
                    .at(texpr.span.clone())
                    .with_hint("declare a class/struct/enum with this name, or check for typos"))
            }
        }
    };

    Ok(Type { base, array_depth: texpr.array_depth, nullable: texpr.nullable })
}

#[derive(Debug, Clone)]
struct RequiredMethod {
    name: String,
    arity: usize,
    return_type: String,
}

fn effective_required(
    name: &str,
    scope: &Rc<Scope>,
    classes: &HashMap<String, Rc<ClassDecl>>,
    cache: &mut HashMap<String, Vec<RequiredMethod>>,
    visiting: &mut Vec<String>,
) -> Vec<RequiredMethod> {
    if let Some(cached) = cache.get(name) {
        return cached.clone();
    }
    if visiting.contains(&name.to_string()) {
        return Vec::new();
    }
    let class = match classes.get(name) {
        Some(c) => c.clone(),
        None => return Vec::new(),
    };
    visiting.push(name.to_string());

    let mut required: Vec<RequiredMethod> = class
        .methods
        .iter()
        .filter(|m| m.is_template)
        .map(|m| RequiredMethod { name: m.name.clone(), arity: m.params.len(), return_type: m.return_type.name.clone() })
        .collect();

    if let Some(super_ident) = &class.super_type {
        let inherited = effective_required(&super_ident.name, scope, classes, cache, visiting);
        for req in inherited {
            let satisfied = class
                .methods
                .iter()
                .any(|m| m.is_override && m.name == req.name && m.params.len() == req.arity);
            if !satisfied {
                required.push(req);
            }
        }
    }

    visiting.pop();
    cache.insert(name.to_string(), required.clone());
    required
}

/// Walks every class in `scope`, computing which ones are effectively
/// template (abstract) after accounting for inherited, unoverridden
/// template methods, and diagnosing `override` methods that don't match any
/// template method up the chain.
pub fn check_overrides(scope: &Rc<Scope>) -> (HashMap<String, bool>, Vec<Diagnostic>) {
    let mut classes = HashMap::new();
    for name in scope.names() {
        if let Some(sym) = scope.resolve_local(&name) {
            if let SymbolNode::Class(c) = sym.node {
                classes.insert(name, c);
            }
        }
    }

    let mut cache = HashMap::new();
    let mut effectively_template = HashMap::new();
    let mut diags = Vec::new();

    for (name, class) in &classes {
        let mut visiting = Vec::new();
        let required = effective_required(name, scope, &classes, &mut cache, &mut visiting);
        effectively_template.insert(name.clone(), !required.is_empty() || class.is_template);

        if let Some(super_ident) = &class.super_type {
            let base_required: Vec<RequiredMethod> = {
                let mut v = Vec::new();
                let mut visiting = Vec::new();
                v.extend(effective_required(&super_ident.name, scope, &classes, &mut cache, &mut visiting));
                v
            };
            for m in class.methods.iter().filter(|m| m.is_override) {
                match base_required.iter().find(|r| r.name == m.name && r.arity == m.params.len()) {
                    None => diags.push(
                        Diagnostic::semantic(format!(
                            "`override {}` does not match any template method on `{}`",
                            m.name, super_ident.name
                        ))
                        .at(m.span.clone()),
                    ),
                    Some(r) if r.return_type != m.return_type.name => diags.push(
                        Diagnostic::semantic(format!(
                            "override signature mismatch: `{}` returns `{}`, template declares `{}`",
                            m.name, m.return_type.name, r.return_type
                        ))
                        .at(m.span.clone()),
                    ),
                    Some(_) => {}
                }
            }
        }
    }

    (effectively_template, diags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::token::Span;

    fn span() -> Span {
        Span::point(Rc::from("t.ell"), 1, 1)
    }

    fn texpr(name: &str) -> TypeExpr {
        TypeExpr { name: name.to_string(), array_depth: 0, nullable: false, span: span() }
    }

    #[test]
    fn builtin_type_resolves() {
        let scope = Scope::root();
        let ty = resolve_type_expr(&texpr("i32"), &scope, None).unwrap();
        assert!(ty.is_builtin(Builtin::I32));
    }

    #[test]
    fn unknown_type_is_diagnosed() {
        let scope = Scope::root();
        let err = resolve_type_expr(&texpr("Bogus"), &scope, None).unwrap_err();
        assert!(err.message.contains("unknown type"));
    }

    #[test]
    fn self_type_requires_receiver() {
        let scope = Scope::root();
        let err = resolve_type_expr(&texpr("self"), &scope, None).unwrap_err();
        assert!(err.message.contains("self"));
    }

    fn method(name: &str, is_template: bool, is_override: bool, ret: &str) -> MethodDecl {
        MethodDecl {
            vis: Vis::Public,
            name: name.to_string(),
            params: vec![],
            return_type: texpr(ret),
            body: if is_template { None } else { Some(Block { stmts: vec![], span: span() }) },
            is_template,
            is_override,
            span: span(),
        }
    }

    fn class(name: &str, super_name: Option<&str>, methods: Vec<MethodDecl>) -> Rc<ClassDecl> {
        Rc::new(ClassDecl {
            vis: Vis::Default,
            is_template: methods.iter().any(|m| m.is_template),
            name: name.to_string(),
            super_type: super_name.map(|n| Ident { name: n.to_string(), span: span() }),
            fields: vec![],
            methods,
            builders: vec![],
            span: span(),
        })
    }

    #[test]
    fn derived_without_override_stays_template() {
        let scope = Scope::root();
        let base = class("Base", None, vec![method("name", true, false, "string")]);
        let bad = class("Bad", Some("Base"), vec![]);
        scope
            .define(crate::scope::Symbol { name: "Base".into(), kind: SymbolKind::Class, node: SymbolNode::Class(base) })
            .unwrap();
        scope
            .define(crate::scope::Symbol { name: "Bad".into(), kind: SymbolKind::Class, node: SymbolNode::Class(bad) })
            .unwrap();
        let (templated, diags) = check_overrides(&scope);
        assert!(diags.is_empty());
        assert_eq!(templated.get("Bad"), Some(&true));
    }

    #[test]
    fn derived_with_matching_override_is_instantiable() {
        let scope = Scope::root();
        let base = class("Base", None, vec![method("name", true, false, "string")]);
        let good = class("Good", Some("Base"), vec![method("name", false, true, "string")]);
        scope
            .define(crate::scope::Symbol { name: "Base".into(), kind: SymbolKind::Class, node: SymbolNode::Class(base) })
            .unwrap();
        scope
            .define(crate::scope::Symbol { name: "Good".into(), kind: SymbolKind::Class, node: SymbolNode::Class(good) })
            .unwrap();
        let (templated, diags) = check_overrides(&scope);
        assert!(diags.is_empty());
        assert_eq!(templated.get("Good"), Some(&false));
    }
}
