// ABOUTME: Top-level symbol collection — one module scope per file

use crate::ast::{Decl, File};
use crate::diagnostics::Diagnostic;
use crate::scope::{DuplicateError, Scope, Symbol, SymbolKind, SymbolNode};
use std::rc::Rc;

/// Iterates a file's declarations once, defining each under its name in a
/// fresh module scope. Declaration nodes are wrapped in `Rc` here — this is
/// the one place that happens, so every later phase (import resolution, the
/// checker's body walk, the interpreter's call dispatch) shares the same
/// `Rc`-held copy rather than re-cloning the AST.
pub fn collect_top_level(file: &File) -> (Rc<Scope>, Vec<Diagnostic>) {
    let scope = Scope::root();
    let mut diags = Vec::new();

    for decl in &file.decls {
        let span = decl.span().clone();
        let sym = match decl {
            Decl::GlobalVar(d) => Symbol {
                name: d.name.clone(),
                kind: SymbolKind::Var,
                node: SymbolNode::GlobalVar(Rc::new(d.clone())),
            },
            Decl::Func(d) => Symbol {
                name: d.name.clone(),
                kind: SymbolKind::Func,
                node: SymbolNode::Func(Rc::new(d.clone())),
            },
            Decl::Class(d) => Symbol {
                name: d.name.clone(),
                kind: SymbolKind::Class,
                node: SymbolNode::Class(Rc::new(d.clone())),
            },
            Decl::Struct(d) => Symbol {
                name: d.name.clone(),
                kind: SymbolKind::Struct,
                node: SymbolNode::Struct(Rc::new(d.clone())),
            },
            Decl::Enum(d) => Symbol {
                name: d.name.clone(),
                kind: SymbolKind::Enum,
                node: SymbolNode::Enum(Rc::new(d.clone())),
            },
        };
        let name = sym.name.clone();
        if let Err(DuplicateError { name }) = scope.define(sym) {
            diags.push(
                Diagnostic::semantic(format!("duplicate top-level declaration `{}`", name)).at(span),
            );
        }
        let _ = name;
    }

    scope.seal();
    (scope, diags)
}

/// Resolves a dotted path (`M.name`, or a bare `name`) against a scope,
/// walking into a `Module` symbol's filtered child scope one segment at a
/// time. Shared by the import resolver and the checker/binder walk for
/// `M.name` member-access validation.
pub fn resolve_qualified(scope: &Rc<Scope>, segments: &[String]) -> Option<Symbol> {
    let (first, rest) = segments.split_first()?;
    let mut sym = scope.resolve(first)?;
    for seg in rest {
        let inner = match &sym.node {
            SymbolNode::Module(s) => s.clone(),
            _ => return None,
        };
        sym = inner.resolve_local(seg)?;
    }
    Some(sym)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::token::Span;

    fn span() -> Span {
        Span::point(Rc::from("t.ell"), 1, 1)
    }

    fn file_with(decls: Vec<Decl>) -> File {
        File { mod_decl: None, imports: vec![], decls, span: span() }
    }

    #[test]
    fn collects_distinct_top_level_names() {
        let f = file_with(vec![
            Decl::Func(FuncDecl {
                vis: Vis::Public,
                name: "foo".into(),
                params: vec![],
                return_type: TypeExpr { name: "void".into(), array_depth: 0, nullable: false, span: span() },
                body: Block { stmts: vec![], span: span() },
                span: span(),
            }),
            Decl::GlobalVar(GlobalVarDecl {
                vis: Vis::Default,
                is_let: true,
                name: "x".into(),
                ty: None,
                init: None,
                span: span(),
            }),
        ]);
        let (scope, diags) = collect_top_level(&f);
        assert!(diags.is_empty());
        assert!(scope.resolve("foo").is_some());
        assert!(scope.resolve("x").is_some());
    }

    #[test]
    fn duplicate_top_level_name_is_diagnosed() {
        let f = file_with(vec![
            Decl::GlobalVar(GlobalVarDecl {
                vis: Vis::Default,
                is_let: true,
                name: "x".into(),
                ty: None,
                init: None,
                span: span(),
            }),
            Decl::GlobalVar(GlobalVarDecl {
                vis: Vis::Default,
                is_let: true,
                name: "x".into(),
                ty: None,
                init: None,
                span: span(),
            }),
        ]);
        let (_scope, diags) = collect_top_level(&f);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("duplicate"));
    }
}
