// ABOUTME: Import resolver — adds imported symbols into an importing module's scope

use crate::ast::{File, ImportDecl, Vis};
use crate::diagnostics::Diagnostic;
use crate::scope::{Scope, Symbol, SymbolKind, SymbolNode};
use std::collections::HashMap;
use std::rc::Rc;

/// One loaded, top-level-collected module: its dotted key, its own `mod`
/// name (for the `protected` visibility check), and its scope.
pub struct LoadedModule {
    pub key: String,
    pub mod_name: String,
    pub scope: Rc<Scope>,
}

fn symbol_vis(sym: &Symbol) -> Option<Vis> {
    match &sym.node {
        SymbolNode::GlobalVar(d) => Some(d.vis),
        SymbolNode::Func(d) => Some(d.vis),
        SymbolNode::Class(d) => Some(d.vis),
        SymbolNode::Struct(d) => Some(d.vis),
        SymbolNode::Enum(d) => Some(d.vis),
        SymbolNode::Local(_) | SymbolNode::Module(_) => None,
    }
}

/// Visible to an importer whose module name is `importer_mod_name`, given a
/// symbol declared with `vis` inside a module named `exporter_mod_name`:
/// public always, private never, protected only within the same module
/// name, default treated as public.
fn is_visible(vis: Vis, importer_mod_name: &str, exporter_mod_name: &str) -> bool {
    match vis {
        Vis::Public => true,
        Vis::Default => true,
        Vis::Private => false,
        Vis::Protected => importer_mod_name == exporter_mod_name,
    }
}

/// Builds a filtered copy of `source` containing only the symbols visible to
/// `importer_mod_name`, used both for namespace imports and for validating
/// `M.name` accesses.
fn filtered_scope(source: &Rc<Scope>, importer_mod_name: &str, exporter_mod_name: &str) -> Rc<Scope> {
    let filtered = Scope::root();
    for name in source.names() {
        if let Some(sym) = source.resolve_local(&name) {
            let visible = symbol_vis(&sym).map(|v| is_visible(v, importer_mod_name, exporter_mod_name)).unwrap_or(false);
            if visible {
                let _ = filtered.define(sym);
            }
        }
    }
    filtered.seal();
    filtered
}

/// Resolves every `import` in `file` against already-loaded modules,
/// defining the resulting symbols in `importer_scope`. `modules` must
/// already contain every module `file` imports — the driver loads in
/// dependency order.
pub fn resolve_imports(
    file: &File,
    importer_scope: &Rc<Scope>,
    importer_mod_name: &str,
    modules: &HashMap<String, LoadedModule>,
) -> Vec<Diagnostic> {
    let mut diags = Vec::new();

    for import in &file.imports {
        let key = import.segments.join(".");
        let module = match modules.get(&key) {
            Some(m) => m,
            None => {
                diags.push(
                    Diagnostic::semantic(format!("module `{}` not found", key)).at(import.span.clone()),
                );
                continue;
            }
        };

        match &import.items {
            Some(items) => resolve_selective(import, items, module, importer_scope, importer_mod_name, &mut diags),
            None => resolve_namespace(import, module, importer_scope, importer_mod_name, &mut diags),
        }
    }

    diags
}

fn resolve_selective(
    import: &ImportDecl,
    items: &[crate::ast::ImportItem],
    module: &LoadedModule,
    importer_scope: &Rc<Scope>,
    importer_mod_name: &str,
    diags: &mut Vec<Diagnostic>,
) {
    for item in items {
        let sym = match module.scope.resolve_local(&item.name) {
            Some(sym) => sym,
            None => {
                diags.push(
                    Diagnostic::semantic(format!("`{}` is not exported by `{}`", item.name, module.key))
                        .at(item.span.clone()),
                );
                continue;
            }
        };
        let visible = symbol_vis(&sym).map(|v| is_visible(v, importer_mod_name, &module.mod_name)).unwrap_or(false);
        if !visible {
            diags.push(
                Diagnostic::semantic(format!("`{}` is not visible from `{}`", item.name, module.key))
                    .at(item.span.clone()),
            );
            continue;
        }
        let local_name = item.alias.clone().unwrap_or_else(|| item.name.clone());
        let kind = sym.kind.clone();
        if importer_scope.define(Symbol { name: local_name.clone(), kind, node: sym.node }).is_err() {
            diags.push(
                Diagnostic::semantic(format!("duplicate name `{}` from import", local_name)).at(item.span.clone()),
            );
        }
    }
    let _ = &import.segments;
}

fn resolve_namespace(
    import: &ImportDecl,
    module: &LoadedModule,
    importer_scope: &Rc<Scope>,
    importer_mod_name: &str,
    diags: &mut Vec<Diagnostic>,
) {
    let alias = import.segments.last().cloned().unwrap_or_else(|| module.key.clone());
    let filtered = filtered_scope(&module.scope, importer_mod_name, &module.mod_name);
    if importer_scope
        .define(Symbol { name: alias.clone(), kind: SymbolKind::Module, node: SymbolNode::Module(filtered) })
        .is_err()
    {
        diags.push(Diagnostic::semantic(format!("duplicate name `{}` from import", alias)).at(import.span.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::token::Span;

    fn span() -> Span {
        Span::point(Rc::from("t.ell"), 1, 1)
    }

    fn make_module(key: &str) -> LoadedModule {
        let scope = Scope::root();
        let f = FuncDecl {
            vis: Vis::Public,
            name: "sq".into(),
            params: vec![],
            return_type: TypeExpr { name: "i32".into(), array_depth: 0, nullable: false, span: span() },
            body: Block { stmts: vec![], span: span() },
            span: span(),
        };
        scope
            .define(Symbol { name: "sq".into(), kind: SymbolKind::Func, node: SymbolNode::Func(Rc::new(f)) })
            .unwrap();
        scope.seal();
        LoadedModule { key: key.to_string(), mod_name: String::new(), scope }
    }

    #[test]
    fn selective_import_defines_local_alias() {
        let mut modules = HashMap::new();
        modules.insert("util".to_string(), make_module("util"));
        let file = File {
            mod_decl: None,
            imports: vec![ImportDecl {
                segments: vec!["util".to_string()],
                items: Some(vec![ImportItem { name: "sq".to_string(), alias: None, span: span() }]),
                span: span(),
            }],
            decls: vec![],
            span: span(),
        };
        let importer_scope = Scope::root();
        let diags = resolve_imports(&file, &importer_scope, "", &modules);
        assert!(diags.is_empty());
        assert!(importer_scope.resolve("sq").is_some());
    }

    #[test]
    fn missing_selective_item_is_diagnosed() {
        let mut modules = HashMap::new();
        modules.insert("util".to_string(), make_module("util"));
        let file = File {
            mod_decl: None,
            imports: vec![ImportDecl {
                segments: vec!["util".to_string()],
                items: Some(vec![ImportItem { name: "missing".to_string(), alias: None, span: span() }]),
                span: span(),
            }],
            decls: vec![],
            span: span(),
        };
        let importer_scope = Scope::root();
        let diags = resolve_imports(&file, &importer_scope, "", &modules);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn namespace_import_defines_module_symbol() {
        let mut modules = HashMap::new();
        modules.insert("util".to_string(), make_module("util"));
        let file = File {
            mod_decl: None,
            imports: vec![ImportDecl { segments: vec!["util".to_string()], items: None, span: span() }],
            decls: vec![],
            span: span(),
        };
        let importer_scope = Scope::root();
        let diags = resolve_imports(&file, &importer_scope, "", &modules);
        assert!(diags.is_empty());
        let sym = importer_scope.resolve("util").unwrap();
        assert!(matches!(sym.node, SymbolNode::Module(_)));
    }
}
