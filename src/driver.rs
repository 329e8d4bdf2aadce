// ABOUTME: Compiles and runs one program: lex/parse/load/bind/check, then interpret

use crate::ast::File;
use crate::binder;
use crate::diagnostics::Diagnostic;
use crate::imports::{self, LoadedModule};
use crate::interpreter;
use crate::loader::Loader;
use crate::scope::Scope;
use crate::types::checker;
use crate::types::TypeTable;
use std::collections::HashMap;
use std::rc::Rc;

/// Loads `segments` and everything it (transitively) imports, in dependency
/// order — a module's imports are always loaded, top-level-collected, and
/// import-resolved before the module itself.
fn load_module_recursive(
    segments: &[String],
    loader: &Loader,
    modules: &mut HashMap<String, LoadedModule>,
    files: &mut HashMap<String, Rc<File>>,
    diags: &mut Vec<Diagnostic>,
) {
    let key = segments.join(".");
    if modules.contains_key(&key) || files.contains_key(&key) {
        return;
    }

    let file = match loader.load(segments) {
        Ok((file, load_diags)) => {
            diags.extend(load_diags);
            file
        }
        Err(e) => {
            diags.push(Diagnostic::semantic(e.to_string()));
            return;
        }
    };
    files.insert(key.clone(), file.clone());

    for import in &file.imports {
        load_module_recursive(&import.segments, loader, modules, files, diags);
    }

    let (scope, bind_diags) = binder::collect_top_level(&file);
    diags.extend(bind_diags);
    let mod_name = file.mod_decl.as_ref().map(|m| m.name.clone()).unwrap_or_default();
    let import_diags = imports::resolve_imports(&file, &scope, &mod_name, modules);
    diags.extend(import_diags);
    modules.insert(key, LoadedModule { key: segments.join("."), mod_name, scope });
}

/// The checked-but-not-yet-run state of a program: everything `execute`
/// needs, shared by `compile_and_run` and `compile_and_check`.
struct Checked {
    file: Rc<File>,
    scope: Rc<Scope>,
    types: Rc<TypeTable>,
    templated: HashMap<String, bool>,
}

/// Runs lex/parse/load/bind/import/type-check for the module at
/// `entry_segments` under `loader`'s root. Collects diagnostics from every
/// phase rather than stopping at the first.
fn compile(loader: &Loader, entry_segments: &[String]) -> Result<Checked, Vec<Diagnostic>> {
    let mut modules = HashMap::new();
    let mut files = HashMap::new();
    let mut diags = Vec::new();

    load_module_recursive(entry_segments, loader, &mut modules, &mut files, &mut diags);

    let entry_key = entry_segments.join(".");
    let entry_file = match files.get(&entry_key) {
        Some(f) => f.clone(),
        None => return Err(diags),
    };
    let entry_scope = match modules.get(&entry_key) {
        Some(m) => m.scope.clone(),
        None => return Err(diags),
    };

    let (templated, override_diags) = crate::types::resolver::check_overrides(&entry_scope);
    diags.extend(override_diags);

    let (types, check_diags) = checker::check_module(&entry_file, &entry_scope, &templated);
    diags.extend(check_diags);

    if !diags.is_empty() {
        return Err(diags);
    }

    Ok(Checked { file: entry_file, scope: entry_scope, types: Rc::new(types), templated })
}

/// Runs the full pipeline for the module at `entry_segments` under
/// `loader`'s root. On any lex/parse/bind/import/type diagnostic, returns
/// every diagnostic collected and never executes. Otherwise runs `main`
/// and returns its exit code.
pub fn compile_and_run(loader: &Loader, entry_segments: &[String], program_args: &[String]) -> Result<i32, Vec<Diagnostic>> {
    let checked = compile(loader, entry_segments)?;
    interpreter::execute(&checked.file, &checked.scope, checked.types.clone(), &checked.templated, program_args)
        .map_err(|d| vec![d])
}

/// Runs every phase up to and including type checking without executing
/// `main` — the `ell check` subcommand.
pub fn compile_and_check(loader: &Loader, entry_segments: &[String]) -> Result<(), Vec<Diagnostic>> {
    compile(loader, entry_segments).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_module(dir: &std::path::Path, rel: &str, contents: &str) {
        let full = dir.join(rel);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(full).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn hello_arithmetic_exits_with_computed_code() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(
            tmp.path(),
            "Main.ell",
            "func main(argc: []i32, argv: []string): i32 { ret 40 + 2; }\n",
        );
        let loader = Loader::new(tmp.path()).unwrap();
        let code = compile_and_run(&loader, &["Main".to_string()], &[]).unwrap();
        assert_eq!(code, 42);
    }

    #[test]
    fn null_assigned_to_bit_is_rejected_before_execution() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(
            tmp.path(),
            "Main.ell",
            "func main(argc: []i32, argv: []string): i32 { var x: bit = null; ret 1; }\n",
        );
        let loader = Loader::new(tmp.path()).unwrap();
        let diags = compile_and_run(&loader, &["Main".to_string()], &[]).unwrap_err();
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn range_loop_accumulates_expected_total() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(
            tmp.path(),
            "Main.ell",
            "func main(argc: []i32, argv: []string): i32 { var total: i32 = 0; loop (i: 1..=5) { total += i; } ret total; }\n",
        );
        let loader = Loader::new(tmp.path()).unwrap();
        let code = compile_and_run(&loader, &["Main".to_string()], &[]).unwrap();
        assert_eq!(code, 15);
    }

    #[test]
    fn constructor_and_instance_method_mutate_self() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(
            tmp.path(),
            "Main.ell",
            "class Counter {\n\
             \x20 var n: i32;\n\
             \x20 Counter(start: i32) { self.n = start; }\n\
             \x20 func inc(): i32 { self.n += 1; ret self.n; }\n\
             }\n\
             func main(argc: []i32, argv: []string): i32 {\n\
             \x20 var c = Counter(10);\n\
             \x20 c.inc(); c.inc();\n\
             \x20 ret c.inc();\n\
             }\n",
        );
        let loader = Loader::new(tmp.path()).unwrap();
        let code = compile_and_run(&loader, &["Main".to_string()], &[]).unwrap();
        assert_eq!(code, 13);
    }

    #[test]
    fn template_class_without_override_is_not_instantiable() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(
            tmp.path(),
            "Main.ell",
            "class Base { template func name(): string; }\n\
             class Good : Base { override func name(): string { ret \"ok\"; } }\n\
             class Bad : Base { }\n\
             func main(argc: []i32, argv: []string): i32 {\n\
             \x20 var g = Good();\n\
             \x20 var b = Bad();\n\
             \x20 ret 0;\n\
             }\n",
        );
        let loader = Loader::new(tmp.path()).unwrap();
        let diags = compile_and_run(&loader, &["Main".to_string()], &[]).unwrap_err();
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn module_import_is_consulted_once() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(tmp.path(), "util.ell", "pub func sq(x: i32): i32 { ret x * x; }\n");
        write_module(
            tmp.path(),
            "Main.ell",
            "import util::{sq};\nfunc main(argc: []i32, argv: []string): i32 { ret sq(7); }\n",
        );
        let loader = Loader::new(tmp.path()).unwrap();
        let code = compile_and_run(&loader, &["Main".to_string()], &[]).unwrap();
        assert_eq!(code, 49);
    }

    #[test]
    fn range_loop_var_keeps_the_range_bounds_integer_width() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(
            tmp.path(),
            "Main.ell",
            "func main(argc: []i32, argv: []string): i32 {\n\
             \x20 var mismatch: i32 = 0;\n\
             \x20 loop (i: 1u64..=3u64) { if type(i) != \"u64\" { mismatch = 1; } }\n\
             \x20 ret mismatch;\n\
             }\n",
        );
        let loader = Loader::new(tmp.path()).unwrap();
        let code = compile_and_run(&loader, &["Main".to_string()], &[]).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn division_by_zero_yields_infinity_rather_than_erroring() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(
            tmp.path(),
            "Main.ell",
            "func main(argc: []i32, argv: []string): i32 { var x: f64 = 1 / 0; ret 0; }\n",
        );
        let loader = Loader::new(tmp.path()).unwrap();
        let code = compile_and_run(&loader, &["Main".to_string()], &[]).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn main_with_wrong_parameter_types_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(
            tmp.path(),
            "Main.ell",
            "func main(a: string, b: i32): bool { ret true; }\n",
        );
        let loader = Loader::new(tmp.path()).unwrap();
        let diags = compile_and_run(&loader, &["Main".to_string()], &[]).unwrap_err();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("main"), "{:?}", diags);
    }
}
