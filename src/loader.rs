// ABOUTME: Module loader — resolves a dotted import path to a parsed file, with caching and cycle detection

use crate::ast::File;
use crate::config::{ENTRY_FILE_STEM, SOURCE_EXTENSION};
use crate::diagnostics::Diagnostic;
use crate::error::LoaderError;
use crate::lexer::tokenize;
use crate::parser::parse_file;
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Debug, Clone)]
enum CacheEntry {
    /// `load` has been entered for this key but not yet returned: seeing it
    /// again means a cycle.
    InProgress,
    Done(Rc<File>),
}

/// The only component that reads the filesystem. Roots itself at a
/// directory via `cap-std`, so every lookup is confined under it regardless
/// of `..` segments or symlinks in a dotted module path.
pub struct Loader {
    root: Dir,
    cache: RefCell<HashMap<String, CacheEntry>>,
}

impl Loader {
    pub fn new(root_dir: &std::path::Path) -> Result<Self, LoaderError> {
        let dir = Dir::open_ambient_dir(root_dir, ambient_authority()).map_err(|e| LoaderError::Io {
            path: root_dir.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Loader { root: dir, cache: RefCell::new(HashMap::new()) })
    }

    fn candidate_paths(segments: &[String]) -> Vec<PathBuf> {
        let joined: PathBuf = segments.iter().collect();
        let mut first = joined.clone();
        first.push(format!("{}.{}", ENTRY_FILE_STEM, SOURCE_EXTENSION));
        let mut second = joined.clone();
        second.set_extension(SOURCE_EXTENSION);
        vec![first, second]
    }

    /// Resolves `segments` to a parsed file, consulting the cache first.
    /// Re-entering a `load` for a key still `InProgress` is a cycle.
    pub fn load(&self, segments: &[String]) -> Result<(Rc<File>, Vec<Diagnostic>), LoaderError> {
        let key = segments.join(".");

        if let Some(entry) = self.cache.borrow().get(&key) {
            return match entry {
                CacheEntry::InProgress => Err(LoaderError::Cycle { key }),
                CacheEntry::Done(file) => Ok((file.clone(), Vec::new())),
            };
        }

        self.cache.borrow_mut().insert(key.clone(), CacheEntry::InProgress);
        log::debug!("loader: resolving module `{}`", key);

        let candidates = Self::candidate_paths(segments);
        let mut tried = Vec::new();
        let mut source = None;
        for candidate in &candidates {
            match self.root.read_to_string(candidate) {
                Ok(text) => {
                    source = Some((candidate.clone(), text));
                    break;
                }
                Err(_) => tried.push(candidate.clone()),
            }
        }

        let (path, text) = match source {
            Some(s) => s,
            None => {
                self.cache.borrow_mut().remove(&key);
                return Err(LoaderError::NotFound { key, tried });
            }
        };

        log::trace!("loader: loaded `{}` from {}", key, path.display());

        let file_id: Rc<str> = Rc::from(key.as_str());
        let (tokens, mut diags) = tokenize(&text, file_id.clone());
        let (ast, parse_diags) = parse_file(&tokens, file_id);
        diags.extend(parse_diags);

        let ast = match ast {
            Some(ast) => ast,
            None => {
                self.cache.borrow_mut().remove(&key);
                return Err(LoaderError::ParseFailed { key });
            }
        };

        let rc = Rc::new(ast);
        self.cache.borrow_mut().insert(key.clone(), CacheEntry::Done(rc.clone()));
        Ok((rc, diags))
    }
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
    fn loads_last_segment_as_sibling_file() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(tmp.path(), "util.ell", "pub func sq(x: i32): i32 { ret x*x; }\n");
        let loader = Loader::new(tmp.path()).unwrap();
        let (file, diags) = loader.load(&["util".to_string()]).unwrap();
        assert!(diags.is_empty());
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn prefers_main_under_directory() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(tmp.path(), "util/Main.ell", "pub func sq(x: i32): i32 { ret x*x; }\n");
        let loader = Loader::new(tmp.path()).unwrap();
        let (file, _) = loader.load(&["util".to_string()]).unwrap();
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn missing_module_lists_attempted_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = Loader::new(tmp.path()).unwrap();
        let err = loader.load(&["nope".to_string()]).unwrap_err();
        match err {
            LoaderError::NotFound { key, tried } => {
                assert_eq!(key, "nope");
                assert_eq!(tried.len(), 2);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn second_load_hits_cache() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(tmp.path(), "util.ell", "pub func sq(x: i32): i32 { ret x*x; }\n");
        let loader = Loader::new(tmp.path()).unwrap();
        let (first, _) = loader.load(&["util".to_string()]).unwrap();
        let (second, _) = loader.load(&["util".to_string()]).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn reentrant_load_is_a_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = Loader::new(tmp.path()).unwrap();
        loader.cache.borrow_mut().insert("a".to_string(), CacheEntry::InProgress);
        let err = loader.load(&["a".to_string()]).unwrap_err();
        assert!(matches!(err, LoaderError::Cycle { .. }));
    }
}
