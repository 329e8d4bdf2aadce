// ABOUTME: Fixed constants for the loader's filesystem convention and the CLI

/// The entry-file name the loader tries first inside a path's own directory,
/// e.g. `<root>/a/b/c/Main.<ext>`.
pub const ENTRY_FILE_STEM: &str = "Main";

/// The fixed source extension.
pub const SOURCE_EXTENSION: &str = "ell";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default exit code the CLI uses when diagnostics (rather than a `main`
/// return) halt the run.
pub const DIAGNOSTIC_EXIT_CODE: i32 = 1;
