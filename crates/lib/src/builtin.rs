//! In-process build tools dispatched by executable name.
//!
//! An invocation whose executable starts with `builtin-` is not spawned;
//! the executor looks the name up in a [`Registry`] and runs the matching
//! [`Driver`] on its own thread. Drivers behave like well-mannered command
//! line tools: failures go to stderr and surface as a nonzero exit code,
//! never as a panic.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

/// Prefix marking an executable name as an in-process driver.
pub const BUILTIN_PREFIX: &str = "builtin-";

/// An in-process build tool.
pub trait Driver: Send + Sync {
  /// Full executable name, including the `builtin-` prefix.
  fn name(&self) -> &str;

  /// Run the tool synchronously. Returns an exit code; zero is success.
  fn run(&self, arguments: &[String], environment: &BTreeMap<String, String>, working_directory: &str) -> i32;
}

/// Lookup table from `builtin-` executable names to drivers.
#[derive(Clone, Default)]
pub struct Registry {
  drivers: HashMap<String, Arc<dyn Driver>>,
}

impl Registry {
  /// An empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// The driver set the simple executor needs.
  pub fn default_registry() -> Self {
    let mut registry = Self::new();
    registry.register(Arc::new(CopyDriver));
    registry.register(Arc::new(CreateProductStructureDriver));
    registry.register(Arc::new(TouchDriver));
    registry
  }

  /// Add a driver, replacing any existing one with the same name.
  pub fn register(&mut self, driver: Arc<dyn Driver>) {
    self.drivers.insert(driver.name().to_string(), driver);
  }

  /// Look up a driver by its full executable name.
  pub fn driver(&self, name: &str) -> Option<Arc<dyn Driver>> {
    self.drivers.get(name).cloned()
  }
}

impl std::fmt::Debug for Registry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
    names.sort_unstable();
    f.debug_struct("Registry").field("drivers", &names).finish()
  }
}

/// Resolve `path` against the working directory when it is relative.
fn resolve(working_directory: &str, path: &str) -> PathBuf {
  let path = Path::new(path);
  if path.is_absolute() || working_directory.is_empty() {
    path.to_path_buf()
  } else {
    Path::new(working_directory).join(path)
  }
}

/// `builtin-copy`: copy each source file into the destination directory.
///
/// The destination is the last non-flag argument and is created when
/// missing. Flag arguments are accepted for tool compatibility and
/// ignored.
struct CopyDriver;

impl Driver for CopyDriver {
  fn name(&self) -> &str {
    "builtin-copy"
  }

  fn run(&self, arguments: &[String], _environment: &BTreeMap<String, String>, working_directory: &str) -> i32 {
    let paths: Vec<&String> = arguments.iter().filter(|argument| !argument.starts_with('-')).collect();
    let Some((destination, sources)) = paths.split_last() else {
      eprintln!("error: builtin-copy: missing destination");
      return 1;
    };
    if sources.is_empty() {
      eprintln!("error: builtin-copy: missing source");
      return 1;
    }

    let destination = resolve(working_directory, destination);
    if let Err(err) = std::fs::create_dir_all(&destination) {
      eprintln!("error: builtin-copy: {}: {}", destination.display(), err);
      return 1;
    }

    for source in sources {
      let source = resolve(working_directory, source);
      let Some(file_name) = source.file_name() else {
        eprintln!("error: builtin-copy: invalid source {}", source.display());
        return 1;
      };

      debug!(source = %source.display(), destination = %destination.display(), "copying");
      if let Err(err) = std::fs::copy(&source, destination.join(file_name)) {
        eprintln!("error: builtin-copy: {}: {}", source.display(), err);
        return 1;
      }
    }

    0
  }
}

/// `builtin-create-product-structure`: recursively create each argument
/// directory.
struct CreateProductStructureDriver;

impl Driver for CreateProductStructureDriver {
  fn name(&self) -> &str {
    "builtin-create-product-structure"
  }

  fn run(&self, arguments: &[String], _environment: &BTreeMap<String, String>, working_directory: &str) -> i32 {
    for argument in arguments {
      let directory = resolve(working_directory, argument);
      debug!(directory = %directory.display(), "creating product directory");
      if let Err(err) = std::fs::create_dir_all(&directory) {
        eprintln!("error: builtin-create-product-structure: {}: {}", directory.display(), err);
        return 1;
      }
    }
    0
  }
}

/// `builtin-touch`: create each argument path as an empty file when it
/// does not already exist.
struct TouchDriver;

impl Driver for TouchDriver {
  fn name(&self) -> &str {
    "builtin-touch"
  }

  fn run(&self, arguments: &[String], _environment: &BTreeMap<String, String>, working_directory: &str) -> i32 {
    for argument in arguments {
      let path = resolve(working_directory, argument);
      let result = std::fs::OpenOptions::new().create(true).append(true).open(&path);
      if let Err(err) = result {
        eprintln!("error: builtin-touch: {}: {}", path.display(), err);
        return 1;
      }
    }
    0
  }
}
