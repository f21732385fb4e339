//! Pre-invocation materialization of directories and embedded files.
//!
//! Before any tool in a target runs, every declared output gets its parent
//! directory created and every embedded auxiliary file is written to disk.
//! The pass walks invocations in listed order and reports each mutation
//! through the formatter.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::formatter::{Formatter, emit};
use crate::invocation::Invocation;

/// Failure while materializing a directory or auxiliary file.
#[derive(Debug, Error)]
#[error("couldn't materialize '{path}': {source}")]
pub struct AuxiliaryFileError {
  /// The path that could not be created or written.
  pub path: PathBuf,
  #[source]
  pub source: std::io::Error,
}

impl AuxiliaryFileError {
  fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self {
      path: path.into(),
      source,
    }
  }
}

/// Materialize auxiliary state for one target's invocations.
///
/// For each invocation, in listed order:
///
/// 1. Ensure the parent directory of every declared output exists,
///    creating it recursively and emitting `create_auxiliary_directory`.
/// 2. Write each auxiliary file that is not already present, creating its
///    parent directory, truncating to the exact embedded bytes, and
///    setting mode 0755 when the file is marked executable.
///
/// The presence check on auxiliary files is a coarse read test: a path
/// that already exists is never rewritten, even when the embedded contents
/// differ.
///
/// In dry-run mode nothing on disk changes; directories and files handled
/// earlier in the pass are tracked in memory, so the emitted event
/// sequence is identical to an error-free wet run.
///
/// # Errors
///
/// [`AuxiliaryFileError`] on the first directory creation, file write, or
/// permission change that fails. The target fails without any invocation
/// having run.
pub fn write_auxiliary_files(
  invocations: &[Invocation],
  formatter: &dyn Formatter,
  dry_run: bool,
) -> Result<(), AuxiliaryFileError> {
  let mut created_directories: HashSet<PathBuf> = HashSet::new();
  let mut written_files: HashSet<PathBuf> = HashSet::new();

  for invocation in invocations {
    for output in &invocation.outputs {
      let Some(directory) = parent_directory(Path::new(output)) else {
        continue;
      };

      if directory.is_dir() || created_directories.contains(directory) {
        continue;
      }

      emit(&formatter.create_auxiliary_directory(&directory.display().to_string()));
      created_directories.insert(directory.to_path_buf());

      if !dry_run {
        std::fs::create_dir_all(directory).map_err(|err| AuxiliaryFileError::new(directory, err))?;
      }
    }

    for auxiliary in &invocation.auxiliary_files {
      let path = Path::new(&auxiliary.path);
      if path.exists() || written_files.contains(path) {
        debug!(path = %path.display(), "auxiliary file already present");
        continue;
      }

      if !dry_run
        && let Some(parent) = parent_directory(path)
      {
        std::fs::create_dir_all(parent).map_err(|err| AuxiliaryFileError::new(parent, err))?;
      }

      emit(&formatter.write_auxiliary_file(&auxiliary.path));
      written_files.insert(path.to_path_buf());

      if !dry_run {
        write_file(path, &auxiliary.contents).map_err(|err| AuxiliaryFileError::new(path, err))?;
      }

      if auxiliary.executable && !is_executable(path) {
        emit(&formatter.set_auxiliary_executable(&auxiliary.path));

        if !dry_run {
          set_executable(path).map_err(|err| AuxiliaryFileError::new(path, err))?;
        }
      }
    }
  }

  Ok(())
}

fn parent_directory(path: &Path) -> Option<&Path> {
  path.parent().filter(|parent| !parent.as_os_str().is_empty())
}

/// Write `contents` exactly, truncating any previous file.
fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
  let mut file = std::fs::File::create(path)?;
  file.write_all(contents)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;
  std::fs::metadata(path)
    .map(|metadata| metadata.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
  path.is_file()
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
  use std::os::unix::fs::PermissionsExt;
  std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
  Ok(())
}
