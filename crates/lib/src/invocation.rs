//! Tool invocation data model.
//!
//! An [`Invocation`] fully describes one unit of tool execution: the
//! executable, its arguments, environment, working directory, the paths it
//! consumes and produces, and any embedded files that must exist on disk
//! before it runs. The type is pure storage; scheduling and execution live
//! in [`crate::schedule`] and [`crate::executor`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A file the build system materializes before an invocation runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuxiliaryFile {
  /// Absolute path to write.
  pub path: String,

  /// Exact bytes to write. Accepts a plain string in serialized form.
  #[serde(with = "aux_contents")]
  pub contents: Vec<u8>,

  /// Whether the written file must carry the executable bit.
  pub executable: bool,
}

impl AuxiliaryFile {
  /// Convenience constructor for text contents.
  pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>, executable: bool) -> Self {
    Self {
      path: path.into(),
      contents: contents.into(),
      executable,
    }
  }
}

/// One unit of tool execution.
///
/// Paths are absolute strings compared byte-for-byte; no normalization is
/// ever applied. Every collection defaults to empty, so a deserialized
/// invocation may name only the fields it needs.
///
/// An empty `executable` marks a phony invocation: it participates in
/// scheduling through its declared inputs and outputs but is never
/// executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Invocation {
  /// What to run: empty (phony), a `builtin-` name resolved in-process, an
  /// absolute path, or a bare name resolved against the target's
  /// executable search path.
  pub executable: String,

  /// Arguments, in order.
  pub arguments: Vec<String>,

  /// Child-process environment. Keys are unique; user-facing output always
  /// iterates in sorted key order.
  pub environment: BTreeMap<String, String>,

  /// Absolute working directory for the child.
  pub working_directory: String,

  /// Paths this invocation reads; matched against other invocations'
  /// outputs to infer ordering.
  pub inputs: Vec<String>,

  /// Paths this invocation produces.
  pub outputs: Vec<String>,

  /// Ordering-only tokens consumed; never present on disk.
  pub phony_inputs: Vec<String>,

  /// Ordering-only tokens produced; never present on disk.
  pub phony_outputs: Vec<String>,

  /// Auxiliary ordering edges on the input side, e.g. discovered headers.
  pub input_dependencies: Vec<String>,

  /// Auxiliary ordering edges on the output side.
  pub output_dependencies: Vec<String>,

  /// Files to materialize before this invocation runs.
  pub auxiliary_files: Vec<AuxiliaryFile>,

  /// Short description for the build log's rule line. Empty means the
  /// formatter derives one from the executable and arguments.
  pub log_message: String,
}

impl Invocation {
  /// Whether this invocation only establishes ordering and is never run.
  pub fn is_phony(&self) -> bool {
    self.executable.is_empty()
  }

  /// Every string this invocation declares as produced: real outputs,
  /// phony outputs, and output dependencies, in that order.
  pub fn declared_outputs(&self) -> impl Iterator<Item = &str> {
    self
      .outputs
      .iter()
      .chain(&self.phony_outputs)
      .chain(&self.output_dependencies)
      .map(String::as_str)
  }

  /// Every string this invocation declares as consumed: real inputs,
  /// phony inputs, and input dependencies, in that order.
  pub fn consumed_inputs(&self) -> impl Iterator<Item = &str> {
    self
      .inputs
      .iter()
      .chain(&self.phony_inputs)
      .chain(&self.input_dependencies)
      .map(String::as_str)
  }
}

/// Auxiliary-file contents serialize as a string when they are valid
/// UTF-8, and as a byte array otherwise.
mod aux_contents {
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
    match std::str::from_utf8(bytes) {
      Ok(text) => serializer.serialize_str(text),
      Err(_) => serializer.serialize_bytes(bytes),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
      Text(String),
      Bytes(Vec<u8>),
    }

    Ok(match Repr::deserialize(deserializer)? {
      Repr::Text(text) => text.into_bytes(),
      Repr::Bytes(bytes) => bytes,
    })
  }
}
