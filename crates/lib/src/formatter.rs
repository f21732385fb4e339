//! Build progress formatting.
//!
//! The executor reports every step through a [`Formatter`]; each event
//! returns a chunk of text that is written to the progress stream
//! immediately, so the stream is a faithful linear trace of the build.
//! [`DefaultFormatter`] renders Xcode-style human-readable output with
//! optional color.

use std::io::Write;
use std::path::Path;

use owo_colors::{OwoColorize, Style};

use crate::invocation::Invocation;
use crate::target::{BuildContext, Target};

/// Sink for build progress events.
///
/// Implementations are free to keep internal state (timing, indentation),
/// but the executor only ever calls them from one thread, in execution
/// order.
pub trait Formatter {
  fn begin(&self, context: &BuildContext) -> String;
  fn success(&self, context: &BuildContext) -> String;
  fn failure(&self, context: &BuildContext, failing: &[Invocation]) -> String;

  fn begin_target(&self, context: &BuildContext, target: &Target) -> String;
  fn finish_target(&self, context: &BuildContext, target: &Target) -> String;

  fn begin_check_dependencies(&self, target: &Target) -> String;
  fn finish_check_dependencies(&self, target: &Target) -> String;

  fn begin_write_auxiliary_files(&self, target: &Target) -> String;
  fn finish_write_auxiliary_files(&self, target: &Target) -> String;
  fn create_auxiliary_directory(&self, directory: &str) -> String;
  fn write_auxiliary_file(&self, path: &str) -> String;
  fn set_auxiliary_executable(&self, path: &str) -> String;

  fn begin_create_product_structure(&self, target: &Target) -> String;
  fn finish_create_product_structure(&self, target: &Target) -> String;

  /// `resolved_executable` is the executable after search-path resolution;
  /// empty when resolution failed.
  fn begin_invocation(&self, invocation: &Invocation, resolved_executable: &str) -> String;
  fn finish_invocation(&self, invocation: &Invocation, resolved_executable: &str) -> String;
}

/// Write a formatter chunk to the progress stream.
///
/// Chunks are flushed immediately so interleaved child-process output does
/// not reorder the trace.
pub fn emit(chunk: &str) {
  if chunk.is_empty() {
    return;
  }
  let mut stdout = std::io::stdout();
  let _ = stdout.write_all(chunk.as_bytes());
  let _ = stdout.flush();
}

/// The rule line for an invocation: its log message, or a command summary
/// derived from the executable name and arguments.
fn rule_line(invocation: &Invocation, resolved_executable: &str) -> String {
  if !invocation.log_message.is_empty() {
    return invocation.log_message.clone();
  }

  let executable = if resolved_executable.is_empty() {
    &invocation.executable
  } else {
    resolved_executable
  };
  let name = Path::new(executable)
    .file_name()
    .and_then(|name| name.to_str())
    .unwrap_or(executable);

  let mut line = name.to_string();
  for argument in &invocation.arguments {
    line.push(' ');
    line.push_str(argument);
  }
  line
}

/// Xcode-style text output.
#[derive(Debug, Clone)]
pub struct DefaultFormatter {
  color: bool,
}

impl DefaultFormatter {
  /// `color` should be true only when the stream is a terminal.
  pub fn new(color: bool) -> Self {
    Self { color }
  }

  fn styled(&self, text: &str, style: Style) -> String {
    if self.color {
      text.style(style).to_string()
    } else {
      text.to_string()
    }
  }
}

impl Formatter for DefaultFormatter {
  fn begin(&self, _context: &BuildContext) -> String {
    String::new()
  }

  fn success(&self, _context: &BuildContext) -> String {
    format!("{}\n", self.styled("** BUILD SUCCEEDED **", Style::new().green().bold()))
  }

  fn failure(&self, _context: &BuildContext, failing: &[Invocation]) -> String {
    let mut out = format!("{}\n", self.styled("** BUILD FAILED **", Style::new().red().bold()));

    if !failing.is_empty() {
      out.push_str("\nThe following build commands failed:\n");
      for invocation in failing {
        out.push('\t');
        out.push_str(&rule_line(invocation, &invocation.executable));
        out.push('\n');
      }
      let plural = if failing.len() == 1 { "" } else { "s" };
      out.push_str(&format!("({} failure{})\n", failing.len(), plural));
    }

    out
  }

  fn begin_target(&self, context: &BuildContext, target: &Target) -> String {
    let header = format!(
      "=== BUILD TARGET {} WITH CONFIGURATION {} ===",
      target.name(),
      context.configuration()
    );
    format!("{}\n\n", self.styled(&header, Style::new().bold()))
  }

  fn finish_target(&self, _context: &BuildContext, _target: &Target) -> String {
    "\n".to_string()
  }

  fn begin_check_dependencies(&self, _target: &Target) -> String {
    "Check dependencies\n".to_string()
  }

  fn finish_check_dependencies(&self, _target: &Target) -> String {
    "\n".to_string()
  }

  fn begin_write_auxiliary_files(&self, _target: &Target) -> String {
    "Write auxiliary files\n".to_string()
  }

  fn finish_write_auxiliary_files(&self, _target: &Target) -> String {
    "\n".to_string()
  }

  fn create_auxiliary_directory(&self, directory: &str) -> String {
    format!("/bin/mkdir -p {}\n", directory)
  }

  fn write_auxiliary_file(&self, path: &str) -> String {
    format!("write-file {}\n", path)
  }

  fn set_auxiliary_executable(&self, path: &str) -> String {
    format!("chmod 0755 {}\n", path)
  }

  fn begin_create_product_structure(&self, _target: &Target) -> String {
    "Create product structure\n".to_string()
  }

  fn finish_create_product_structure(&self, _target: &Target) -> String {
    "\n".to_string()
  }

  fn begin_invocation(&self, invocation: &Invocation, resolved_executable: &str) -> String {
    let mut out = self.styled(&rule_line(invocation, resolved_executable), Style::new().bold());
    out.push('\n');

    if !invocation.working_directory.is_empty() {
      out.push_str(&format!("    cd {}\n", invocation.working_directory));
    }

    // BTreeMap iteration is already in sorted key order.
    for (key, value) in &invocation.environment {
      out.push_str(&format!("    export {}={}\n", key, value));
    }

    let executable = if resolved_executable.is_empty() {
      &invocation.executable
    } else {
      resolved_executable
    };
    out.push_str("    ");
    out.push_str(executable);
    for argument in &invocation.arguments {
      out.push(' ');
      out.push_str(argument);
    }
    out.push('\n');

    out
  }

  fn finish_invocation(&self, _invocation: &Invocation, _resolved_executable: &str) -> String {
    "\n".to_string()
  }
}
