//! Test utilities for xbuild-lib.
//!
//! Cross-platform helpers for tests that execute real commands, and a
//! formatter that records the event sequence instead of rendering text.

use std::sync::Mutex;

use crate::formatter::Formatter;
use crate::invocation::Invocation;
use crate::target::{BuildContext, Target};

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Returns the command and args to echo a message.
///
/// On Unix, this uses /bin/echo directly. On Windows, echo is a shell
/// builtin, so we wrap it in cmd.exe.
#[cfg(unix)]
pub fn echo_msg(msg: &str) -> (&'static str, Vec<String>) {
  ("/bin/echo", vec![msg.to_string()])
}

#[cfg(windows)]
pub fn echo_msg(msg: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), format!("echo {}", msg)])
}

/// Returns the command and args to create a marker file.
#[cfg(unix)]
pub fn touch_file(path: &str) -> (&'static str, Vec<String>) {
  ("/usr/bin/touch", vec![path.to_string()])
}

#[cfg(windows)]
pub fn touch_file(path: &str) -> (&'static str, Vec<String>) {
  (
    "powershell.exe",
    vec![
      "-NoProfile".to_string(),
      "-Command".to_string(),
      format!("New-Item -ItemType File -Path '{}' -Force | Out-Null", path),
    ],
  )
}

/// Formatter that records one line per event, for order assertions.
///
/// Every method returns an empty chunk so nothing reaches the progress
/// stream.
#[derive(Debug, Default)]
pub struct RecordingFormatter {
  events: Mutex<Vec<String>>,
}

impl RecordingFormatter {
  /// The events recorded so far, in emission order.
  pub fn events(&self) -> Vec<String> {
    self.events.lock().expect("recording formatter poisoned").clone()
  }

  fn record(&self, event: String) -> String {
    self.events.lock().expect("recording formatter poisoned").push(event);
    String::new()
  }
}

impl Formatter for RecordingFormatter {
  fn begin(&self, _context: &BuildContext) -> String {
    self.record("begin".to_string())
  }

  fn success(&self, _context: &BuildContext) -> String {
    self.record("success".to_string())
  }

  fn failure(&self, _context: &BuildContext, failing: &[Invocation]) -> String {
    let names: Vec<&str> = failing.iter().map(|invocation| invocation.executable.as_str()).collect();
    self.record(format!("failure [{}]", names.join(", ")))
  }

  fn begin_target(&self, _context: &BuildContext, target: &Target) -> String {
    self.record(format!("begin-target {}", target.name()))
  }

  fn finish_target(&self, _context: &BuildContext, target: &Target) -> String {
    self.record(format!("finish-target {}", target.name()))
  }

  fn begin_check_dependencies(&self, target: &Target) -> String {
    self.record(format!("begin-check-dependencies {}", target.name()))
  }

  fn finish_check_dependencies(&self, target: &Target) -> String {
    self.record(format!("finish-check-dependencies {}", target.name()))
  }

  fn begin_write_auxiliary_files(&self, target: &Target) -> String {
    self.record(format!("begin-write-auxiliary-files {}", target.name()))
  }

  fn finish_write_auxiliary_files(&self, target: &Target) -> String {
    self.record(format!("finish-write-auxiliary-files {}", target.name()))
  }

  fn create_auxiliary_directory(&self, directory: &str) -> String {
    self.record(format!("create-auxiliary-directory {}", directory))
  }

  fn write_auxiliary_file(&self, path: &str) -> String {
    self.record(format!("write-auxiliary-file {}", path))
  }

  fn set_auxiliary_executable(&self, path: &str) -> String {
    self.record(format!("set-auxiliary-executable {}", path))
  }

  fn begin_create_product_structure(&self, target: &Target) -> String {
    self.record(format!("begin-create-product-structure {}", target.name()))
  }

  fn finish_create_product_structure(&self, target: &Target) -> String {
    self.record(format!("finish-create-product-structure {}", target.name()))
  }

  fn begin_invocation(&self, invocation: &Invocation, resolved_executable: &str) -> String {
    let executable = if resolved_executable.is_empty() {
      &invocation.executable
    } else {
      resolved_executable
    };
    self.record(format!("begin-invocation {}", executable))
  }

  fn finish_invocation(&self, invocation: &Invocation, resolved_executable: &str) -> String {
    let executable = if resolved_executable.is_empty() {
      &invocation.executable
    } else {
      resolved_executable
    };
    self.record(format!("finish-invocation {}", executable))
  }
}
