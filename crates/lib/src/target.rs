//! Targets, target graphs, and the collaborator seams around them.
//!
//! The executor consumes targets as opaque handles: everything it needs to
//! know about a target arrives through the [`PhasePlanner`] seam, which
//! stands in for project parsing and build-setting evaluation.

use std::path::PathBuf;

use thiserror::Error;

use crate::graph::DirectedGraph;
use crate::invocation::Invocation;

/// Stable handle for one buildable unit (library, binary, bundle).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
  name: String,
}

impl Target {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }

  /// The target's printable name.
  pub fn name(&self) -> &str {
    &self.name
  }
}

impl std::fmt::Display for Target {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.name)
  }
}

/// DAG over targets defining build order.
pub type TargetGraph = DirectedGraph<Target>;

/// Build-wide context threaded through to collaborators.
#[derive(Debug, Clone, Default)]
pub struct BuildEnvironment {
  /// Directory the build was started from.
  pub working_directory: PathBuf,
}

/// Per-target environment.
///
/// Currently carries the SDK's ordered executable search path, used to
/// resolve bare executable names.
#[derive(Debug, Clone, Default)]
pub struct TargetEnvironment {
  executable_paths: Vec<PathBuf>,
}

impl TargetEnvironment {
  pub fn new(executable_paths: Vec<PathBuf>) -> Self {
    Self { executable_paths }
  }

  /// Ordered search path for resolving bare executable names.
  pub fn executable_paths(&self) -> &[PathBuf] {
    &self.executable_paths
  }
}

/// Why a target environment could not be constructed.
#[derive(Debug, Error)]
pub enum EnvironmentError {
  /// The target has no usable build settings.
  #[error("no build settings available for target '{0}'")]
  Unavailable(String),
}

/// Produces per-target environments and invocation lists.
///
/// Implemented by whatever resolved the project: the executor only asks
/// for an environment and the phase invocations, one target at a time.
pub trait PhasePlanner {
  /// Construct the environment for `target`.
  ///
  /// # Errors
  ///
  /// [`EnvironmentError`] when the target's settings cannot be resolved.
  /// The executor logs the failure, skips the target, and continues; it
  /// does not fail the build.
  fn target_environment(
    &self,
    build_environment: &BuildEnvironment,
    target: &Target,
  ) -> Result<TargetEnvironment, EnvironmentError>;

  /// The ordered tool invocations for `target`'s build phases.
  fn invocations(&self, target_environment: &TargetEnvironment, target: &Target) -> Vec<Invocation>;
}

/// Context for one build: what is being built and how to plan it.
pub struct BuildContext {
  action: String,
  configuration: String,
  planner: Box<dyn PhasePlanner>,
}

impl BuildContext {
  pub fn new(action: impl Into<String>, configuration: impl Into<String>, planner: Box<dyn PhasePlanner>) -> Self {
    Self {
      action: action.into(),
      configuration: configuration.into(),
      planner,
    }
  }

  /// The build action name, e.g. `build`.
  pub fn action(&self) -> &str {
    &self.action
  }

  /// The configuration being built, e.g. `Debug`.
  pub fn configuration(&self) -> &str {
    &self.configuration
  }

  /// Resolve the environment for `target` through the planner.
  pub fn target_environment(
    &self,
    build_environment: &BuildEnvironment,
    target: &Target,
  ) -> Result<TargetEnvironment, EnvironmentError> {
    self.planner.target_environment(build_environment, target)
  }

  /// Plan the phase invocations for `target`.
  pub fn phase_invocations(&self, target_environment: &TargetEnvironment, target: &Target) -> Vec<Invocation> {
    self.planner.invocations(target_environment, target)
  }
}
