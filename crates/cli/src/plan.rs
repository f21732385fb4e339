//! Build plan loading.
//!
//! The plan file is the hand-off point from project parsing, which happens
//! outside this driver: a JSON document listing targets, their dependency
//! names, their SDK executable search paths, and the tool invocations each
//! target runs. The loaded plan doubles as the phase planner the executor
//! consults target by target.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use serde::Deserialize;

use xbuild_lib::invocation::Invocation;
use xbuild_lib::target::{
  BuildEnvironment, EnvironmentError, PhasePlanner, Target, TargetEnvironment, TargetGraph,
};

/// One target entry in the plan.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPlan {
  /// Unique target name.
  pub name: String,

  /// Names of targets that must build first.
  #[serde(default)]
  pub dependencies: Vec<String>,

  /// SDK search path for resolving bare executable names.
  #[serde(default)]
  pub executable_paths: Vec<PathBuf>,

  /// Set false to mark a target whose build settings could not be
  /// resolved; it is skipped with a diagnostic, like the real thing.
  #[serde(default = "default_true")]
  pub environment: bool,

  /// Tool invocations, in phase order.
  #[serde(default)]
  pub invocations: Vec<Invocation>,
}

/// A complete build plan.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPlan {
  /// Configuration name shown in the build log.
  #[serde(default = "default_configuration")]
  pub configuration: String,

  pub targets: Vec<TargetPlan>,
}

fn default_true() -> bool {
  true
}

fn default_configuration() -> String {
  "Debug".to_string()
}

impl BuildPlan {
  /// Load and validate a plan file.
  ///
  /// # Errors
  ///
  /// When the file cannot be read or parsed, when two targets share a
  /// name, or when a dependency names an unknown target.
  pub fn load(path: &Path) -> Result<Self> {
    let contents =
      fs::read_to_string(path).with_context(|| format!("couldn't read build plan '{}'", path.display()))?;
    let plan: BuildPlan =
      serde_json::from_str(&contents).with_context(|| format!("couldn't parse build plan '{}'", path.display()))?;
    plan.validate()?;
    Ok(plan)
  }

  fn validate(&self) -> Result<()> {
    let mut names: HashSet<&str> = HashSet::new();
    for target in &self.targets {
      if !names.insert(target.name.as_str()) {
        bail!("duplicate target '{}' in build plan", target.name);
      }
    }

    for target in &self.targets {
      for dependency in &target.dependencies {
        if !names.contains(dependency.as_str()) {
          bail!("target '{}' depends on unknown target '{}'", target.name, dependency);
        }
      }
    }

    Ok(())
  }

  /// The dependency graph over the plan's targets, in listed order.
  pub fn target_graph(&self) -> TargetGraph {
    let mut graph = TargetGraph::new();
    for target in &self.targets {
      graph.insert(
        Target::new(target.name.as_str()),
        target.dependencies.iter().map(|name| Target::new(name.as_str())),
      );
    }
    graph
  }

  fn entry(&self, target: &Target) -> Option<&TargetPlan> {
    self.targets.iter().find(|entry| entry.name == target.name())
  }
}

impl PhasePlanner for BuildPlan {
  fn target_environment(
    &self,
    _build_environment: &BuildEnvironment,
    target: &Target,
  ) -> Result<TargetEnvironment, EnvironmentError> {
    let entry = self
      .entry(target)
      .ok_or_else(|| EnvironmentError::Unavailable(target.name().to_string()))?;
    if !entry.environment {
      return Err(EnvironmentError::Unavailable(target.name().to_string()));
    }
    Ok(TargetEnvironment::new(entry.executable_paths.clone()))
  }

  fn invocations(&self, _target_environment: &TargetEnvironment, target: &Target) -> Vec<Invocation> {
    self.entry(target).map(|entry| entry.invocations.clone()).unwrap_or_default()
  }
}
