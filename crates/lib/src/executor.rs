//! Build execution: targets in graph order, invocations in schedule order.
//!
//! [`SimpleExecutor`] runs everything directly and sequentially: one
//! target at a time, one invocation at a time, blocking on each child
//! process. The first failure stops the build and is reported through the
//! formatter's `failure` event.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::builtin::{BUILTIN_PREFIX, Registry};
use crate::formatter::{Formatter, emit};
use crate::graph::GraphError;
use crate::invocation::Invocation;
use crate::materialize::{AuxiliaryFileError, write_auxiliary_files};
use crate::schedule::schedule;
use crate::target::{BuildContext, BuildEnvironment, Target, TargetEnvironment, TargetGraph};

/// Failure while building a single target.
#[derive(Debug, Error)]
pub enum TargetError {
  /// The target's invocations form a dependency cycle.
  #[error(transparent)]
  Cycle(#[from] GraphError<usize>),

  /// Materializing directories or auxiliary files failed.
  #[error(transparent)]
  AuxiliaryFile(#[from] AuxiliaryFileError),

  /// An invocation failed; carried for the failure report.
  #[error("invocation of '{}' failed", invocation.executable)]
  Invocation { invocation: Invocation },
}

impl TargetError {
  /// The invocations to list in the build-failure report.
  fn failing_invocations(&self) -> Vec<Invocation> {
    match self {
      TargetError::Invocation { invocation } => vec![invocation.clone()],
      _ => Vec::new(),
    }
  }
}

/// A build backend: consumes a target graph and performs the build.
///
/// The formatter receives every progress event; the return value is the
/// only other channel out.
pub trait Executor {
  /// Build every target in `target_graph`, in dependency order.
  ///
  /// Returns `true` when the whole build succeeded.
  fn build(&self, build_environment: &BuildEnvironment, context: &BuildContext, target_graph: &TargetGraph) -> bool;
}

/// Executor that runs invocations directly, one at a time.
pub struct SimpleExecutor {
  formatter: Arc<dyn Formatter>,
  dry_run: bool,
  builtins: Registry,
}

impl SimpleExecutor {
  pub fn new(formatter: Arc<dyn Formatter>, dry_run: bool, builtins: Registry) -> Self {
    Self {
      formatter,
      dry_run,
      builtins,
    }
  }

  /// Materialize, schedule, and run one target's invocations.
  fn build_target(
    &self,
    target: &Target,
    target_environment: &TargetEnvironment,
    invocations: &[Invocation],
  ) -> Result<(), TargetError> {
    emit(&self.formatter.begin_write_auxiliary_files(target));
    write_auxiliary_files(invocations, self.formatter.as_ref(), self.dry_run)?;
    emit(&self.formatter.finish_write_auxiliary_files(target));

    emit(&self.formatter.begin_create_product_structure(target));
    emit(&self.formatter.finish_create_product_structure(target));

    let order = schedule(invocations)?;
    debug!(target = %target, scheduled = order.len(), "invocations scheduled");

    for index in order {
      let invocation = &invocations[index];
      if invocation.is_phony() {
        debug!(target = %target, "skipping phony invocation");
        continue;
      }
      self.run_invocation(invocation, target_environment)?;
    }

    Ok(())
  }

  /// Resolve, report, and execute one invocation.
  fn run_invocation(&self, invocation: &Invocation, target_environment: &TargetEnvironment) -> Result<(), TargetError> {
    let builtin = invocation.executable.starts_with(BUILTIN_PREFIX);

    let executable = if builtin || Path::new(&invocation.executable).is_absolute() {
      invocation.executable.clone()
    } else {
      match find_executable(&invocation.executable, target_environment.executable_paths()) {
        Some(path) => path.display().to_string(),
        None => {
          eprintln!("error: unable to find executable {}", invocation.executable);
          String::new()
        }
      }
    };

    emit(&self.formatter.begin_invocation(invocation, &executable));

    if !self.dry_run {
      for output in &invocation.outputs {
        if let Some(directory) = Path::new(output).parent()
          && !directory.as_os_str().is_empty()
          && let Err(err) = std::fs::create_dir_all(directory)
        {
          error!(directory = %directory.display(), error = %err, "couldn't create output directory");
          return Err(TargetError::Invocation {
            invocation: invocation.clone(),
          });
        }
      }

      if builtin {
        let Some(driver) = self.builtins.driver(&executable) else {
          error!(name = %executable, "no builtin driver registered");
          emit(&self.formatter.finish_invocation(invocation, &executable));
          return Err(TargetError::Invocation {
            invocation: invocation.clone(),
          });
        };

        let code = driver.run(&invocation.arguments, &invocation.environment, &invocation.working_directory);
        if code != 0 {
          error!(name = %executable, code, "builtin driver failed");
          emit(&self.formatter.finish_invocation(invocation, &executable));
          return Err(TargetError::Invocation {
            invocation: invocation.clone(),
          });
        }
      } else {
        match spawn(invocation, &executable) {
          Ok(status) if status.success() => {}
          Ok(status) => {
            error!(executable = %executable, code = ?status.code(), "command failed");
            emit(&self.formatter.finish_invocation(invocation, &executable));
            return Err(TargetError::Invocation {
              invocation: invocation.clone(),
            });
          }
          Err(err) => {
            error!(executable = %executable, error = %err, "couldn't spawn command");
            emit(&self.formatter.finish_invocation(invocation, &executable));
            return Err(TargetError::Invocation {
              invocation: invocation.clone(),
            });
          }
        }
      }
    }

    emit(&self.formatter.finish_invocation(invocation, &executable));
    Ok(())
  }
}

impl Executor for SimpleExecutor {
  fn build(&self, build_environment: &BuildEnvironment, context: &BuildContext, target_graph: &TargetGraph) -> bool {
    emit(&self.formatter.begin(context));

    let targets = match target_graph.ordered() {
      Ok(targets) => targets,
      Err(err) => {
        eprintln!("error: {}", err);
        return false;
      }
    };

    info!(targets = targets.len(), action = context.action(), "starting build");

    for target in &targets {
      emit(&self.formatter.begin_target(context, target));

      let target_environment = match context.target_environment(build_environment, target) {
        Ok(environment) => environment,
        Err(err) => {
          // A target without an environment produces no work but does not
          // fail the build.
          eprintln!("error: couldn't create target environment for {}: {}", target, err);
          emit(&self.formatter.finish_target(context, target));
          continue;
        }
      };

      emit(&self.formatter.begin_check_dependencies(target));
      let invocations = context.phase_invocations(&target_environment, target);
      emit(&self.formatter.finish_check_dependencies(target));

      info!(target = %target, invocations = invocations.len(), "building target");

      if let Err(err) = self.build_target(target, &target_environment, &invocations) {
        error!(target = %target, error = %err, "target failed");
        emit(&self.formatter.finish_target(context, target));
        emit(&self.formatter.failure(context, &err.failing_invocations()));
        return false;
      }

      emit(&self.formatter.finish_target(context, target));
    }

    emit(&self.formatter.success(context));
    true
  }
}

/// Spawn the invocation as a child process and wait for it.
///
/// The child's environment is exactly the invocation's mapping; nothing
/// from the driver's own environment leaks through.
fn spawn(invocation: &Invocation, executable: &str) -> std::io::Result<std::process::ExitStatus> {
  let mut command = Command::new(executable);
  command.args(&invocation.arguments).env_clear().envs(&invocation.environment);
  if !invocation.working_directory.is_empty() {
    command.current_dir(&invocation.working_directory);
  }
  command.status()
}

/// Search `paths` in order for a regular, executable file named `name`.
fn find_executable(name: &str, paths: &[PathBuf]) -> Option<PathBuf> {
  paths.iter().map(|directory| directory.join(name)).find(|candidate| is_executable_file(candidate))
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;
  std::fs::metadata(path)
    .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
  path.is_file()
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;
  use crate::target::{EnvironmentError, PhasePlanner};
  use crate::test_util::{RecordingFormatter, echo_msg, shell_cmd, touch_file};
  use tempfile::TempDir;

  /// Planner serving a fixed table of invocations per target name.
  #[derive(Default)]
  struct StaticPlanner {
    executable_paths: Vec<PathBuf>,
    invocations: HashMap<String, Vec<Invocation>>,
    unavailable: Vec<String>,
  }

  impl PhasePlanner for StaticPlanner {
    fn target_environment(
      &self,
      _build_environment: &BuildEnvironment,
      target: &Target,
    ) -> Result<TargetEnvironment, EnvironmentError> {
      if self.unavailable.iter().any(|name| name == target.name()) {
        return Err(EnvironmentError::Unavailable(target.name().to_string()));
      }
      Ok(TargetEnvironment::new(self.executable_paths.clone()))
    }

    fn invocations(&self, _target_environment: &TargetEnvironment, target: &Target) -> Vec<Invocation> {
      self.invocations.get(target.name()).cloned().unwrap_or_default()
    }
  }

  struct Harness {
    formatter: Arc<RecordingFormatter>,
    executor: SimpleExecutor,
    context: BuildContext,
    graph: TargetGraph,
  }

  fn harness(planner: StaticPlanner, targets: &[(&str, &[&str])], dry_run: bool) -> Harness {
    let formatter = Arc::new(RecordingFormatter::default());
    let executor = SimpleExecutor::new(formatter.clone(), dry_run, Registry::default_registry());
    let context = BuildContext::new("build", "Debug", Box::new(planner));

    let mut graph = TargetGraph::new();
    for (name, dependencies) in targets {
      graph.insert(Target::new(*name), dependencies.iter().map(|d| Target::new(*d)));
    }

    Harness {
      formatter,
      executor,
      context,
      graph,
    }
  }

  fn command_invocation(executable: &str, arguments: Vec<String>) -> Invocation {
    Invocation {
      executable: executable.to_string(),
      arguments,
      ..Default::default()
    }
  }

  #[test]
  fn empty_graph_succeeds() {
    let h = harness(StaticPlanner::default(), &[], false);
    assert!(h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));
    assert_eq!(h.formatter.events(), vec!["begin", "success"]);
  }

  #[test]
  fn dependent_invocations_run_in_producer_order() {
    // B consumes A's output; listed consumer-first to prove reordering.
    let temp = TempDir::new().unwrap();
    let artifact = temp.path().join("x.o");

    let (touch, touch_args) = touch_file(&artifact.display().to_string());
    let mut producer = command_invocation(touch, touch_args);
    producer.outputs = vec![artifact.display().to_string()];
    producer.log_message = "producer".to_string();

    let (echo, echo_args) = echo_msg("consumed");
    let mut consumer = command_invocation(echo, echo_args);
    consumer.inputs = vec![artifact.display().to_string()];
    consumer.log_message = "consumer".to_string();

    let mut planner = StaticPlanner::default();
    planner.invocations.insert("App".to_string(), vec![consumer, producer]);

    let h = harness(planner, &[("App", &[])], false);
    assert!(h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));
    assert!(artifact.exists());

    let events = h.formatter.events();
    let begin_producer = events.iter().position(|e| e == &format!("begin-invocation {}", touch)).unwrap();
    let begin_consumer = events.iter().position(|e| e == &format!("begin-invocation {}", echo)).unwrap();
    assert!(begin_producer < begin_consumer);
    assert_eq!(events.last().unwrap(), "success");
  }

  #[test]
  fn phony_invocation_orders_but_never_runs() {
    let phony = Invocation {
      phony_outputs: vec!["stage-1".to_string()],
      ..Default::default()
    };

    let (echo, echo_args) = echo_msg("staged");
    let mut real = command_invocation(echo, echo_args);
    real.phony_inputs = vec!["stage-1".to_string()];

    let mut planner = StaticPlanner::default();
    planner.invocations.insert("App".to_string(), vec![real, phony]);

    let h = harness(planner, &[("App", &[])], false);
    assert!(h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));

    let events = h.formatter.events();
    let invocation_events: Vec<&String> = events.iter().filter(|e| e.starts_with("begin-invocation")).collect();
    assert_eq!(invocation_events, vec![&format!("begin-invocation {}", echo)]);
  }

  #[test]
  fn builtin_copy_runs_in_process() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src.txt");
    std::fs::write(&source, "payload").unwrap();
    let destination = temp.path().join("dst");

    let invocation = command_invocation(
      "builtin-copy",
      vec![source.display().to_string(), destination.display().to_string()],
    );

    let mut planner = StaticPlanner::default();
    planner.invocations.insert("App".to_string(), vec![invocation]);

    let h = harness(planner, &[("App", &[])], false);
    assert!(h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));
    assert_eq!(std::fs::read_to_string(destination.join("src.txt")).unwrap(), "payload");
  }

  #[test]
  fn failing_builtin_fails_the_build() {
    // builtin-copy with no arguments exits nonzero.
    let invocation = command_invocation("builtin-copy", vec![]);

    let mut planner = StaticPlanner::default();
    planner.invocations.insert("App".to_string(), vec![invocation]);

    let h = harness(planner, &[("App", &[])], false);
    assert!(!h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));

    let events = h.formatter.events();
    assert_eq!(events.last().unwrap(), "failure [builtin-copy]");
  }

  #[test]
  fn missing_builtin_fails_the_build() {
    let invocation = command_invocation("builtin-does-not-exist", vec![]);

    let mut planner = StaticPlanner::default();
    planner.invocations.insert("App".to_string(), vec![invocation]);

    let h = harness(planner, &[("App", &[])], false);
    assert!(!h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));
  }

  #[cfg(unix)]
  #[test]
  fn bare_name_resolves_through_search_path() {
    let temp = TempDir::new().unwrap();
    let empty = temp.path().join("empty");
    std::fs::create_dir(&empty).unwrap();

    let mut planner = StaticPlanner {
      executable_paths: vec![empty, PathBuf::from("/bin")],
      ..Default::default()
    };
    planner
      .invocations
      .insert("App".to_string(), vec![command_invocation("echo", vec!["hi".to_string()])]);

    let h = harness(planner, &[("App", &[])], false);
    assert!(h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));

    let events = h.formatter.events();
    assert!(events.contains(&"begin-invocation /bin/echo".to_string()));
  }

  #[test]
  fn unresolvable_executable_fails_the_build() {
    let temp = TempDir::new().unwrap();
    let mut planner = StaticPlanner {
      executable_paths: vec![temp.path().to_path_buf()],
      ..Default::default()
    };
    planner
      .invocations
      .insert("App".to_string(), vec![command_invocation("no-such-tool", vec![])]);

    let h = harness(planner, &[("App", &[])], false);
    assert!(!h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));
  }

  #[cfg(unix)]
  #[test]
  fn nonzero_exit_stops_remaining_targets() {
    let (sh, fail_args) = shell_cmd("exit 2");
    let (echo, echo_args) = echo_msg("should-not-run");

    let mut planner = StaticPlanner::default();
    planner.invocations.insert("T1".to_string(), vec![]);
    planner.invocations.insert("T2".to_string(), vec![command_invocation(sh, fail_args)]);
    planner.invocations.insert("T3".to_string(), vec![command_invocation(echo, echo_args)]);

    let h = harness(planner, &[("T1", &[]), ("T2", &["T1"]), ("T3", &["T2"])], false);
    assert!(!h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));

    let events = h.formatter.events();
    assert!(events.contains(&"begin-target T2".to_string()));
    assert!(!events.contains(&"begin-target T3".to_string()));
    assert!(events.contains(&"finish-target T2".to_string()));
    assert_eq!(events.last().unwrap(), &format!("failure [{}]", sh));
  }

  #[test]
  fn missing_environment_skips_target_but_not_build() {
    let (echo, echo_args) = echo_msg("built");
    let mut planner = StaticPlanner {
      unavailable: vec!["Broken".to_string()],
      ..Default::default()
    };
    planner.invocations.insert("App".to_string(), vec![command_invocation(echo, echo_args)]);

    let h = harness(planner, &[("Broken", &[]), ("App", &[])], false);
    assert!(h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));

    let events = h.formatter.events();
    assert!(events.contains(&"begin-target Broken".to_string()));
    assert!(events.contains(&"finish-target Broken".to_string()));
    // The skipped target never reached dependency checking.
    assert!(!events.contains(&"begin-check-dependencies Broken".to_string()));
    assert_eq!(events.last().unwrap(), "success");
  }

  #[test]
  fn invocation_cycle_fails_the_target() {
    let mut a = command_invocation("/bin/true", vec![]);
    a.outputs = vec!["y".to_string()];
    a.inputs = vec!["z".to_string()];
    let mut b = command_invocation("/bin/true", vec![]);
    b.outputs = vec!["z".to_string()];
    b.inputs = vec!["y".to_string()];

    let mut planner = StaticPlanner::default();
    planner.invocations.insert("App".to_string(), vec![a, b]);

    let h = harness(planner, &[("App", &[])], false);
    assert!(!h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));

    // Cycle failures carry no invocation.
    let events = h.formatter.events();
    assert_eq!(events.last().unwrap(), "failure []");
  }

  #[test]
  fn dry_run_spawns_nothing_and_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let artifact = temp.path().join("out/marker");

    let (touch, touch_args) = touch_file(&artifact.display().to_string());
    let mut invocation = command_invocation(touch, touch_args);
    invocation.outputs = vec![artifact.display().to_string()];

    let mut planner = StaticPlanner::default();
    planner.invocations.insert("App".to_string(), vec![invocation]);

    let h = harness(planner, &[("App", &[])], true);
    assert!(h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));

    assert!(!artifact.exists());
    assert!(!temp.path().join("out").exists());

    let events = h.formatter.events();
    assert!(events.iter().any(|e| e.starts_with("begin-invocation")));
    assert_eq!(events.last().unwrap(), "success");
  }

  #[cfg(unix)]
  #[test]
  fn dry_run_event_stream_matches_wet_run() {
    let build = |dry_run: bool, temp: &TempDir| -> Vec<String> {
      let artifact = temp.path().join("out/x.o");
      let (touch, touch_args) = touch_file(&artifact.display().to_string());
      let mut invocation = command_invocation(touch, touch_args);
      invocation.outputs = vec![artifact.display().to_string()];

      let mut planner = StaticPlanner::default();
      planner.invocations.insert("App".to_string(), vec![invocation]);

      let h = harness(planner, &[("App", &[])], dry_run);
      assert!(h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));
      h.formatter.events()
    };

    let dry_temp = TempDir::new().unwrap();
    let wet_temp = TempDir::new().unwrap();
    let dry = build(true, &dry_temp);
    let wet = build(false, &wet_temp);

    // Event kinds must match one-for-one; paths differ per temp dir.
    let kinds = |events: &[String]| -> Vec<String> {
      events
        .iter()
        .map(|event| event.split_whitespace().next().unwrap_or_default().to_string())
        .collect()
    };
    assert_eq!(kinds(&dry), kinds(&wet));
  }

  #[cfg(unix)]
  #[test]
  fn child_receives_only_the_invocation_environment() {
    let temp = TempDir::new().unwrap();
    let capture = temp.path().join("env.txt");

    let (sh, args) = shell_cmd(&format!("echo \"$MARKER\" > {}", capture.display()));
    let mut invocation = command_invocation(sh, args);
    invocation.environment.insert("MARKER".to_string(), "from-invocation".to_string());

    let mut planner = StaticPlanner::default();
    planner.invocations.insert("App".to_string(), vec![invocation]);

    let h = harness(planner, &[("App", &[])], false);
    assert!(h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));

    let contents = std::fs::read_to_string(&capture).unwrap();
    assert_eq!(contents.trim(), "from-invocation");
  }

  #[cfg(unix)]
  #[test]
  fn output_parent_directories_exist_before_the_tool_runs() {
    let temp = TempDir::new().unwrap();
    let nested = temp.path().join("deep/nested/out.txt");

    let (sh, args) = shell_cmd(&format!("echo data > {}", nested.display()));
    let mut invocation = command_invocation(sh, args);
    invocation.outputs = vec![nested.display().to_string()];

    let mut planner = StaticPlanner::default();
    planner.invocations.insert("App".to_string(), vec![invocation]);

    let h = harness(planner, &[("App", &[])], false);
    assert!(h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));
    assert_eq!(std::fs::read_to_string(&nested).unwrap().trim(), "data");
  }

  #[test]
  fn target_cycle_fails_without_events() {
    let h = harness(StaticPlanner::default(), &[("A", &["B"]), ("B", &["A"])], false);
    assert!(!h.executor.build(&BuildEnvironment::default(), &h.context, &h.graph));

    let events = h.formatter.events();
    assert_eq!(events, vec!["begin"]);
  }
}
