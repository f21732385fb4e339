//! The `build` subcommand: load a plan, run it, report the result.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use xbuild_lib::builtin::Registry;
use xbuild_lib::executor::{Executor, SimpleExecutor};
use xbuild_lib::formatter::{DefaultFormatter, Formatter};
use xbuild_lib::target::{BuildContext, BuildEnvironment};

use crate::plan::BuildPlan;

/// Exit code for configuration problems, per the driver contract.
const CONFIGURATION_ERROR: i32 = -1;

fn create_formatter(name: &str) -> Option<Arc<dyn Formatter>> {
  if name == "default" || name.is_empty() {
    // Only use color if attached to a terminal.
    let color = std::io::stdout().is_terminal();
    return Some(Arc::new(DefaultFormatter::new(color)));
  }

  None
}

fn create_executor(name: &str, formatter: Arc<dyn Formatter>, dry_run: bool) -> Option<Box<dyn Executor>> {
  if name == "simple" || name.is_empty() {
    let registry = Registry::default_registry();
    return Some(Box::new(SimpleExecutor::new(formatter, dry_run, registry)));
  }

  None
}

/// Run a build plan. Returns the process exit code.
pub fn run(plan_path: &Path, dry_run: bool, formatter_name: &str, executor_name: &str) -> i32 {
  let plan = match BuildPlan::load(plan_path) {
    Ok(plan) => plan,
    Err(err) => {
      eprintln!("error: {:#}", err);
      return CONFIGURATION_ERROR;
    }
  };

  let target_graph = plan.target_graph();
  debug!(targets = target_graph.len(), plan = %plan_path.display(), "loaded build plan");

  let Some(formatter) = create_formatter(formatter_name) else {
    eprintln!("error: unknown formatter {}", formatter_name);
    return CONFIGURATION_ERROR;
  };

  let Some(executor) = create_executor(executor_name, formatter, dry_run) else {
    eprintln!("error: unknown executor {}", executor_name);
    return CONFIGURATION_ERROR;
  };

  let build_environment = BuildEnvironment {
    working_directory: std::env::current_dir().unwrap_or_default(),
  };
  let configuration = plan.configuration.clone();
  let context = BuildContext::new("build", configuration, Box::new(plan));

  if executor.build(&build_environment, &context, &target_graph) {
    0
  } else {
    1
  }
}
