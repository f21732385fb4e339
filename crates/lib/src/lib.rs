//! xbuild-lib: core build execution for xbuild.
//!
//! This crate turns a resolved set of target build descriptions into an
//! ordered sequence of executed tool invocations:
//!
//! - [`graph`]: directed graph with deterministic topological ordering,
//!   used over targets and over invocations.
//! - [`invocation`]: the value type describing one tool invocation.
//! - [`schedule`]: infers the invocation order within a target from
//!   declared inputs and outputs.
//! - [`materialize`]: creates directories and writes embedded auxiliary
//!   files before any tool runs.
//! - [`builtin`]: in-process tools dispatched by a `builtin-` executable
//!   name prefix.
//! - [`executor`]: walks targets in dependency order and runs their
//!   invocations, one at a time.
//! - [`formatter`]: the progress-event protocol and the default
//!   Xcode-style text output.
//!
//! Project parsing, build-setting evaluation, and toolchain discovery are
//! collaborators behind the seams in [`target`]; this crate only performs
//! the filesystem side effects and child-process executions a build
//! demands.

pub mod builtin;
pub mod executor;
pub mod formatter;
pub mod graph;
pub mod invocation;
pub mod materialize;
pub mod schedule;
pub mod target;

#[cfg(test)]
pub mod test_util;
