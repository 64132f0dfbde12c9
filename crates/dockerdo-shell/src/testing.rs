//! Test double for [`CommandRunner`].
//!
//! [`ScriptedRunner`] records every invocation and answers from queues, so
//! actions can be driven end to end without docker, ssh or sshfs.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;

use crate::command::Invocation;
use crate::runner::{BackgroundProcess, CommandOutput, CommandRunner};

/// Runner that records invocations and replies with scripted results.
///
/// Exit codes and outputs are consumed in order; when a queue is empty the
/// runner answers `0` and empty stdout.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    calls: RefCell<Vec<Invocation>>,
    exit_codes: RefCell<VecDeque<i32>>,
    outputs: RefCell<VecDeque<CommandOutput>>,
    launch_failure: Option<String>,
}

impl ScriptedRunner {
    /// Runner answering 0 to everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an exit code for the next [`CommandRunner::run`].
    pub fn with_exit_code(self, code: i32) -> Self {
        self.push_exit_code(code);
        self
    }

    /// Queue a result for the next [`CommandRunner::output`].
    pub fn with_output(self, output: CommandOutput) -> Self {
        self.push_output(output);
        self
    }

    /// Fail to launch any invocation of `program`.
    pub fn with_launch_failure(mut self, program: impl Into<String>) -> Self {
        self.launch_failure = Some(program.into());
        self
    }

    /// Queue an exit code after construction.
    pub fn push_exit_code(&self, code: i32) {
        self.exit_codes.borrow_mut().push_back(code);
    }

    /// Queue an output after construction.
    pub fn push_output(&self, output: CommandOutput) {
        self.outputs.borrow_mut().push_back(output);
    }

    /// Every invocation seen so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Number of invocations seen so far.
    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Invocations whose argv contains `word`.
    pub fn calls_containing(&self, word: &str) -> Vec<Invocation> {
        self.calls
            .borrow()
            .iter()
            .filter(|inv| inv.argv().iter().any(|arg| arg.contains(word)))
            .cloned()
            .collect()
    }

    /// Drop recorded invocations, keeping the queues.
    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, invocation: &Invocation) -> io::Result<()> {
        self.calls.borrow_mut().push(invocation.clone());
        match &self.launch_failure {
            Some(program) if *program == invocation.program => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{program}: not found"),
            )),
            _ => Ok(()),
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<i32> {
        self.record(invocation)?;
        Ok(self.exit_codes.borrow_mut().pop_front().unwrap_or(0))
    }

    fn output(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        self.record(invocation)?;
        Ok(self.outputs.borrow_mut().pop_front().unwrap_or_default())
    }

    fn spawn(&self, invocation: &Invocation) -> io::Result<BackgroundProcess> {
        self.record(invocation)?;
        Ok(BackgroundProcess::detached(&invocation.program))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queues_are_consumed_in_order() {
        let runner = ScriptedRunner::new().with_exit_code(3).with_exit_code(4);
        let inv = Invocation::new("true");
        assert_eq!(runner.run(&inv).unwrap(), 3);
        assert_eq!(runner.run(&inv).unwrap(), 4);
        assert_eq!(runner.run(&inv).unwrap(), 0);
        assert_eq!(runner.call_count(), 3);
    }

    #[test]
    fn test_outputs() {
        let runner = ScriptedRunner::new().with_output(CommandOutput::success("hello"));
        let inv = Invocation::new("echo");
        assert_eq!(runner.output(&inv).unwrap().stdout_text(), "hello");
        assert!(runner.output(&inv).unwrap().stdout.is_empty());
    }

    #[test]
    fn test_launch_failure_only_for_program() {
        let runner = ScriptedRunner::new().with_launch_failure("sshfs");
        assert!(runner.run(&Invocation::new("sshfs")).is_err());
        assert!(runner.run(&Invocation::new("docker")).is_ok());
        assert_eq!(runner.call_count(), 2);
    }

    #[test]
    fn test_calls_containing() {
        let runner = ScriptedRunner::new();
        runner.run(&Invocation::new("docker").arg("stop")).unwrap();
        runner.run(&Invocation::new("docker").arg("rm")).unwrap();
        assert_eq!(runner.calls_containing("stop").len(), 1);
        runner.clear_calls();
        assert_eq!(runner.call_count(), 0);
    }
}
