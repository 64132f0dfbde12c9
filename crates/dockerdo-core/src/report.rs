//! User-facing output sink.
//!
//! Everything dockerdo tells the user goes through a [`Reporter`] so that
//! actions can be exercised in tests without a terminal. Diagnostics for
//! developers go through `tracing` instead.

use std::cell::RefCell;

use colored::Colorize;

use crate::ContainerState;

/// Format an action line: `(+) [scope]       verb text`.
pub fn format_action(scope: &str, verb: &str, text: &str) -> String {
    format!("(+) [{scope}] {verb:>10} {text}")
}

/// Bullet for a task status: `RUNNING`, `OK`, `WARN` or `FAIL`.
pub fn format_bullet(status: &str) -> &'static str {
    match status {
        "RUNNING" => "(/)",
        "OK" => "(+)",
        "WARN" | "FAIL" => "(!)",
        _ => "",
    }
}

/// Sink for user-facing messages.
pub trait Reporter {
    /// Something was changed: `scope` is `local`, `remote` or `container`.
    fn action(&self, scope: &str, verb: &str, text: &str);

    /// Informational message.
    fn info(&self, text: &str);

    /// Non-fatal problem.
    fn warning(&self, text: &str);

    /// Fatal problem.
    fn error(&self, text: &str);

    /// A command line about to be executed (verbose / dry-run echo).
    fn command(&self, line: &str);

    /// Primary program output, meant for stdout and pipes.
    fn output(&self, text: &str);

    /// Summary line for the container lifecycle state.
    fn container_status(&self, state: ContainerState) {
        self.info(&format!("Container state: {state}"));
    }
}

/// Reporter writing styled messages to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalReporter;

impl Reporter for TerminalReporter {
    fn action(&self, scope: &str, verb: &str, text: &str) {
        eprintln!(
            "{} {} {}",
            "(+)".green().bold(),
            format!("[{scope}] {verb:>10}").green().bold(),
            text
        );
    }

    fn info(&self, text: &str) {
        eprintln!("{} {}", "(i)".blue().bold(), text);
    }

    fn warning(&self, text: &str) {
        eprintln!("{} {}", "(!)".yellow().bold(), text.bold());
    }

    fn error(&self, text: &str) {
        eprintln!("{} {}", "(!)".red().bold(), text.bold());
    }

    fn command(&self, line: &str) {
        eprintln!("{}", format!("+ {line}").dimmed());
    }

    fn output(&self, text: &str) {
        println!("{text}");
    }

    fn container_status(&self, state: ContainerState) {
        let label = match state {
            ContainerState::Running => state.as_str().green().bold(),
            ContainerState::Stopped => state.as_str().yellow().bold(),
            ContainerState::Nothing => state.as_str().dimmed(),
        };
        eprintln!("{} Container state: {}", "(i)".blue().bold(), label);
    }
}

/// One message captured by [`MemoryReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// From [`Reporter::action`]
    Action(String),
    /// From [`Reporter::info`]
    Info(String),
    /// From [`Reporter::warning`]
    Warning(String),
    /// From [`Reporter::error`]
    Error(String),
    /// From [`Reporter::command`]
    Command(String),
    /// From [`Reporter::output`]
    Output(String),
}

/// Reporter that keeps messages in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    reports: RefCell<Vec<Report>>,
}

impl MemoryReporter {
    /// Create an empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages so far.
    pub fn reports(&self) -> Vec<Report> {
        self.reports.borrow().clone()
    }

    /// Warning messages so far.
    pub fn warnings(&self) -> Vec<String> {
        self.collect(|r| match r {
            Report::Warning(text) => Some(text.clone()),
            _ => None,
        })
    }

    /// Error messages so far.
    pub fn errors(&self) -> Vec<String> {
        self.collect(|r| match r {
            Report::Error(text) => Some(text.clone()),
            _ => None,
        })
    }

    /// Echoed command lines so far.
    pub fn commands(&self) -> Vec<String> {
        self.collect(|r| match r {
            Report::Command(line) => Some(line.clone()),
            _ => None,
        })
    }

    /// Stdout output so far.
    pub fn outputs(&self) -> Vec<String> {
        self.collect(|r| match r {
            Report::Output(text) => Some(text.clone()),
            _ => None,
        })
    }

    fn collect(&self, f: impl Fn(&Report) -> Option<String>) -> Vec<String> {
        self.reports.borrow().iter().filter_map(f).collect()
    }

    fn push(&self, report: Report) {
        self.reports.borrow_mut().push(report);
    }
}

impl Reporter for MemoryReporter {
    fn action(&self, scope: &str, verb: &str, text: &str) {
        self.push(Report::Action(format_action(scope, verb, text)));
    }

    fn info(&self, text: &str) {
        self.push(Report::Info(text.to_string()));
    }

    fn warning(&self, text: &str) {
        self.push(Report::Warning(text.to_string()));
    }

    fn error(&self, text: &str) {
        self.push(Report::Error(text.to_string()));
    }

    fn command(&self, line: &str) {
        self.push(Report::Command(line.to_string()));
    }

    fn output(&self, text: &str) {
        self.push(Report::Output(text.to_string()));
    }
}
