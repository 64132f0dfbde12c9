//! Execution mode passed explicitly into every gateway call.

/// How commands are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionContext {
    /// Echo each command line to the diagnostic sink before running it
    pub verbose: bool,
    /// Build and echo commands but never run them; every run reports exit code 0
    pub dry_run: bool,
}

impl ExecutionContext {
    /// Create a context from the global CLI flags.
    pub fn new(verbose: bool, dry_run: bool) -> Self {
        Self { verbose, dry_run }
    }

    /// Context that runs commands without echoing them.
    pub fn quiet() -> Self {
        Self::default()
    }

    /// Whether command lines are echoed. A dry run always shows what it skips.
    pub fn echoes(&self) -> bool {
        self.verbose || self.dry_run
    }
}
