#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("{program} not found on PATH")]
    NotFound {
        program: String,
        source: std::io::Error,
    },

    #[error("failed to start {program}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("failed waiting for {program}")]
    Wait {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} was cancelled")]
    Cancelled { program: String },
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// Exit code; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stderr followed by stdout, for failure classification.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stderr, self.stdout)
    }

    /// Last non-empty line of stderr (or stdout), for error messages.
    pub fn summary(&self) -> String {
        let last_line = |text: &str| {
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .last()
                .map(str::to_owned)
        };
        last_line(&self.stderr)
            .or_else(|| last_line(&self.stdout))
            // arch-lint: allow(no-silent-result-drop) reason="a process that printed nothing still needs a summary"
            .unwrap_or_else(|| "no output".to_owned())
    }
}

/// Whether a program can be found on PATH.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Availability {
    pub available: bool,
    pub path: Option<std::path::PathBuf>,
}
