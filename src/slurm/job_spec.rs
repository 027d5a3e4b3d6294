use crate::error::JobError;

/// A single training job, as the caller wants it submitted
///
/// Directive and setup lines are opaque: they're copied into the job script verbatim and never
/// parsed. The same goes for `command_line`, which is the full invocation of the training program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    name: String,
    is_debug: bool,
    resource_requests: Vec<String>,
    environment_setup: Vec<String>,
    command_line: String,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, command_line: impl Into<String>) -> JobSpec {
        JobSpec {
            name: name.into(),
            is_debug: false,
            resource_requests: Vec::new(),
            environment_setup: Vec::new(),
            command_line: command_line.into(),
        }
    }

    /// Debug jobs get the short smoke test time limit
    pub fn debug(self, is_debug: bool) -> JobSpec {
        JobSpec { is_debug, ..self }
    }

    /// Append `#SBATCH` directives, e.g. `--gres=gpu:1`
    pub fn resource_requests<I, S>(mut self, requests: I) -> JobSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_requests.extend(requests.into_iter().map(Into::into));
        self
    }

    /// Append shell lines that run before the command (module loads, conda activate)
    pub fn environment_setup<I, S>(mut self, lines: I) -> JobSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environment_setup.extend(lines.into_iter().map(Into::into));
        self
    }

    /// Name an iterative retraining run: `study` becomes `study_iter2`
    ///
    /// An empty name stays empty so that `validate` still rejects it.
    pub fn iteration(self, n: u32) -> JobSpec {
        if self.name.is_empty() {
            return self;
        }
        let name = format!("{}_iter{}", self.name, n);
        JobSpec { name, ..self }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_debug(&self) -> bool {
        self.is_debug
    }

    pub fn resource_request_lines(&self) -> &[String] {
        &self.resource_requests
    }

    pub fn environment_setup_lines(&self) -> &[String] {
        &self.environment_setup
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Check the job name is safe to use as a SLURM job name and inside a file name
    ///
    /// Only ASCII letters, digits, `.`, `_` and `-` are allowed, and `.` or `..` on their own are
    /// rejected because the name becomes part of the log path.
    pub fn validate(&self) -> Result<(), JobError> {
        let name = self.name.as_str();
        if name.is_empty() {
            return Err(JobError::InvalidJobSpec("job name is empty".to_string()));
        }
        if name == "." || name == ".." {
            return Err(JobError::InvalidJobSpec(format!("job name {name:?} is a relative path")));
        }
        if let Some(bad) = name.chars().find(|c| !is_name_char(*c)) {
            return Err(JobError::InvalidJobSpec(format!(
                "job name {name:?} contains unsupported character {bad:?}"
            )));
        }
        Ok(())
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}
