use log::info;
use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

use crate::error::JobError;
use crate::slurm::job_spec::JobSpec;

/// included job script template
static JOB: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/job.txt"));

/// SLURM walltimes, written as `HH:MM:SS`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeLimits {
    /// Short allocation for smoke testing a training run
    pub debug: String,
    /// Long allocation for a full training run
    pub production: String,
}

impl Default for TimeLimits {
    fn default() -> Self {
        TimeLimits { debug: "00:29:59".to_string(), production: "11:59:59".to_string() }
    }
}

/// Cluster specific parts of the job script that don't change between jobs
///
/// The log directory is relative to the directory `sbatch` is run from and must already exist:
/// SLURM won't create it, and neither does the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub interpreter: String,
    pub log_dir: String,
    pub time_limits: TimeLimits,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            interpreter: "/bin/bash".to_string(),
            log_dir: "o".to_string(),
            time_limits: TimeLimits::default(),
        }
    }
}

/// A complete job script with the (validated) name of the job it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedScript {
    name: String,
    text: String,
}

impl RenderedScript {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Rendering context for the job script
#[derive(Serialize)]
struct JobContext<'a> {
    interpreter: &'a str,
    name: &'a str,
    time_limit: &'a str,
    resource_requests: &'a [String],
    log_dir: &'a str,
    environment_setup: &'a [String],
    command_line: &'a str,
}

/// Turns a JobSpec into the text of an sbatch script
///
/// The script is laid out as:
/// - interpreter line
/// - `#SBATCH` header: job name, time limit, resource requests, output log
/// - start time echo
/// - environment setup lines
/// - the training command
/// - end time echo
///
/// Rendering has no side effects. Timestamps are produced by the shell when the job runs.
pub struct Renderer {
    tt: TinyTemplate<'static>,
    options: RenderOptions,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Result<Renderer, JobError> {
        let mut tt = TinyTemplate::new();
        // directives and shell lines must come out exactly as written, so no HTML escaping
        tt.set_default_formatter(&format_unescaped);
        tt.add_template("job", JOB)?;
        Ok(Renderer { tt, options })
    }

    pub fn render(&self, spec: &JobSpec) -> Result<RenderedScript, JobError> {
        spec.validate()?;

        let limits = &self.options.time_limits;
        let time_limit = match spec.is_debug() {
            true => limits.debug.as_str(),
            false => limits.production.as_str(),
        };
        info!("Rendering job {} with time limit {}", spec.name(), time_limit);

        let context = JobContext {
            interpreter: &self.options.interpreter,
            name: spec.name(),
            time_limit,
            resource_requests: spec.resource_request_lines(),
            log_dir: &self.options.log_dir,
            environment_setup: spec.environment_setup_lines(),
            command_line: spec.command_line(),
        };

        let text = self.tt.render("job", &context)?;
        Ok(RenderedScript { name: spec.name().to_string(), text })
    }
}
