//! Render SLURM job scripts and submit them

use log::{info, warn};

use crate::error::JobError;

/// A single training job, built by the caller
pub mod job_spec;

/// Render job specs into sbatch scripts using the bundled template
pub mod job;

/// Write scripts to disk, run sbatch, and remove them again
pub mod submit;

use job::{RenderedScript, Renderer};
use job_spec::JobSpec;
use submit::{DispatchReport, Dispatcher, Submitter};

/// Render a job and dispatch it
///
/// An invalid spec fails here, before anything touches the filesystem.
pub fn submit_job<S: Submitter>(
    renderer: &Renderer,
    dispatcher: &Dispatcher<S>,
    spec: &JobSpec,
) -> Result<DispatchReport, JobError> {
    let script = renderer.render(spec)?;
    dispatcher.dispatch(&script)
}

/// Render every job without writing or submitting anything, for dry runs
pub fn render_all(renderer: &Renderer, specs: &[JobSpec]) -> Result<Vec<RenderedScript>, JobError> {
    specs.iter().map(|spec| renderer.render(spec)).collect()
}

/// Submit jobs one after another and return how many failed
///
/// A job counts as failed if it doesn't render, its script can't be written, or sbatch rejects
/// it. Each job's write, submit and cleanup finish before the next job starts, and a failure
/// doesn't stop the jobs after it.
pub fn submit_all<S: Submitter>(renderer: &Renderer, dispatcher: &Dispatcher<S>, specs: &[JobSpec]) -> usize {
    let mut failed = 0;
    for spec in specs {
        match submit_job(renderer, dispatcher, spec).and_then(|report| report.into_result()) {
            Ok(_) => info!("Job {} submitted", spec.name()),
            Err(err) => {
                warn!("Job {} wasn't submitted: {}", spec.name(), err);
                failed += 1;
            }
        }
    }
    failed
}
