//! Render SLURM batch scripts for training jobs and submit them with sbatch

pub mod error;
pub mod policy;
pub mod request;
pub mod slurm;

pub use error::JobError;
pub use policy::CleanupPolicy;
pub use slurm::job::{RenderOptions, RenderedScript, Renderer, TimeLimits};
pub use slurm::job_spec::JobSpec;
pub use slurm::submit::{Cleanup, DispatchReport, Dispatcher, Receipt, Sbatch, Submitter};
pub use slurm::{render_all, submit_all, submit_job};
