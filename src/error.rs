use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong between a JobSpec and a queued SLURM job
///
/// `InvalidJobSpec` and `FileWriteFailure` stop a submission before any process is started.
/// `SubmissionCommandFailure` and `CleanupFailure` are reported after the fact and never undo
/// an earlier step.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid job spec: {0}")]
    InvalidJobSpec(String),
    #[error("can't render job script: {0}")]
    Template(#[from] tinytemplate::error::Error),
    #[error("can't write job script {}: {source}", path.display())]
    FileWriteFailure { path: PathBuf, source: io::Error },
    #[error("submission of {} failed: {reason}", path.display())]
    SubmissionCommandFailure { path: PathBuf, reason: String },
    #[error("can't remove job script {}: {source}", path.display())]
    CleanupFailure { path: PathBuf, source: io::Error },
}
