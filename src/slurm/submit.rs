//! Write rendered job scripts to disk, hand them to sbatch, and clean up afterwards
//!
//! Every dispatch is one blocking write → submit → remove sequence on the calling thread. Script
//! paths are unique per call so concurrent or back-to-back dispatches never share a file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use log::{info, warn};

use crate::error::JobError;
use crate::policy::CleanupPolicy;
use crate::slurm::job::RenderedScript;

/// What sbatch said after accepting a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// SLURM job id, if it could be read from stdout
    pub job_id: Option<String>,
    pub stdout: String,
}

impl Receipt {
    pub fn from_stdout(stdout: String) -> Receipt {
        let job_id = parse_job_id(&stdout);
        Receipt { job_id, stdout }
    }
}

/// Read the job id from `Submitted batch job 123` or `--parsable` output (`123` or `123;cluster`)
fn parse_job_id(stdout: &str) -> Option<String> {
    let last = stdout.split_whitespace().last()?;
    let id = last.split(';').next()?;
    match !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        true => Some(id.to_string()),
        false => None,
    }
}

/// Something that queues a job script with the scheduler
pub trait Submitter {
    fn submit(&self, script: &Path) -> Result<Receipt, JobError>;
}

/// Submit job scripts by running sbatch with the script path as its only argument
#[derive(Debug, Clone)]
pub struct Sbatch {
    program: PathBuf,
}

impl Sbatch {
    pub fn new(program: impl Into<PathBuf>) -> Sbatch {
        Sbatch { program: program.into() }
    }
}

impl Default for Sbatch {
    fn default() -> Self {
        Sbatch::new("sbatch")
    }
}

impl Submitter for Sbatch {
    fn submit(&self, script: &Path) -> Result<Receipt, JobError> {
        let mut sbatch = Command::new(&self.program);
        let cmd = sbatch.arg(script);
        info!("Running sbatch process");
        info!("{:?}", &cmd);

        let output = cmd.output().map_err(|err| JobError::SubmissionCommandFailure {
            path: script.to_path_buf(),
            reason: format!("can't run {}: {}", self.program.display(), err),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(JobError::SubmissionCommandFailure {
                path: script.to_path_buf(),
                reason: format!("{} {}", describe_status(&self.program, output.status), stderr.trim()),
            });
        }

        Ok(Receipt::from_stdout(String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}

fn describe_status(program: &Path, status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("{} exited with code {}", program.display(), code),
        None => match signal(status) {
            Some(signal) => format!("{} was terminated by signal {}", program.display(), signal),
            None => format!("{} was terminated by an unknown signal", program.display()),
        },
    }
}

#[cfg(unix)]
fn signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal(_status: ExitStatus) -> Option<i32> {
    None
}

/// What happened to the job script after submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    Removed,
    Kept,
}

/// The outcome of one dispatch
///
/// Only a failed write stops a dispatch early. A failed submission or a failed removal is
/// recorded here instead, and neither one undoes what came before it.
#[derive(Debug)]
pub struct DispatchReport {
    pub script_path: PathBuf,
    pub submission: Result<Receipt, JobError>,
    pub cleanup: Result<Cleanup, JobError>,
}

impl DispatchReport {
    /// Collapse the report into the submission result, logging a cleanup failure on the way
    pub fn into_result(self) -> Result<Receipt, JobError> {
        if let Err(err) = &self.cleanup {
            warn!("{}", err);
        }
        self.submission
    }
}

/// Turns rendered scripts into queued jobs
pub struct Dispatcher<S: Submitter> {
    submitter: S,
    script_dir: PathBuf,
    cleanup: CleanupPolicy,
}

/// Distinguishes script paths generated in the same process during the same microsecond
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

impl<S: Submitter> Dispatcher<S> {
    pub fn new(submitter: S, script_dir: impl Into<PathBuf>, cleanup: CleanupPolicy) -> Dispatcher<S> {
        Dispatcher { submitter, script_dir: script_dir.into(), cleanup }
    }

    /// Dispatch to a freshly generated path in the script directory
    pub fn dispatch(&self, script: &RenderedScript) -> Result<DispatchReport, JobError> {
        let path = self.unique_path(script.name());
        self.dispatch_to(script, &path)
    }

    /// Dispatch to a caller chosen path, overwriting anything already there
    pub fn dispatch_to(&self, script: &RenderedScript, path: &Path) -> Result<DispatchReport, JobError> {
        write_script(script, path)?;

        info!("Submitting job {} from {}", script.name(), path.display());
        let submission = self.submitter.submit(path);
        match &submission {
            Ok(receipt) => match &receipt.job_id {
                Some(id) => info!("SLURM job id: {id}"),
                None => info!("Submitted {}, no job id in output: {}", script.name(), receipt.stdout.trim()),
            },
            Err(err) => warn!("{}", err),
        }

        let cleanup = self.clean_up(path, submission.is_ok());
        Ok(DispatchReport { script_path: path.to_path_buf(), submission, cleanup })
    }

    fn clean_up(&self, path: &Path, submitted: bool) -> Result<Cleanup, JobError> {
        if !self.cleanup.should_remove(submitted) {
            info!("Keeping job script {} (cleanup policy: {})", path.display(), self.cleanup);
            return Ok(Cleanup::Kept);
        }

        info!("Removing job script {}", path.display());
        match fs::remove_file(path) {
            Ok(()) => Ok(Cleanup::Removed),
            Err(source) => {
                let err = JobError::CleanupFailure { path: path.to_path_buf(), source };
                warn!("{}", err);
                Err(err)
            }
        }
    }

    fn unique_path(&self, name: &str) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%6f");
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let file_name = format!("_{}.{}.{}.{}.slurm", name, stamp, std::process::id(), seq);
        self.script_dir.join(file_name)
    }
}

/// Write the whole script, truncating any existing file; the file is closed before returning
fn write_script(script: &RenderedScript, path: &Path) -> Result<(), JobError> {
    write_with(path, |file| {
        file.write_all(script.text().as_bytes())?;
        file.flush()
    })
}

/// Open `path` for writing and hand it to `write`
///
/// A partly written file is removed again, so a failed write never leaves a script behind.
fn write_with<F>(path: &Path, write: F) -> Result<(), JobError>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    info!("Writing job script to {}", path.display());
    let to_error = |source: io::Error| JobError::FileWriteFailure { path: path.to_path_buf(), source };

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(to_error)?;

    let written = write(&mut file);
    drop(file);

    if let Err(source) = written {
        if let Err(err) = fs::remove_file(path) {
            warn!("Can't remove partly written job script {}: {}", path.display(), err);
        }
        return Err(to_error(source));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use tempfile::tempdir;

    use super::*;
    use crate::slurm::job::{RenderOptions, Renderer};
    use crate::slurm::job_spec::JobSpec;

    /// Records every submission along with the script contents seen at that moment
    struct Recorder {
        calls: RefCell<Vec<(PathBuf, String)>>,
        fail: bool,
    }

    impl Recorder {
        fn new(fail: bool) -> Recorder {
            Recorder { calls: RefCell::new(Vec::new()), fail }
        }
    }

    impl Submitter for Recorder {
        fn submit(&self, script: &Path) -> Result<Receipt, JobError> {
            let contents = fs::read_to_string(script).unwrap_or_default();
            self.calls.borrow_mut().push((script.to_path_buf(), contents));
            match self.fail {
                true => Err(JobError::SubmissionCommandFailure {
                    path: script.to_path_buf(),
                    reason: "queue is closed".to_string(),
                }),
                false => Ok(Receipt::from_stdout("Submitted batch job 4242\n".to_string())),
            }
        }
    }

    fn rendered(name: &str) -> RenderedScript {
        let renderer = Renderer::new(RenderOptions::default()).expect("Template");
        renderer.render(&JobSpec::new(name, "python train.py")).expect("Rendered")
    }

    #[test]
    fn submits_once_and_removes_script() {
        let tmp = tempdir().unwrap();
        let dispatcher = Dispatcher::new(Recorder::new(false), tmp.path(), CleanupPolicy::Always);
        let script = rendered("qso1");

        let report = dispatcher.dispatch(&script).unwrap();

        let calls = dispatcher.submitter.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, report.script_path);
        assert_eq!(calls[0].1, script.text());
        assert!(!report.script_path.exists());
        assert!(matches!(report.cleanup, Ok(Cleanup::Removed)));
        assert_eq!(report.into_result().unwrap().job_id.as_deref(), Some("4242"));
    }

    #[test]
    fn caller_path_is_overwritten() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("_train.slurm");
        fs::write(&path, "stale contents that are much longer than the new script ......................").unwrap();
        let dispatcher = Dispatcher::new(Recorder::new(false), tmp.path(), CleanupPolicy::Always);
        let script = rendered("qso1");

        let report = dispatcher.dispatch_to(&script, &path).unwrap();

        assert_eq!(report.script_path, path);
        assert_eq!(dispatcher.submitter.calls.borrow()[0].1, script.text());
        assert!(!path.exists());
    }

    #[test]
    fn generated_paths_are_unique() {
        let tmp = tempdir().unwrap();
        let dispatcher = Dispatcher::new(Recorder::new(false), tmp.path(), CleanupPolicy::Always);
        let script = rendered("qso1");

        dispatcher.dispatch(&script).unwrap();
        dispatcher.dispatch(&script).unwrap();

        let calls = dispatcher.submitter.calls.borrow();
        assert_ne!(calls[0].0, calls[1].0);
        for (path, _) in calls.iter() {
            assert_eq!(path.parent(), Some(tmp.path()));
            let file_name = path.file_name().unwrap().to_str().unwrap();
            assert!(file_name.starts_with("_qso1."));
            assert!(file_name.ends_with(".slurm"));
        }
    }

    #[test]
    fn failed_submission_is_reported_and_cleaned_up() {
        let tmp = tempdir().unwrap();
        let dispatcher = Dispatcher::new(Recorder::new(true), tmp.path(), CleanupPolicy::Always);

        let report = dispatcher.dispatch(&rendered("qso1")).unwrap();

        assert!(matches!(report.submission, Err(JobError::SubmissionCommandFailure { .. })));
        assert!(!report.script_path.exists());
        assert!(report.into_result().is_err());
    }

    #[test]
    fn keep_on_failure_preserves_failed_script() {
        let tmp = tempdir().unwrap();
        let dispatcher = Dispatcher::new(Recorder::new(true), tmp.path(), CleanupPolicy::KeepOnFailure);
        let script = rendered("qso1");

        let report = dispatcher.dispatch(&script).unwrap();

        assert!(matches!(report.cleanup, Ok(Cleanup::Kept)));
        assert_eq!(fs::read_to_string(&report.script_path).unwrap(), script.text());
    }

    #[test]
    fn keep_on_failure_still_removes_submitted_script() {
        let tmp = tempdir().unwrap();
        let dispatcher = Dispatcher::new(Recorder::new(false), tmp.path(), CleanupPolicy::KeepOnFailure);

        let report = dispatcher.dispatch(&rendered("qso1")).unwrap();

        assert!(matches!(report.cleanup, Ok(Cleanup::Removed)));
        assert!(!report.script_path.exists());
    }

    #[test]
    fn unwritable_directory_stops_before_submission() {
        let tmp = tempdir().unwrap();
        let missing = tmp.path().join("does-not-exist");
        let dispatcher = Dispatcher::new(Recorder::new(false), &missing, CleanupPolicy::Always);

        let result = dispatcher.dispatch(&rendered("qso1"));

        assert!(matches!(result, Err(JobError::FileWriteFailure { .. })));
        assert!(dispatcher.submitter.calls.borrow().is_empty());
    }

    #[test]
    fn cleanup_failure_does_not_undo_submission() {
        /// Deletes the script itself, so the dispatcher's removal fails
        struct Eager;
        impl Submitter for Eager {
            fn submit(&self, script: &Path) -> Result<Receipt, JobError> {
                fs::remove_file(script).unwrap();
                Ok(Receipt::from_stdout("123".to_string()))
            }
        }

        let tmp = tempdir().unwrap();
        let dispatcher = Dispatcher::new(Eager, tmp.path(), CleanupPolicy::Always);

        let report = dispatcher.dispatch(&rendered("qso1")).unwrap();

        assert!(matches!(report.cleanup, Err(JobError::CleanupFailure { .. })));
        assert_eq!(report.into_result().unwrap().job_id.as_deref(), Some("123"));
    }

    #[test]
    fn job_ids_are_read_from_sbatch_output() {
        assert_eq!(parse_job_id("Submitted batch job 1234\n").as_deref(), Some("1234"));
        assert_eq!(parse_job_id("5678;perlmutter\n").as_deref(), Some("5678"));
        assert_eq!(parse_job_id("").as_deref(), None);
        assert_eq!(parse_job_id("sbatch: queued").as_deref(), None);
    }

    #[test]
    fn failed_write_leaves_no_script_behind() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("_qso1.slurm");

        let result = write_with(&path, |file| {
            file.write_all(b"#!/bin/bash\n#SBATCH -J qso1\n")?;
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        });

        assert!(matches!(result, Err(JobError::FileWriteFailure { .. })));
        assert!(!path.exists());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_write_over_existing_script_removes_it() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("_train.slurm");
        fs::write(&path, "#!/bin/bash\n").unwrap();

        let result = write_with(&path, |_| Err(io::Error::new(io::ErrorKind::Other, "disk full")));

        assert!(matches!(result, Err(JobError::FileWriteFailure { .. })));
        assert!(!path.exists());
    }
}

#[cfg(all(test, unix))]
mod process_tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn sbatch_passes_script_path_as_only_argument() {
        let tmp = tempdir().unwrap();
        let fake = tmp.path().join("fake-sbatch");
        fs::write(
            &fake,
            "#!/bin/sh\necho \"$#\" > \"$0.args\"\necho \"$1\" >> \"$0.args\"\necho \"Submitted batch job 7\"\n",
        )
        .unwrap();
        fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).unwrap();
        let job = tmp.path().join("_qso1.slurm");
        fs::write(&job, "#!/bin/bash\n").unwrap();

        let receipt = Sbatch::new(&fake).submit(&job).unwrap();

        let args = fs::read_to_string(tmp.path().join("fake-sbatch.args")).unwrap();
        let lines: Vec<&str> = args.lines().collect();
        assert_eq!(lines, vec!["1", job.to_str().unwrap()]);
        assert_eq!(receipt.job_id.as_deref(), Some("7"));
    }

    #[test]
    fn sbatch_success_is_a_receipt() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("job.slurm");
        fs::write(&path, "#!/bin/bash\n").unwrap();

        let receipt = Sbatch::new("true").submit(&path).unwrap();

        assert_eq!(receipt.job_id, None);
    }

    #[test]
    fn sbatch_exit_status_is_checked() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("job.slurm");
        fs::write(&path, "#!/bin/bash\n").unwrap();

        let err = Sbatch::new("false").submit(&path).unwrap_err();

        assert!(err.to_string().contains("exited with code 1"), "{err}");
    }

    #[test]
    fn missing_sbatch_is_a_submission_failure() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("job.slurm");

        let result = Sbatch::new(tmp.path().join("no-such-sbatch")).submit(&path);

        assert!(matches!(result, Err(JobError::SubmissionCommandFailure { .. })));
    }
}
