use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use crate::policy::CleanupPolicy;
use crate::request::document::Document;
use crate::request::schema::profile_schema;
use crate::request::RequestError;
use crate::slurm::job::{RenderOptions, TimeLimits};

/// Everything about a cluster that job scripts need but the training jobs don't care about
///
/// A profile is read from JSON, e.g.:
///
/// ```json
/// {
///   "time_limits": { "debug": "00:29:59", "production": "11:59:59" },
///   "resource_requests": ["--gres=gpu:1", "--mem-per-cpu=8G"],
///   "environment_setup": ["source ~/.bashrc", "conda activate gqp"]
/// }
/// ```
///
/// Missing fields fall back to the defaults. Resource requests and environment setup lines are
/// added to every job, before any job specific lines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub interpreter: String,
    pub log_dir: String,
    pub time_limits: ProfileTimeLimits,
    pub resource_requests: Vec<String>,
    pub environment_setup: Vec<String>,
    pub submit_command: String,
    pub script_dir: PathBuf,
    pub cleanup: CleanupPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProfileTimeLimits {
    pub debug: String,
    pub production: String,
}

impl Default for ProfileTimeLimits {
    fn default() -> Self {
        let limits = TimeLimits::default();
        ProfileTimeLimits { debug: limits.debug, production: limits.production }
    }
}

impl Default for Profile {
    fn default() -> Self {
        let options = RenderOptions::default();
        Profile {
            interpreter: options.interpreter,
            log_dir: options.log_dir,
            time_limits: ProfileTimeLimits::default(),
            resource_requests: Vec::new(),
            environment_setup: Vec::new(),
            submit_command: "sbatch".to_string(),
            script_dir: PathBuf::from("."),
            cleanup: CleanupPolicy::default(),
        }
    }
}

impl Profile {
    pub fn read(path: &Path) -> Result<Profile, RequestError> {
        info!("Loading cluster profile {}", path.display());
        let document = Document { path: path.to_path_buf(), compiled_schema: profile_schema()? };
        document.read::<Profile>()
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            interpreter: self.interpreter.clone(),
            log_dir: self.log_dir.clone(),
            time_limits: TimeLimits {
                debug: self.time_limits.debug.clone(),
                production: self.time_limits.production.clone(),
            },
        }
    }
}
