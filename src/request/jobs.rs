use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::request::document::Document;
use crate::request::profile::Profile;
use crate::request::schema::jobs_schema;
use crate::request::RequestError;
use crate::slurm::job_spec::JobSpec;

/// A job file: jobs are submitted in the order they're listed
#[derive(Debug, Deserialize)]
pub struct JobFile {
    pub jobs: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
pub struct JobEntry {
    pub name: String,
    #[serde(default)]
    pub debug: bool,
    pub iteration: Option<u32>,
    pub command_line: String,
    #[serde(default)]
    pub resource_requests: Vec<String>,
    #[serde(default)]
    pub environment_setup: Vec<String>,
}

impl JobFile {
    pub fn read(path: &Path) -> Result<JobFile, RequestError> {
        let document = Document { path: path.to_path_buf(), compiled_schema: jobs_schema()? };
        let file = document.read::<JobFile>()?;
        info!("Read {} jobs from {}", file.jobs.len(), path.display());
        Ok(file)
    }

    pub fn specs(&self, profile: &Profile) -> Vec<JobSpec> {
        self.jobs.iter().map(|entry| entry.spec(profile)).collect()
    }
}

impl JobEntry {
    /// Build a JobSpec, with profile lines before the job's own
    pub fn spec(&self, profile: &Profile) -> JobSpec {
        let spec = JobSpec::new(&self.name, &self.command_line)
            .debug(self.debug)
            .resource_requests(&profile.resource_requests)
            .resource_requests(&self.resource_requests)
            .environment_setup(&profile.environment_setup)
            .environment_setup(&self.environment_setup);

        match self.iteration {
            Some(n) => spec.iteration(n),
            None => spec,
        }
    }
}
