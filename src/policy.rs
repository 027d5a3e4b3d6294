use std::fmt;

use clap::ValueEnum;
use serde::Deserialize;

/// What to do with a job script after sbatch has read it
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    /// Delete the script whatever happened to the submission
    #[default]
    Always,
    /// Keep the script around for debugging if sbatch failed
    KeepOnFailure,
}

impl CleanupPolicy {
    pub fn should_remove(&self, submitted: bool) -> bool {
        match self {
            CleanupPolicy::Always => true,
            CleanupPolicy::KeepOnFailure => submitted,
        }
    }
}

impl fmt::Display for CleanupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CleanupPolicy::Always => write!(f, "always"),
            CleanupPolicy::KeepOnFailure => write!(f, "keep-on-failure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_on_failure_only_keeps_failed_scripts() {
        assert!(CleanupPolicy::Always.should_remove(false));
        assert!(CleanupPolicy::Always.should_remove(true));
        assert!(!CleanupPolicy::KeepOnFailure.should_remove(false));
        assert!(CleanupPolicy::KeepOnFailure.should_remove(true));
    }

    #[test]
    fn policy_names_match_profile_values() {
        let policy: CleanupPolicy = serde_json::from_str("\"keep-on-failure\"").expect("policy");
        assert_eq!(policy, CleanupPolicy::KeepOnFailure);
        assert_eq!(policy.to_string(), "keep-on-failure");
    }
}
