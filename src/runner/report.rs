//! What a run did.

use crate::error::{RunError, ScriptError};
use crate::event::Frequency;
use crate::publish::PublishedResult;

use super::state::RunState;

/// Outcome of one script in the loop
#[derive(Debug)]
pub struct ScriptOutcome {
    pub script: String,
    pub result: Result<PublishedResult, ScriptError>,
}

impl ScriptOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Final record of an invocation.
#[derive(Debug)]
pub struct RunReport {
    /// `None` when the run stopped before the frequency was resolved
    pub frequency: Option<Frequency>,
    pub final_state: RunState,
    pub transitions: Vec<RunState>,
    pub scripts: Vec<ScriptOutcome>,
    /// The precondition that failed, if any
    pub error: Option<RunError>,
}

impl RunReport {
    /// 0 for success (including an empty catalog and per-script failures), 1 otherwise.
    pub fn status_code(&self) -> i32 {
        self.final_state.status_code().unwrap_or(1)
    }

    pub fn succeeded(&self) -> usize {
        self.scripts.iter().filter(|s| s.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.scripts.len() - self.succeeded()
    }

    pub fn published(&self) -> impl Iterator<Item = &PublishedResult> {
        self.scripts.iter().filter_map(|s| s.result.as_ref().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn counts_and_status() {
        let report = RunReport {
            frequency: Some(Frequency::Daily),
            final_state: RunState::Closed,
            transitions: vec![RunState::Idle, RunState::Closed],
            scripts: vec![
                ScriptOutcome {
                    script: "scripts/daily/a.sql".to_string(),
                    result: Ok(PublishedResult {
                        key: "results/daily/a/a-results_20240102_0304.csv".to_string(),
                        bytes: 12,
                    }),
                },
                ScriptOutcome {
                    script: "scripts/daily/b.sql".to_string(),
                    result: Err(ScriptError::Fetch(StorageError::Init {
                        message: "offline".to_string(),
                    })),
                },
            ],
            error: None,
        };

        assert_eq!(report.status_code(), 0);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.published().count(), 1);
    }

    #[test]
    fn unfinished_run_reports_failure() {
        let report = RunReport {
            frequency: None,
            final_state: RunState::Connected,
            transitions: vec![],
            scripts: vec![],
            error: None,
        };
        assert_eq!(report.status_code(), 1);
    }
}
