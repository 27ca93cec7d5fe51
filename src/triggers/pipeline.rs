use log::debug;
use serde::Serialize;

use super::change_trigger::ChangeTrigger;
use super::pattern::PatternMatcher;

/// A named pipeline and the change triggers that decide whether it runs.
///
/// A pipeline without triggers always runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pipeline {
    /// Pipeline name, defaulting to the definition file's stem
    pub name: String,
    /// Entry point handed to the CI system when the pipeline runs
    pub entrypoint: String,
    /// Trigger rules; any trigger matching any changed file runs the pipeline
    pub triggers: Vec<ChangeTrigger>,
}

impl Pipeline {
    pub fn new(
        name: impl Into<String>,
        entrypoint: impl Into<String>,
        triggers: Vec<ChangeTrigger>,
    ) -> Self {
        Self {
            name: name.into(),
            entrypoint: entrypoint.into(),
            triggers,
        }
    }

    pub fn should_trigger<S: AsRef<str>>(&self, changed_files: &[S]) -> bool {
        self.should_trigger_with(&PatternMatcher::default(), changed_files)
    }

    pub fn should_trigger_with<S: AsRef<str>>(
        &self,
        matcher: &PatternMatcher,
        changed_files: &[S],
    ) -> bool {
        if self.triggers.is_empty() {
            debug!("Pipeline '{}' has no triggers, always runs", self.name);
            return true;
        }

        let triggered = self.triggers.iter().any(|trigger| {
            changed_files
                .iter()
                .any(|file| trigger.matches_with(matcher, file.as_ref()))
        });

        debug!(
            "Pipeline '{}' {} by {} changed files",
            self.name,
            if triggered { "triggered" } else { "not triggered" },
            changed_files.len()
        );

        triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_triggers_always_runs() {
        let pipeline = Pipeline::new("all", "ci/all.yml", vec![]);
        assert!(pipeline.should_trigger(&["whatever.txt"]));
        assert!(pipeline.should_trigger::<&str>(&[]));
    }

    #[test]
    fn test_any_trigger_any_file() {
        let pipeline = Pipeline::new(
            "backend",
            "ci/backend.yml",
            vec![
                ChangeTrigger::new(vec!["api".to_string()], vec![]),
                ChangeTrigger::new(vec!["db/**/*.sql".to_string()], vec![]),
            ],
        );

        assert!(pipeline.should_trigger(&["README.md", "db/migrations/001.sql"]));
        assert!(pipeline.should_trigger(&["api/handler.rs"]));
        assert!(!pipeline.should_trigger(&["web/index.html", "README.md"]));
    }
}
