use log::info;

use super::pattern::PatternMatcher;
use super::pipeline::Pipeline;

/// Selects the pipelines affected by a change set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineSelector {
    matcher: PatternMatcher,
}

impl PipelineSelector {
    pub fn new(matcher: PatternMatcher) -> Self {
        Self { matcher }
    }

    /// Returns the pipelines that should run for `changed_files`, in input order.
    ///
    /// An empty change set means the changes are unknown, so every pipeline
    /// is returned.
    pub fn get_triggered<'a, S: AsRef<str>>(
        &self,
        pipelines: &'a [Pipeline],
        changed_files: &[S],
    ) -> Vec<&'a Pipeline> {
        if changed_files.is_empty() {
            info!(
                "No changed files provided, running all {} pipelines",
                pipelines.len()
            );
            return pipelines.iter().collect();
        }

        let triggered: Vec<&Pipeline> = pipelines
            .iter()
            .filter(|pipeline| pipeline.should_trigger_with(&self.matcher, changed_files))
            .collect();

        info!(
            "{} of {} pipelines triggered by {} changed files",
            triggered.len(),
            pipelines.len(),
            changed_files.len()
        );

        triggered
    }
}

/// Filters `pipelines` with case-sensitive matching.
pub fn get_triggered<'a, S: AsRef<str>>(
    pipelines: &'a [Pipeline],
    changed_files: &[S],
) -> Vec<&'a Pipeline> {
    PipelineSelector::default().get_triggered(pipelines, changed_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triggers::ChangeTrigger;

    fn sample_pipelines() -> Vec<Pipeline> {
        vec![
            Pipeline::new("always", "ci/always.yml", vec![]),
            Pipeline::new(
                "docs",
                "ci/docs.yml",
                vec![ChangeTrigger::new(vec!["docs".to_string()], vec![])],
            ),
            Pipeline::new(
                "code",
                "ci/code.yml",
                vec![ChangeTrigger::new(vec![], vec!["docs".to_string()])],
            ),
        ]
    }

    fn names(pipelines: &[&Pipeline]) -> Vec<String> {
        pipelines.iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn test_empty_changes_fail_open() {
        let pipelines = sample_pipelines();
        let triggered = get_triggered::<&str>(&pipelines, &[]);
        assert_eq!(names(&triggered), vec!["always", "docs", "code"]);
    }

    #[test]
    fn test_filters_preserving_order() {
        let pipelines = sample_pipelines();

        let triggered = get_triggered(&pipelines, &["unrelated.txt"]);
        assert_eq!(names(&triggered), vec!["always", "code"]);

        let triggered = get_triggered(&pipelines, &["docs/intro.md"]);
        assert_eq!(names(&triggered), vec!["always", "docs"]);
    }

    #[test]
    fn test_selector_uses_configured_matcher() {
        let pipelines = sample_pipelines();
        let selector = PipelineSelector::new(PatternMatcher::new(true));
        let triggered = selector.get_triggered(&pipelines, &["DOCS/intro.md"]);
        assert_eq!(names(&triggered), vec!["always", "docs"]);
    }
}
