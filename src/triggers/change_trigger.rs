use log::debug;
use serde::Serialize;

use super::pattern::PatternMatcher;

/// Rule deciding whether a changed file should cause a pipeline to run.
///
/// `include` patterns select files; `all_except` patterns carve out an
/// exclusion zone. When both are present, `include` acts as an exception to
/// the exclusion zone:
///
/// | include | all_except | matches when                                   |
/// |---------|------------|------------------------------------------------|
/// | set     | empty      | any include pattern matches                    |
/// | empty   | set        | no all_except pattern matches                  |
/// | set     | set        | any include matches, else no all_except match  |
/// | empty   | empty      | always                                         |
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeTrigger {
    pub include: Vec<String>,
    pub all_except: Vec<String>,
}

impl ChangeTrigger {
    pub fn new(include: Vec<String>, all_except: Vec<String>) -> Self {
        Self {
            include,
            all_except,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.all_except.is_empty()
    }

    pub fn matches(&self, file_path: &str) -> bool {
        self.matches_with(&PatternMatcher::default(), file_path)
    }

    pub fn matches_with(&self, matcher: &PatternMatcher, file_path: &str) -> bool {
        let included = || {
            self.include
                .iter()
                .find(|pattern| matcher.matches(file_path, pattern))
                .inspect(|pattern| debug!("{file_path} matched include pattern '{pattern}'"))
                .is_some()
        };
        let excluded = || {
            self.all_except
                .iter()
                .find(|pattern| matcher.matches(file_path, pattern))
                .inspect(|pattern| debug!("{file_path} excluded by pattern '{pattern}'"))
                .is_some()
        };

        match (self.include.is_empty(), self.all_except.is_empty()) {
            (false, true) => included(),
            (true, false) => !excluded(),
            (false, false) => included() || !excluded(),
            (true, true) => true,
        }
    }
}
