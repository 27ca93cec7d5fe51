use globset::GlobBuilder;
use log::debug;

/// Matches changed file paths against trigger patterns.
///
/// A pattern falls into one of three classes:
/// - Recursive: contains `**` (e.g. `src/**/*.rs`)
/// - Segment glob: contains `*`, `?` or `[` but no `**` (e.g. `docs/*.md`)
/// - Plain: anything else, matched as a directory prefix or exact path
///
/// Matching is case-sensitive unless `case_insensitive` is set, in which case
/// ASCII letters compare without regard to case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternMatcher {
    pub case_insensitive: bool,
}

/// Matches `file_path` against `pattern` with case-sensitive defaults.
pub fn matches(file_path: &str, pattern: &str) -> bool {
    PatternMatcher::default().matches(file_path, pattern)
}

impl PatternMatcher {
    pub fn new(case_insensitive: bool) -> Self {
        Self { case_insensitive }
    }

    pub fn matches(&self, file_path: &str, pattern: &str) -> bool {
        let pattern = pattern.trim_end_matches('/');

        if pattern.contains("**") {
            self.matches_recursive(file_path, pattern)
        } else if pattern.contains(['*', '?', '[']) {
            self.matches_segments(file_path, pattern)
        } else {
            self.strip_dir_prefix(file_path, pattern).is_some()
        }
    }

    fn matches_recursive(&self, file_path: &str, pattern: &str) -> bool {
        let Some((prefix, suffix)) = pattern.split_once("**") else {
            return false;
        };

        let prefix = prefix.trim_end_matches('/');
        let remaining = if prefix.is_empty() {
            file_path
        } else {
            match self.strip_dir_prefix(file_path, prefix) {
                Some(rest) => rest,
                None => return false,
            }
        };

        let suffix = suffix.trim_start_matches('/');
        if suffix.is_empty() || suffix == "*" {
            return true;
        }

        // Only the first `**` splits; the suffix is compared against the
        // trailing segments of the remaining path, one segment per component.
        let suffix_segments: Vec<&str> = suffix.split('/').collect();
        let path_segments: Vec<&str> = remaining.split('/').collect();
        if suffix_segments.len() > path_segments.len() {
            return false;
        }

        let tail = &path_segments[path_segments.len() - suffix_segments.len()..];
        suffix_segments
            .iter()
            .zip(tail)
            .all(|(pat, seg)| self.glob_segment(pat, seg))
    }

    fn matches_segments(&self, file_path: &str, pattern: &str) -> bool {
        let pattern_segments: Vec<&str> = pattern.split('/').collect();
        let path_segments: Vec<&str> = file_path.split('/').collect();

        pattern_segments.len() == path_segments.len()
            && pattern_segments
                .iter()
                .zip(&path_segments)
                .all(|(pat, seg)| self.glob_segment(pat, seg))
    }

    /// Returns the part of `file_path` below `prefix` when `file_path` is
    /// `prefix` itself (empty remainder) or lives underneath it.
    fn strip_dir_prefix<'a>(&self, file_path: &'a str, prefix: &str) -> Option<&'a str> {
        if self.text_eq(file_path, prefix) {
            return Some("");
        }

        let len = prefix.len();
        if file_path.len() > len
            && file_path.is_char_boundary(len)
            && self.text_eq(&file_path[..len], prefix)
        {
            return file_path[len..].strip_prefix('/');
        }

        None
    }

    fn text_eq(&self, a: &str, b: &str) -> bool {
        if self.case_insensitive {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    /// fnmatch-style match of a single path segment.
    fn glob_segment(&self, pattern: &str, segment: &str) -> bool {
        let normalized = normalize_segment_glob(pattern);
        let glob = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .backslash_escape(false)
            .case_insensitive(self.case_insensitive)
            .build();

        match glob {
            Ok(glob) => glob.compile_matcher().is_match(segment),
            Err(err) => {
                debug!("Treating glob segment '{pattern}' literally: {err}");
                self.text_eq(pattern, segment)
            }
        }
    }
}

/// Rewrites a segment glob so `globset` reads it with fnmatch semantics:
/// runs of `*` collapse to one and braces outside classes are literal.
fn normalize_segment_glob(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut in_class = false;
    let mut prev_star = false;

    for ch in pattern.chars() {
        if in_class {
            out.push(ch);
            if ch == ']' {
                in_class = false;
            }
            continue;
        }

        match ch {
            '*' if prev_star => continue,
            '[' => {
                in_class = true;
                out.push(ch);
            }
            '{' => out.push_str("[{]"),
            '}' => out.push_str("[}]"),
            _ => out.push(ch),
        }
        prev_star = ch == '*';
    }

    out
}
