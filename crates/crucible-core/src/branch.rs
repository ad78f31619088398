//! Branch pattern classification for dispatch priority and lock exemption.

use serde::{Deserialize, Serialize};

/// Glob-style match supporting `*`, `?`, and `[...]` character classes
/// (with `a-z` ranges and leading `!` negation). Patterns match the whole
/// string.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    match_chars(&pattern, &text)
}

/// Whether `text` matches any pattern in the list.
pub fn matches_any(text: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| glob_match(pattern, text))
}

fn match_chars(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            (0..=text.len()).any(|skip| match_chars(&pattern[1..], &text[skip..]))
        }
        Some('?') => !text.is_empty() && match_chars(&pattern[1..], &text[1..]),
        Some('[') => match_class(pattern, text),
        Some(c) => text.first() == Some(c) && match_chars(&pattern[1..], &text[1..]),
    }
}

fn match_class(pattern: &[char], text: &[char]) -> bool {
    let Some(close) = pattern.iter().position(|&c| c == ']').filter(|&i| i > 1) else {
        // No closing bracket: treat '[' as a literal.
        return text.first() == Some(&'[') && match_chars(&pattern[1..], &text[1..]);
    };
    let Some(&candidate) = text.first() else {
        return false;
    };

    let mut class = &pattern[1..close];
    let negated = class.first() == Some(&'!');
    if negated {
        class = &class[1..];
    }

    let mut hit = false;
    let mut i = 0;
    while i < class.len() {
        if i + 2 < class.len() && class[i + 1] == '-' {
            if class[i] <= candidate && candidate <= class[i + 2] {
                hit = true;
            }
            i += 3;
        } else {
            if class[i] == candidate {
                hit = true;
            }
            i += 1;
        }
    }

    hit != negated && match_chars(&pattern[close + 1..], &text[1..])
}

/// Configured pattern lists classifying source branches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchPolicy {
    /// Branches carrying release builds; dispatched first.
    pub release_branches: Vec<String>,
    /// Branches whose produced packages are kept; dispatched after releases.
    pub saved_package_branches: Vec<String>,
    /// Protected staging branches.
    pub staging_branches: Vec<String>,
}

impl BranchPolicy {
    pub fn is_release(&self, branch: &str) -> bool {
        matches_any(branch, &self.release_branches)
    }

    pub fn is_saved_package(&self, branch: &str) -> bool {
        matches_any(branch, &self.saved_package_branches)
    }

    pub fn is_staging(&self, branch: &str) -> bool {
        matches_any(branch, &self.staging_branches)
    }
}

/// Whether packages produced on `branch` by `builder` should be kept.
/// Debug builders produce no packages, so there is nothing to save.
pub fn save_package(
    builder: &str,
    branch: &str,
    save_packages: bool,
    policy: &BranchPolicy,
) -> bool {
    if builder.contains("debug") {
        return false;
    }
    save_packages && policy.is_saved_package(branch)
}
