//! Wildmat pattern matching
//!
//! Group-name patterns per the NNTP wildmat rules: a comma-separated list
//! of glob patterns (`*` and `?`), each optionally negated with a leading
//! `!`. Patterns are evaluated left to right and the last one that
//! matches decides the outcome; no pattern matching means no match.

/// Compiled wildmat pattern list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wildmat {
    patterns: Vec<(bool, String)>,
}

impl Wildmat {
    /// Parse a wildmat expression; empty segments are ignored
    #[must_use]
    pub fn parse(expression: &str) -> Self {
        let patterns = expression
            .split(',')
            .filter(|p| !p.is_empty())
            .map(|p| match p.strip_prefix('!') {
                Some(rest) => (true, rest.to_string()),
                None => (false, p.to_string()),
            })
            .collect();
        Self { patterns }
    }

    /// Test a group name against the pattern list
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let mut result = false;
        for (negated, pattern) in &self.patterns {
            if glob_match(pattern, name) {
                result = !negated;
            }
        }
        result
    }
}

/// Glob matching with `*` (any run) and `?` (any single char)
fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if let Some((star_p, star_n)) = star {
            // Backtrack: let the last * swallow one more char
            p = star_p + 1;
            n = star_n + 1;
            star = Some((star_p, star_n + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
