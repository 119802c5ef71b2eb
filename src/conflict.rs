//! File-target overlap detection
//!
//! A conservative, pattern-level check used at admission time to keep two
//! tasks from concurrently writing the same files. Patterns are either exact
//! paths or a directory prefix with a single trailing `*` segment; nothing
//! else is interpreted, and file contents are never inspected. Sequential
//! conflicts are out of reach here and are caught by consolidation instead.

/// Whether any pattern in `a` overlaps any pattern in `b`
pub fn targets_overlap(a: &[String], b: &[String]) -> bool {
    a.iter()
        .any(|pa| b.iter().any(|pb| patterns_overlap(pa, pb)))
}

/// Whether two individual patterns can refer to the same file
///
/// Overlap holds when the patterns are identical, or when one ends in a
/// directory wildcard and the other falls under its fixed prefix. The prefix
/// of `src/*` is `src/` so that `src2/api.js` stays clear of it.
pub fn patterns_overlap(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    wildcard_covers(a, b) || wildcard_covers(b, a)
}

fn wildcard_covers(pattern: &str, path: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) if prefix.ends_with('/') => path.starts_with(prefix),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(patterns: &[&str]) -> Vec<String> {
        patterns.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_identical_paths_overlap() {
        assert!(patterns_overlap("src/app.js", "src/app.js"));
    }

    #[test]
    fn test_disjoint_paths_do_not_overlap() {
        assert!(!patterns_overlap("src/a.js", "src/b.js"));
    }

    #[test]
    fn test_wildcard_covers_nested_path() {
        assert!(patterns_overlap("src/*", "src/api/file.js"));
        assert!(patterns_overlap("src/api/file.js", "src/*"));
    }

    #[test]
    fn test_wildcard_covers_narrower_wildcard() {
        assert!(patterns_overlap("src/*", "src/api/*"));
    }

    #[test]
    fn test_wildcard_respects_directory_boundary() {
        assert!(!patterns_overlap("src/*", "src2/api.js"));
        assert!(!patterns_overlap("src/api/*", "src/auth/login.js"));
    }

    #[test]
    fn test_bare_star_is_not_a_directory_wildcard() {
        // Only a `/`-anchored trailing wildcard is understood.
        assert!(!patterns_overlap("*", "src/app.js"));
        assert!(patterns_overlap("*", "*"));
    }

    #[test]
    fn test_set_overlap() {
        let db = targets(&["src/db/*"]);
        let auth = targets(&["src/auth/*"]);
        let wide = targets(&["src/*", "docs/readme.md"]);
        assert!(!targets_overlap(&db, &auth));
        assert!(targets_overlap(&db, &wide));
        assert!(targets_overlap(&wide, &auth));
        assert!(!targets_overlap(&db, &[]));
    }
}
