//! Glob pattern compilation shared by the vault backends.

use glob::{MatchOptions, Pattern};

use trove_common::{Error, Result, ROOT_PATH};

/// Options used for every match: `*` and `?` never cross a separator.
pub const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Normalize a user supplied pattern.
///
/// The root token becomes `*`, runs of `*` collapse to one so `**` is never
/// recursive, and `[^` is accepted as a class negation alongside `[!`.
///
/// # Errors
/// - `IllegalPattern` if the pattern contains a backslash
pub fn normalize(pattern: &str) -> Result<String> {
    if pattern.contains('\\') {
        return Err(Error::IllegalPattern(format!(
            "backslash is not allowed in glob patterns: {}",
            pattern
        )));
    }
    if pattern.trim() == ROOT_PATH {
        return Ok("*".to_string());
    }

    let mut normalized = String::with_capacity(pattern.len());
    let mut previous = None;
    for c in pattern.chars() {
        if c == '*' && previous == Some('*') {
            continue;
        }
        if c == '^' && previous == Some('[') {
            normalized.push('!');
        } else {
            normalized.push(c);
        }
        previous = Some(c);
    }
    Ok(normalized)
}

/// Normalize and compile a pattern.
pub fn compile(pattern: &str) -> Result<Pattern> {
    let normalized = normalize(pattern)?;
    Pattern::new(&normalized)
        .map_err(|e| Error::IllegalPattern(format!("{}: {}", pattern, e.msg)))
}

/// Match a compiled pattern against a vault path.
pub fn matches(pattern: &Pattern, path: &str) -> bool {
    pattern.matches_with(path, MATCH_OPTIONS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backslash_rejected() {
        assert!(matches!(normalize("dir\\*"), Err(Error::IllegalPattern(_))));
    }

    #[test]
    fn test_root_becomes_star() {
        assert_eq!(normalize(".").unwrap(), "*");
        assert_eq!(normalize(" . ").unwrap(), "*");
    }

    #[test]
    fn test_star_runs_collapse() {
        assert_eq!(normalize("a/**/b").unwrap(), "a/*/b");
        assert_eq!(normalize("a***").unwrap(), "a*");
    }

    #[test]
    fn test_star_does_not_cross_separator() {
        let pattern = compile("*").unwrap();
        assert!(matches(&pattern, "file.txt"));
        assert!(!matches(&pattern, "dir/file.txt"));

        let pattern = compile("dir*/*.txt").unwrap();
        assert!(matches(&pattern, "dir1/file.txt"));
        assert!(!matches(&pattern, "dir1/sub/file.txt"));
    }

    #[test]
    fn test_double_star_is_not_recursive() {
        let pattern = compile("a/**/c").unwrap();
        assert!(matches(&pattern, "a/b/c"));
        assert!(!matches(&pattern, "a/b/b/c"));
    }

    #[test]
    fn test_character_classes() {
        let pattern = compile("file[12].txt").unwrap();
        assert!(matches(&pattern, "file1.txt"));
        assert!(!matches(&pattern, "file3.txt"));

        let pattern = compile("file[^12].txt").unwrap();
        assert!(matches(&pattern, "file3.txt"));
        assert!(!matches(&pattern, "file1.txt"));
    }

    #[test]
    fn test_malformed_pattern() {
        assert!(matches!(compile("file[.txt"), Err(Error::IllegalPattern(_))));
    }
}
