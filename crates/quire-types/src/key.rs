//! Canonical form for resource keys and repository-relative file paths.

/// Normalize a key or path: backslashes become slashes, surrounding
/// whitespace is trimmed, and empty segments collapse. The root is the empty
/// string, never `"/"`.
pub fn normalize_path(path: &str) -> String {
    path.trim()
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// The final segment of a normalized path, or the whole path when it has no
/// separator. Empty input yields an empty segment.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_separators_and_trims() {
        assert_eq!(normalize_path("/a//b/"), "a/b");
        assert_eq!(normalize_path("  a/b  "), "a/b");
        assert_eq!(normalize_path("a\\b\\c"), "a/b/c");
    }

    #[test]
    fn root_is_empty() {
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("/"), "");
        assert_eq!(normalize_path("   "), "");
    }

    #[test]
    fn idempotent() {
        for input in ["a/b/c", "", "x", "a b/c d"] {
            let once = normalize_path(input);
            assert_eq!(normalize_path(&once), once);
        }
    }

    #[test]
    fn final_segment() {
        assert_eq!(file_name("a/b/c.txt"), "c.txt");
        assert_eq!(file_name("c.txt"), "c.txt");
        assert_eq!(file_name(""), "");
    }
}
