//! Ignore patterns for watch registration and event filtering.

use std::path::Path;

/// Compiled ignore list.
///
/// Configuration carries glob-shaped patterns ("**/node_modules/**");
/// matching strips the wildcards and tests the remaining fragment as a
/// substring of the slash-terminated path, so a fragment like "/.git/"
/// catches both the directory and everything inside it.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    fragments: Vec<String>,
}

impl IgnorePatterns {
    #[must_use]
    pub fn new(patterns: &[String]) -> Self {
        let fragments = patterns
            .iter()
            .map(|p| p.replace('*', ""))
            .filter(|p| !p.is_empty())
            .collect();
        Self { fragments }
    }

    /// Whether a path matches any ignore fragment.
    #[must_use]
    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.fragments.is_empty() {
            return false;
        }
        let haystack = format!("{}/", path.display());
        self.fragments.iter().any(|f| haystack.contains(f.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn patterns(raw: &[&str]) -> IgnorePatterns {
        let owned: Vec<String> = raw.iter().map(ToString::to_string).collect();
        IgnorePatterns::new(&owned)
    }

    #[test]
    fn test_glob_shaped_patterns_match_directory_and_children() {
        let ignore = patterns(&["**/.git/**", "**/node_modules/**"]);

        assert!(ignore.is_ignored(&PathBuf::from("/data/.git")));
        assert!(ignore.is_ignored(&PathBuf::from("/data/.git/config")));
        assert!(ignore.is_ignored(&PathBuf::from("/data/app/node_modules/x/y.js")));
        assert!(!ignore.is_ignored(&PathBuf::from("/data/app/src/main.js")));
    }

    #[test]
    fn test_plain_fragment_matches_anywhere() {
        let ignore = patterns(&["cache"]);
        assert!(ignore.is_ignored(&PathBuf::from("/data/__pycache__/m.pyc")));
        assert!(ignore.is_ignored(&PathBuf::from("/data/cached/file")));
        assert!(!ignore.is_ignored(&PathBuf::from("/data/other/file")));
    }

    #[test]
    fn test_gitignore_style_dotfile_is_not_confused_with_similar_names() {
        let ignore = patterns(&["**/.git/**"]);
        assert!(!ignore.is_ignored(&PathBuf::from("/data/my.github/workflows")));
        assert!(!ignore.is_ignored(&PathBuf::from("/data/legit/file")));
    }

    #[test]
    fn test_empty_patterns_ignore_nothing() {
        let ignore = patterns(&[]);
        assert!(!ignore.is_ignored(&PathBuf::from("/anything/.git/config")));
        assert!(ignore.is_empty());
    }
}
