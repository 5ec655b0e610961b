use std::path::Path;

/// Replace path separators so a release tag can be embedded in a file name.
#[must_use]
pub fn sanitize_tag(tag: &str) -> String {
    tag.trim().replace(['/', '\\'], "-")
}

/// Compare two paths ignoring case; filesystems on Windows and macOS usually do.
#[must_use]
pub fn paths_match(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

/// Interpret a confirmation answer; only `y` (any case) means yes.
#[must_use]
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_tags_for_file_names() {
        assert_eq!(sanitize_tag("v1.2.3"), "v1.2.3");
        assert_eq!(sanitize_tag("release/v2"), "release-v2");
        assert_eq!(sanitize_tag(" a\\b "), "a-b");
    }

    #[test]
    fn compares_paths_case_insensitively() {
        assert!(paths_match(
            Path::new("C:/Users/Ana/Documents/Moodinho/moodinho-launcher.exe"),
            Path::new("c:/users/ana/documents/moodinho/MOODINHO-LAUNCHER.EXE"),
        ));
        assert!(!paths_match(Path::new("/tmp/a"), Path::new("/tmp/b")));
    }

    #[test]
    fn only_y_confirms() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" Y "));
        assert!(!is_affirmative("yes"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
    }
}
