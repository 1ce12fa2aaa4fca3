//! Attachment path resolution

use std::path::Path;

/// Result of resolving a stored attachment path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub resolved: String,
    pub missing: bool,
}

/// Expand `~` in a stored path and check that it names a regular file.
pub fn resolve(stored: &str) -> ResolvedPath {
    if stored.is_empty() {
        return ResolvedPath {
            resolved: String::new(),
            missing: true,
        };
    }
    let resolved = shellexpand::tilde(stored).to_string();
    let missing = !Path::new(&resolved).is_file();
    ResolvedPath { resolved, missing }
}

/// Name to show for an attachment: transfer name, then filename, then a placeholder.
pub fn display_name(filename: &str, transfer_name: &str) -> String {
    if !transfer_name.is_empty() {
        return transfer_name.to_string();
    }
    if !filename.is_empty() {
        return filename.to_string();
    }
    "(unknown)".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_existing_missing_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("test.txt");
        std::fs::write(&file, "hi").unwrap();

        let existing = resolve(file.to_str().unwrap());
        assert!(!existing.missing);
        assert!(existing.resolved.ends_with("test.txt"));

        let missing = resolve(dir.path().join("missing.txt").to_str().unwrap());
        assert!(missing.missing);

        let directory = resolve(dir.path().to_str().unwrap());
        assert!(directory.missing);

        assert!(resolve("").missing);
    }

    #[test]
    fn test_resolve_expands_tilde() {
        let resolved = resolve("~/Library/Messages/Attachments/none.dat");
        assert!(!resolved.resolved.starts_with('~'));
        assert!(resolved.missing);
    }

    #[test]
    fn test_display_name_preference() {
        assert_eq!(display_name("file.dat", "nice.dat"), "nice.dat");
        assert_eq!(display_name("file.dat", ""), "file.dat");
        assert_eq!(display_name("", ""), "(unknown)");
    }
}
