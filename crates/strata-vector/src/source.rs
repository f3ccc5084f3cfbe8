//! File source discovery and reading.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;
use walkdir::WalkDir;

use strata_core::error::StrataError;
use strata_core::types::DocumentSource;

/// Find files under `root` whose names match any of `patterns`.
///
/// Patterns use `*` (any run of characters) and `?` (one character); neither
/// crosses a `/`, and neither matches a leading `.` unless the pattern starts
/// with one. A pattern without `/` is matched against the file name, one with
/// `/` against the path relative to `root`. Without `recursive` only files
/// at the depth the pattern describes are considered; with it, files in any
/// subdirectory are. Results are sorted and free of duplicates.
pub fn discover_files(root: &Path, patterns: &[String], recursive: bool) -> Vec<PathBuf> {
    let max_depth = if recursive {
        usize::MAX
    } else {
        patterns
            .iter()
            .map(|p| p.split('/').count())
            .max()
            .unwrap_or(1)
    };

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let Ok(rel) = entry.path().strip_prefix(root) else {
                return false;
            };
            let parts: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            patterns
                .iter()
                .any(|pattern| path_matches(pattern, &parts, recursive))
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files.dedup();
    debug!(root = %root.display(), count = files.len(), "Discovered files");
    files
}

fn path_matches(pattern: &str, parts: &[String], recursive: bool) -> bool {
    let segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() || segments.len() > parts.len() {
        return false;
    }
    if !recursive && segments.len() != parts.len() {
        return false;
    }
    let tail = &parts[parts.len() - segments.len()..];
    segments
        .iter()
        .zip(tail)
        .all(|(seg, name)| wildcard_match(seg, name))
}

/// Match one path component against a `*`/`?` pattern.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    if name.starts_with('.') && !pattern.starts_with('.') {
        return false;
    }
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();

    // Greedy match with backtracking to the most recent '*'.
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ni < n.len() {
        match p.get(pi) {
            Some('*') => {
                star = Some((pi, ni));
                pi += 1;
            }
            Some(&c) if c == '?' || c == n[ni] => {
                pi += 1;
                ni += 1;
            }
            _ => match star {
                Some((sp, sn)) => {
                    pi = sp + 1;
                    ni = sn + 1;
                    star = Some((sp, sn + 1));
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

fn epoch_seconds(time: std::io::Result<SystemTime>) -> Option<f64> {
    time.ok()?
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs_f64())
}

/// Read a source file as UTF-8 text along with its file metadata.
///
/// Filesystems without a creation time report the modification time instead.
pub fn read_source(path: &Path) -> Result<(DocumentSource, String), StrataError> {
    let read_error = |e: std::io::Error| StrataError::SourceRead {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let meta = fs::metadata(path).map_err(read_error)?;
    let text = fs::read_to_string(path).map_err(read_error)?;

    let modified = epoch_seconds(meta.modified()).unwrap_or(0.0);
    let created = epoch_seconds(meta.created()).unwrap_or(modified);

    Ok((DocumentSource::new(path, meta.len(), created, modified), text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("b.md"), "b").unwrap();
        fs::write(root.join(".hidden.txt"), "h").unwrap();
        fs::write(root.join("sub/c.txt"), "c").unwrap();
        fs::write(root.join("sub/deeper/d.txt"), "d").unwrap();
        dir
    }

    #[test]
    fn test_wildcards() {
        assert!(wildcard_match("*.txt", "notes.txt"));
        assert!(!wildcard_match("*.txt", "notes.md"));
        assert!(wildcard_match("note?.txt", "note1.txt"));
        assert!(!wildcard_match("note?.txt", "note12.txt"));
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("a*b*c", "aXXbYYc"));
        assert!(!wildcard_match("a*b*c", "aXXbYY"));
        assert!(!wildcard_match("*.txt", ".hidden.txt"));
        assert!(wildcard_match(".*.txt", ".hidden.txt"));
    }

    #[test]
    fn test_non_recursive_top_level_only() {
        let dir = tree();
        let files = discover_files(dir.path(), &["*.txt".to_string()], false);
        assert_eq!(names(&files), vec!["a.txt"]);
    }

    #[test]
    fn test_recursive_descends() {
        let dir = tree();
        let files = discover_files(dir.path(), &["*.txt".to_string()], true);
        assert_eq!(names(&files), vec!["a.txt", "c.txt", "d.txt"]);
    }

    #[test]
    fn test_overlapping_patterns_deduplicated() {
        let dir = tree();
        let patterns = vec!["*.txt".to_string(), "a.*".to_string(), "*.md".to_string()];
        let files = discover_files(dir.path(), &patterns, false);
        assert_eq!(names(&files), vec!["a.txt", "b.md"]);
    }

    #[test]
    fn test_pattern_with_directory() {
        let dir = tree();
        let files = discover_files(dir.path(), &["sub/*.txt".to_string()], false);
        assert_eq!(names(&files), vec!["c.txt"]);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let files = discover_files(Path::new("/nonexistent/strata"), &["*".to_string()], true);
        assert!(files.is_empty());
    }

    #[test]
    fn test_read_source() {
        let dir = tree();
        let path = dir.path().join("a.txt");
        let (source, text) = read_source(&path).unwrap();
        assert_eq!(text, "a");
        assert_eq!(source.size, 1);
        assert_eq!(source.file_name, "a.txt");
        assert_eq!(source.extension, ".txt");
        assert!(source.modified > 0.0);
        assert!(source.created > 0.0);
    }

    #[test]
    fn test_read_source_missing() {
        let result = read_source(Path::new("/nonexistent/strata.txt"));
        assert!(matches!(result, Err(StrataError::SourceRead { .. })));
    }

    #[test]
    fn test_read_source_not_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin.txt");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(
            read_source(&path),
            Err(StrataError::SourceRead { .. })
        ));
    }
}
