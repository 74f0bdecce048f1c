//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations, allowing services
//! to be tested with in-memory implementations.

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Check if path is a file.
    fn is_file(&self, path: &Path) -> bool;

    /// Check if path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Files below `dir` with the given extension, sorted by path.
    ///
    /// `max_depth` of 1 lists the directory itself only.
    fn list_files(&self, dir: &Path, extension: &str, max_depth: usize) -> io::Result<Vec<PathBuf>>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_files(&self, dir: &Path, extension: &str, max_depth: usize) -> io::Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not a directory: {}", dir.display()),
            ));
        }
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            // use WalkDir entry method, not filesystem syscall
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case(extension))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn given_nested_documents_when_listing_with_depth_then_respects_depth() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.rsml"), "").unwrap();
        fs::write(dir.path().join("a.RSML"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.rsml"), "").unwrap();

        let fs = RealFileSystem;
        let top = fs.list_files(dir.path(), "rsml", 1).unwrap();
        assert_eq!(top.len(), 2);
        assert!(top[0].ends_with("a.RSML"));

        let all = fs.list_files(dir.path(), "rsml", usize::MAX).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn given_missing_dir_when_listing_then_not_found() {
        let err = RealFileSystem
            .list_files(Path::new("/nonexistent/rootarch"), "rsml", 1)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
