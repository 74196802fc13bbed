//! # Snapgate Test Helpers
//!
//! Every test gets its own artifact root in a temporary directory, so tests
//! can run in parallel without sharing snapshot files.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use snapgate::{JsonMatcher, TestMeta};
use tempfile::TempDir;
use walkdir::WalkDir;

/// An isolated artifact root plus the test identity that owns it.
pub struct Workspace {
    pub dir: TempDir,
    pub meta: TestMeta,
}

impl Workspace {
    pub fn new(method: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let meta = TestMeta::new("snapgate::scenarios", method, dir.path());
        Self { dir, meta }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn matcher(&self) -> JsonMatcher {
        JsonMatcher::new(self.meta.clone())
    }

    /// Writes an approved artifact for `matcher`'s identity.
    pub fn approve(&self, matcher: &JsonMatcher, json: &str) -> PathBuf {
        let id = matcher.identity();
        fs::create_dir_all(id.dir()).expect("create artifact dir");
        let path = id.approved_path();
        fs::write(&path, format!("/*{}*/\n{json}\n", id.comment_line())).expect("write approved");
        path
    }

    /// Every file under the root whose name marks it as not approved.
    pub fn not_approved_files(&self) -> Vec<PathBuf> {
        WalkDir::new(self.root())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_string_lossy().contains("-not-approved."))
            .map(|e| e.into_path())
            .collect()
    }
}

/// The approved file's JSON without its comment line.
pub fn read_json(path: &Path) -> serde_json::Value {
    let text = fs::read_to_string(path).expect("read artifact");
    serde_json::from_str(snapgate::store::strip_comment(&text)).expect("artifact is JSON")
}
