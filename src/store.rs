//! Snapshot Store: deterministic artifact naming and the on-disk lifecycle.
//!
//! Layout: `<root>/<hash(class)>/<hash(method)>[-<hash(unique id)>]-approved.<ext>`
//! next to its `-not-approved` candidate. Hashes are hex SHA-256 truncated to
//! [`HASH_CHARS`] characters, so names depend only on the test identity.
//!
//! Every write goes to a temporary file in the target directory and is then
//! renamed over the destination. Readers never observe a partial artifact.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::canonical::Node;
use crate::config::Settings;
use crate::ApprovalError;

/// Characters kept from each hex digest.
pub const HASH_CHARS: usize = 6;

const APPROVED_SUFFIX: &str = "-approved";
const NOT_APPROVED_SUFFIX: &str = "-not-approved";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Truncated hex SHA-256 of `input`.
pub fn hash_name(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(HASH_CHARS + 1);
    for byte in digest.iter().take(HASH_CHARS.div_ceil(2)) {
        out.push_str(&format!("{byte:02x}"));
    }
    out.truncate(HASH_CHARS);
    out
}

// ============================================================================
// TEST IDENTITY
// ============================================================================

/// Identity of the test that owns a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestMeta {
    /// Module path of the test, e.g. `my_crate::orders::tests`.
    pub class_name: String,
    /// Test function name.
    pub method_name: String,
    /// Artifact root directory.
    pub root: PathBuf,
}

impl TestMeta {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            root: root.into(),
        }
    }

    /// Builds the identity from a function's type path, as produced by
    /// [`test_meta!`](crate::test_meta). Closure segments are dropped.
    pub fn from_fn_path(path: &str, manifest_dir: impl AsRef<Path>) -> Self {
        let segments: Vec<&str> = path
            .trim_end_matches("::f")
            .split("::")
            .filter(|s| *s != "{{closure}}")
            .collect();
        let (method, class) = match segments.split_last() {
            Some((method, class)) if !class.is_empty() => (*method, class.join("::")),
            Some((method, _)) => (*method, String::new()),
            None => ("", String::new()),
        };
        let root = manifest_dir.as_ref().join(Settings::from_env().root);
        Self::new(class, method, root)
    }

    /// Human-readable origin written at the top of each artifact.
    pub fn comment_line(&self) -> String {
        format!("{}.{}", self.class_name, self.method_name)
    }
}

/// Derives a [`TestMeta`] for the enclosing test function.
///
/// The artifact root is `CARGO_MANIFEST_DIR` joined with the configured root.
#[macro_export]
macro_rules! test_meta {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::store::TestMeta::from_fn_path(type_name_of(f), env!("CARGO_MANIFEST_DIR"))
    }};
}

// ============================================================================
// NAMING
// ============================================================================

/// Per-matcher naming options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    /// Distinguishes invocations of a parameterized test.
    pub unique_id: Option<String>,
    /// Unhashed file stem replacing the method hash.
    pub file_name: Option<String>,
    /// Directory replacing `<root>/<class hash>`; relative paths are under the root.
    pub path_name: Option<PathBuf>,
    pub extension: String,
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            unique_id: None,
            file_name: None,
            path_name: None,
            extension: Settings::default().extension,
        }
    }
}

/// Resolved artifact locations for one test identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotIdentity {
    dir: PathBuf,
    /// Directory prefix shown in messages; absent for custom directories.
    display_dir: Option<String>,
    stem: String,
    extension: String,
    comment: String,
}

impl SnapshotIdentity {
    pub fn resolve(meta: &TestMeta, naming: &Naming) -> Self {
        let (dir, display_dir) = match &naming.path_name {
            Some(path) => (meta.root.join(path), None),
            None => {
                let class_hash = hash_name(&meta.class_name);
                (meta.root.join(&class_hash), Some(class_hash))
            }
        };
        let stem = match &naming.file_name {
            Some(name) => name.clone(),
            None => {
                let mut stem = hash_name(&meta.method_name);
                if let Some(id) = &naming.unique_id {
                    stem.push('-');
                    stem.push_str(&hash_name(id));
                }
                stem
            }
        };
        Self {
            dir,
            display_dir,
            stem,
            extension: naming.extension.trim_start_matches('.').to_string(),
            comment: meta.comment_line(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn approved_file_name(&self) -> String {
        format!("{}{APPROVED_SUFFIX}.{}", self.stem, self.extension)
    }

    pub fn not_approved_file_name(&self) -> String {
        format!("{}{NOT_APPROVED_SUFFIX}.{}", self.stem, self.extension)
    }

    pub fn approved_path(&self) -> PathBuf {
        self.dir.join(self.approved_file_name())
    }

    pub fn not_approved_path(&self) -> PathBuf {
        self.dir.join(self.not_approved_file_name())
    }

    /// A file name as shown to the user, prefixed by the class hash directory.
    pub fn display(&self, file_name: &str) -> String {
        match &self.display_dir {
            Some(dir) => format!("{dir}/{file_name}"),
            None => file_name.to_string(),
        }
    }

    pub fn comment_line(&self) -> &str {
        &self.comment
    }
}

// ============================================================================
// ARTIFACT FORMAT
// ============================================================================

/// Comment line, then pretty JSON, then a trailing newline.
pub fn render_artifact(comment: &str, content: &Node) -> String {
    let comment = comment.replace("*/", "* /");
    format!("/*{comment}*/\n{}\n", content.to_pretty_string())
}

/// Returns the JSON text of an artifact with its leading comment removed.
pub fn strip_comment(text: &str) -> &str {
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if let Some(rest) = trimmed.strip_prefix("/*") {
        return match rest.find("*/") {
            Some(end) => &rest[end + 2..],
            None => trimmed,
        };
    }
    if trimmed.starts_with("//") {
        return match trimmed.find('\n') {
            Some(end) => &trimmed[end + 1..],
            None => "",
        };
    }
    trimmed
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Outcome of [`ensure_artifact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    /// An approved artifact is present.
    Exists,
    /// No approved artifact; a not-approved candidate was written.
    Created,
}

/// Writes a not-approved candidate unless an approved artifact exists.
///
/// Never touches an existing approved artifact.
pub fn ensure_artifact(id: &SnapshotIdentity, content: &Node) -> Result<Ensured, ApprovalError> {
    let approved = id.approved_path();
    if approved.is_file() {
        debug!(path = %approved.display(), "approved artifact found");
        return Ok(Ensured::Exists);
    }
    let candidate = id.not_approved_path();
    write_atomic(&candidate, render_artifact(id.comment_line(), content).as_bytes())?;
    info!(path = %candidate.display(), "not-approved artifact created");
    Ok(Ensured::Created)
}

/// Reads and parses the approved artifact.
pub fn load_approved(id: &SnapshotIdentity) -> Result<Node, ApprovalError> {
    let path = id.approved_path();
    let text =
        fs::read_to_string(&path).map_err(|source| ApprovalError::io("read", &path, source))?;
    Node::parse(strip_comment(&text)).map_err(|source| ApprovalError::MalformedArtifact {
        path,
        source,
        help: Some("Fix the JSON by hand or delete the file and rerun the test.".to_string()),
    })
}

/// Replaces the approved artifact with `content`. The artifact must exist.
pub fn overwrite_approved(id: &SnapshotIdentity, content: &Node) -> Result<(), ApprovalError> {
    let path = id.approved_path();
    if !path.is_file() {
        return Err(ApprovalError::OverwriteInvariant {
            path,
            help: Some(
                "Approve a snapshot first; update in place only replaces existing ones."
                    .to_string(),
            ),
        });
    }
    write_atomic(&path, render_artifact(id.comment_line(), content).as_bytes())?;
    info!(path = %path.display(), "approved artifact overwritten");
    Ok(())
}

/// Atomically replaces `path` with `contents`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ApprovalError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|source| ApprovalError::io("create directory", parent, source))?;
    }

    let tmp = temp_path_next_to(path);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp)
        .map_err(|source| ApprovalError::io("create", &tmp, source))?;
    let written = file.write_all(contents).and_then(|_| file.sync_all());
    drop(file);
    if let Err(source) = written {
        let _ = fs::remove_file(&tmp);
        return Err(ApprovalError::io("write", &tmp, source));
    }

    // A failed rename leaves the destination untouched.
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        ApprovalError::io("rename", path, source)
    })
}

fn temp_path_next_to(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let pid = std::process::id();
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{file_name}.{pid}.{n}.tmp"))
}

// ============================================================================
// PROMOTION
// ============================================================================

/// Lists every not-approved artifact under `root`, sorted.
pub fn pending_artifacts(root: &Path) -> Result<Vec<PathBuf>, ApprovalError> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut pending = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            ApprovalError::io("scan", path, e.into())
        })?;
        if entry.file_type().is_file() && approved_counterpart(entry.path()).is_some() {
            pending.push(entry.into_path());
        }
    }
    pending.sort();
    Ok(pending)
}

/// The approved path a not-approved artifact promotes to.
pub fn approved_counterpart(not_approved: &Path) -> Option<PathBuf> {
    let name = not_approved.file_name()?.to_str()?;
    if name.starts_with('.') {
        return None;
    }
    let (stem, extension) = name.rsplit_once('.')?;
    let base = stem.strip_suffix(NOT_APPROVED_SUFFIX)?;
    Some(not_approved.with_file_name(format!("{base}{APPROVED_SUFFIX}.{extension}")))
}

/// Renames a not-approved artifact to its approved name.
///
/// Refuses to replace an existing approved artifact unless `force` is set.
pub fn promote(not_approved: &Path, force: bool) -> Result<PathBuf, ApprovalError> {
    let approved = approved_counterpart(not_approved).ok_or_else(|| {
        crate::err_msg!(
            Config,
            "{} is not a not-approved artifact",
            not_approved.display()
        )
    })?;
    if approved.exists() && !force {
        return Err(crate::err_msg!(
            Config,
            "{} already exists",
            approved.display()
        )
        .with_help("Pass --force to replace the approved artifact."));
    }
    fs::rename(not_approved, &approved)
        .map_err(|source| ApprovalError::io("rename", not_approved, source))?;
    info!(from = %not_approved.display(), to = %approved.display(), "artifact approved");
    Ok(approved)
}
