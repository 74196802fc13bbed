mod common;

use std::fs;
use std::sync::Arc;
use std::thread;

use common::Workspace;
use snapgate::canonical::Node;
use snapgate::store::{
    ensure_artifact, load_approved, overwrite_approved, Ensured, Naming, SnapshotIdentity,
};
use snapgate::{ApprovalError, ErrorCategory, TestMeta};

#[test]
fn naming_is_deterministic_across_resolutions() {
    let a = TestMeta::new("billing::tests", "invoice_totals", "/artifacts");
    let b = TestMeta::new("billing::tests", "invoice_totals", "/artifacts");
    let first = SnapshotIdentity::resolve(&a, &Naming::default());
    let second = SnapshotIdentity::resolve(&b, &Naming::default());
    assert_eq!(first, second);
    assert_eq!(first.approved_path(), second.approved_path());
    assert_eq!(first.not_approved_path(), second.not_approved_path());

    let other = TestMeta::new("billing::tests", "invoice_tax", "/artifacts");
    let other = SnapshotIdentity::resolve(&other, &Naming::default());
    assert_eq!(other.dir(), first.dir());
    assert_ne!(other.approved_path(), first.approved_path());
}

#[test]
fn malformed_approved_fails_the_match() {
    let ws = Workspace::new("malformed");
    let matcher = ws.matcher();
    let id = matcher.identity();
    fs::create_dir_all(id.dir()).unwrap();
    fs::write(id.approved_path(), "/*x*/\n{\"a\": 1,,}").unwrap();

    let err = matcher.matches_json(r#"{"a":1}"#, false).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Io);
    assert!(matches!(err, ApprovalError::MalformedArtifact { .. }));
    assert!(!err.is_mismatch());
}

#[test]
fn overwrite_is_promotion_only() {
    let ws = Workspace::new("overwrite_invariant");
    let id = ws.matcher().identity();
    let content = Node::parse(r#"{"v":2}"#).unwrap();

    let err = overwrite_approved(&id, &content).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::OverwriteInvariant);
    assert!(!id.approved_path().exists());
    assert!(!id.not_approved_path().exists());
}

#[test]
fn approved_comment_line_is_ignored_on_load() {
    let ws = Workspace::new("comment_line");
    let matcher = ws.matcher();
    let path = ws.approve(&matcher, "{\"v\":1}");
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("/*snapgate::scenarios.comment_line*/"));
    assert_eq!(load_approved(&matcher.identity()).unwrap(), Node::parse("{\"v\":1}").unwrap());
}

#[test]
fn concurrent_creation_yields_one_complete_candidate() {
    let ws = Workspace::new("concurrent_creation");
    let id = Arc::new(ws.matcher().identity());
    let content = Arc::new(Node::parse(r#"{"items":[1,2,3,4,5,6,7,8,9,10]}"#).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let id = Arc::clone(&id);
            let content = Arc::clone(&content);
            thread::spawn(move || ensure_artifact(&id, &content).unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Ensured::Created);
    }

    let files = ws.not_approved_files();
    assert_eq!(files.len(), 1);
    let text = fs::read_to_string(&files[0]).unwrap();
    let parsed = Node::parse(snapgate::store::strip_comment(&text)).unwrap();
    assert_eq!(parsed, *content);

    let leftovers: Vec<_> = fs::read_dir(id.dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}
