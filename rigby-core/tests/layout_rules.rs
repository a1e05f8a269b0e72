use rigby_core::layout;
use rigby_core::manifest::FileEntry;
use std::collections::HashSet;
use std::fs;

fn entry(path: &str) -> FileEntry {
    FileEntry {
        path: path.to_string(),
        size: 0,
        sha256: String::new(),
        md5: String::new(),
        blake3: None,
        chunk_start: 0,
        chunk_end: 0,
    }
}

#[test]
fn normalize_prefix_trims_slashes_and_blank() {
    assert_eq!(layout::normalize_prefix(None), "");
    assert_eq!(layout::normalize_prefix(Some("   ")), "");
    assert_eq!(layout::normalize_prefix(Some("/Build/")), "Build");
    assert_eq!(layout::normalize_prefix(Some("\\Build\\")), "Build");
}

#[test]
fn prefix_not_reapplied_when_root_already_ends_with_it() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("game").join("Build");
    fs::create_dir_all(&root).unwrap();
    let files = vec![entry("data/a.bin")];
    assert_eq!(layout::resolve_effective_prefix(&root, "Build", &files), "");
}

#[test]
fn prefix_defaults_to_unapplied_when_unprefixed_files_exist() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("out");
    fs::create_dir_all(root.join("data")).unwrap();
    fs::write(root.join("data/a.bin"), b"x").unwrap();
    let files = vec![entry("data/a.bin")];
    assert_eq!(layout::resolve_effective_prefix(&root, "Build", &files), "");
}

#[test]
fn prefix_applied_when_more_prefixed_files_exist() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("out");
    fs::create_dir_all(root.join("Build/data")).unwrap();
    fs::write(root.join("Build/data/a.bin"), b"x").unwrap();
    fs::write(root.join("Build/data/b.bin"), b"y").unwrap();
    let files = vec![entry("data/a.bin"), entry("data/b.bin")];
    assert_eq!(layout::resolve_effective_prefix(&root, "Build", &files), "Build");
}

#[test]
fn prefix_tie_defaults_to_unapplied() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("out");
    fs::create_dir_all(&root).unwrap();
    // neither location has any file: 0 vs 0
    let files = vec![entry("data/a.bin")];
    assert_eq!(layout::resolve_effective_prefix(&root, "Build", &files), "");
}

#[test]
fn output_paths_may_not_escape_the_root() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("out");
    fs::create_dir_all(&root).unwrap();

    assert!(layout::resolve_output_path(&root, "sub/ok.bin").is_ok());
    assert!(layout::resolve_output_path(&root, "../evil.bin").is_err());
    assert!(layout::resolve_output_path(&root, "sub/../../evil.bin").is_err());
    assert!(layout::resolve_output_path(&root, "/etc/passwd").is_err());
}

#[test]
fn is_path_within_root_rejects_siblings() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("out");
    assert!(layout::is_path_within_root(&root, &root.join("a/b.bin")));
    assert!(!layout::is_path_within_root(&root, &td.path().join("other/b.bin")));
}

#[test]
fn reconcile_deletes_unexpected_files_and_empty_dirs() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("out");
    fs::create_dir_all(root.join("keep")).unwrap();
    fs::create_dir_all(root.join("stale/nested")).unwrap();
    fs::write(root.join("keep/a.bin"), b"a").unwrap();
    fs::write(root.join("keep/b.bin"), b"b").unwrap();
    fs::write(root.join("stale/nested/old.bin"), b"o").unwrap();

    let mut expected = HashSet::new();
    expected.insert(layout::path_key(&root.join("keep/a.bin")));

    let deleted = layout::reconcile_tree(&root, &expected).unwrap();
    assert_eq!(deleted, 2);
    assert!(root.join("keep/a.bin").is_file());
    assert!(!root.join("keep/b.bin").exists());
    assert!(!root.join("stale").exists(), "emptied directories are removed bottom-up");
}

#[test]
fn reconcile_on_missing_root_is_a_noop() {
    let td = tempfile::tempdir().unwrap();
    let deleted =
        layout::reconcile_tree(&td.path().join("nope"), &HashSet::new()).unwrap();
    assert_eq!(deleted, 0);
}
