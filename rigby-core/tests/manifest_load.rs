use rigby_core::manifest::Manifest;
use rigby_core::RigbyError;
use std::io::Write;

fn http() -> reqwest::blocking::Client {
    reqwest::blocking::Client::new()
}

fn write_manifest(dir: &std::path::Path, body: &str) -> String {
    let path = dir.join("manifest.json");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    path.to_string_lossy().to_string()
}

const SHA: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const MD5: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

fn chunk_json(length: u64) -> String {
    format!(r#"{{"sha256":"{SHA}","md5":"{MD5}","length":{length}}}"#)
}

#[test]
fn load_accepts_minimal_valid_manifest() {
    let td = tempfile::tempdir().unwrap();
    let src = write_manifest(
        td.path(),
        &format!(
            r#"{{"format_version":"rigby-v1","chunks":[{}],"files":[{{"path":"a.bin","size":4,"sha256":"{SHA}","md5":"{MD5}","chunk_start":0,"chunk_end":1}}]}}"#,
            chunk_json(4)
        ),
    );
    let mf = Manifest::load(&src, &http()).unwrap();
    assert_eq!(mf.files.len(), 1);
    assert_eq!(mf.chunks[0].effective_codec(), "zstd");
}

#[test]
fn load_rejects_missing_required_fields() {
    let td = tempfile::tempdir().unwrap();
    // no files array
    let src = write_manifest(
        td.path(),
        r#"{"format_version":"rigby-v1","chunks":[]}"#,
    );
    let err = Manifest::load(&src, &http()).unwrap_err();
    assert!(matches!(err, RigbyError::Manifest { .. }), "got {err}");

    // chunk missing md5
    let src = write_manifest(
        td.path(),
        &format!(
            r#"{{"format_version":"rigby-v1","chunks":[{{"sha256":"{SHA}","length":4}}],"files":[]}}"#
        ),
    );
    let err = Manifest::load(&src, &http()).unwrap_err();
    assert!(matches!(err, RigbyError::Manifest { .. }), "got {err}");
}

#[test]
fn load_rejects_unsupported_format_version() {
    let td = tempfile::tempdir().unwrap();
    let src = write_manifest(
        td.path(),
        r#"{"format_version":"rigby-v9","chunks":[],"files":[]}"#,
    );
    let err = Manifest::load(&src, &http()).unwrap_err();
    assert!(matches!(err, RigbyError::UnsupportedFormat { .. }), "got {err}");
}

#[test]
fn load_rejects_out_of_bounds_chunk_range() {
    let td = tempfile::tempdir().unwrap();
    let src = write_manifest(
        td.path(),
        &format!(
            r#"{{"format_version":"rigby-v1","chunks":[{}],"files":[{{"path":"a.bin","size":4,"sha256":"{SHA}","md5":"{MD5}","chunk_start":0,"chunk_end":2}}]}}"#,
            chunk_json(4)
        ),
    );
    let err = Manifest::load(&src, &http()).unwrap_err();
    assert!(matches!(err, RigbyError::InvalidChunkRange { .. }), "got {err}");
}

#[test]
fn load_rejects_chunk_lengths_not_summing_to_size() {
    let td = tempfile::tempdir().unwrap();
    let src = write_manifest(
        td.path(),
        &format!(
            r#"{{"format_version":"rigby-v1","chunks":[{}],"files":[{{"path":"a.bin","size":5,"sha256":"{SHA}","md5":"{MD5}","chunk_start":0,"chunk_end":1}}]}}"#,
            chunk_json(4)
        ),
    );
    let err = Manifest::load(&src, &http()).unwrap_err();
    assert!(matches!(err, RigbyError::Manifest { .. }), "got {err}");
    assert!(err.to_string().contains("sum"), "got {err}");
}

#[test]
fn load_rejects_duplicate_file_paths() {
    let td = tempfile::tempdir().unwrap();
    let file = format!(
        r#"{{"path":"a.bin","size":4,"sha256":"{SHA}","md5":"{MD5}","chunk_start":0,"chunk_end":1}}"#
    );
    let src = write_manifest(
        td.path(),
        &format!(
            r#"{{"format_version":"rigby-v1","chunks":[{}],"files":[{file},{file}]}}"#,
            chunk_json(4)
        ),
    );
    let err = Manifest::load(&src, &http()).unwrap_err();
    assert!(err.to_string().contains("duplicate"), "got {err}");
}

#[test]
fn load_rejects_malformed_digests() {
    let td = tempfile::tempdir().unwrap();
    let src = write_manifest(
        td.path(),
        &format!(
            r#"{{"format_version":"rigby-v1","chunks":[{{"sha256":"zz","md5":"{MD5}","length":4}}],"files":[]}}"#
        ),
    );
    let err = Manifest::load(&src, &http()).unwrap_err();
    assert!(matches!(err, RigbyError::Manifest { .. }), "got {err}");
}

#[test]
fn blank_codec_defaults_to_zstd_and_raw_is_kept() {
    let td = tempfile::tempdir().unwrap();
    let src = write_manifest(
        td.path(),
        &format!(
            r#"{{"format_version":"rigby-v1","chunks":[{{"sha256":"{SHA}","md5":"{MD5}","length":4,"codec":"  "}},{{"sha256":"{SHA}","md5":"{MD5}","length":4,"codec":"raw"}}],"files":[]}}"#
        ),
    );
    let mf = Manifest::load(&src, &http()).unwrap();
    assert_eq!(mf.chunks[0].effective_codec(), "zstd");
    assert_eq!(mf.chunks[1].effective_codec(), "raw");
}
