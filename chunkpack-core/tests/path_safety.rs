use chunkpack_core::header::{FileEntry, Header, HEADER_VERSION};
use chunkpack_core::path_safety::PathPolicy;
use chunkpack_core::{Decoder, DecoderConfig, Error};
use std::fs;
use std::path::Path;

#[cfg(target_family = "unix")]
fn symlink_dir<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Hand-write a one-entry chunk set; the encoder never produces such names.
fn forge(dir: &Path, name: &str, data: &[u8]) {
    fs::create_dir_all(dir).unwrap();
    let h = Header {
        version: HEADER_VERSION,
        chunk_size: 64,
        total_bytes: data.len() as u64,
        chunk_count: 1,
        entries: vec![FileEntry { name: name.to_string(), size: data.len() as u64, offset: 0 }],
    };
    fs::write(dir.join("header"), serde_json::to_vec_pretty(&h).unwrap()).unwrap();
    fs::write(dir.join("chunk-00"), data).unwrap();
}

#[test]
fn parent_traversal_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let chunks = tmp.path().join("chunks");
    let out = tmp.path().join("out");
    forge(&chunks, "../escaped.txt", b"pwned");

    let err = Decoder::decode(&chunks, &out, &DecoderConfig::default()).unwrap_err();
    assert!(matches!(err, Error::UnsafePath { .. }), "{:?}", err);
    assert!(err.to_string().contains("escaped.txt"));
    assert!(!tmp.path().join("escaped.txt").exists());
}

#[test]
fn nested_traversal_and_absolute_names_are_rejected() {
    for (i, name) in ["a/../../x", "/etc/chunkpack-test", "a/./b"].iter().enumerate() {
        let tmp = tempfile::tempdir().unwrap();
        let chunks = tmp.path().join(format!("chunks{}", i));
        forge(&chunks, name, b"data");
        let err =
            Decoder::decode(&chunks, &tmp.path().join("out"), &DecoderConfig::default()).unwrap_err();
        assert!(matches!(err, Error::UnsafePath { .. }), "{}: {:?}", name, err);
    }
}

#[test]
fn nested_names_create_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let chunks = tmp.path().join("chunks");
    let out = tmp.path().join("out");
    forge(&chunks, "deep/er/file.txt", b"hello");
    Decoder::decode(&chunks, &out, &DecoderConfig::default()).unwrap();
    assert_eq!(fs::read(out.join("deep/er/file.txt")).unwrap(), b"hello");
}

#[cfg(target_family = "unix")]
#[test]
fn symlinked_parent_rejected_by_default_allowed_when_contained() {
    let tmp = tempfile::tempdir().unwrap();
    let chunks = tmp.path().join("chunks");
    let out = tmp.path().join("out");
    fs::create_dir_all(out.join("target")).unwrap();
    symlink_dir(out.join("target"), out.join("safe")).unwrap();
    forge(&chunks, "safe/file.txt", b"hello");

    let err = Decoder::decode(&chunks, &out, &DecoderConfig::default()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("symlink"), "unexpected error: {}", msg);

    let cfg = DecoderConfig { policy: PathPolicy { follow_symlinks: true } };
    Decoder::decode(&chunks, &out, &cfg).unwrap();
    assert_eq!(fs::read(out.join("target/file.txt")).unwrap(), b"hello");
}

#[cfg(target_family = "unix")]
#[test]
fn symlink_escape_blocked_even_when_following() {
    let tmp = tempfile::tempdir().unwrap();
    let chunks = tmp.path().join("chunks");
    let out = tmp.path().join("out");
    let outside = tmp.path().join("outside");
    fs::create_dir_all(&out).unwrap();
    fs::create_dir_all(&outside).unwrap();
    symlink_dir(&outside, out.join("evil")).unwrap();
    forge(&chunks, "evil/file.txt", b"hello");

    let cfg = DecoderConfig { policy: PathPolicy { follow_symlinks: true } };
    let err = Decoder::decode(&chunks, &out, &cfg).unwrap_err();
    assert!(err.to_string().contains("escapes root"), "{}", err);
    assert!(!outside.join("file.txt").exists());
}

#[cfg(target_family = "unix")]
#[test]
fn dangling_symlink_cannot_redirect_a_write() {
    let tmp = tempfile::tempdir().unwrap();
    let chunks = tmp.path().join("chunks");
    let out = tmp.path().join("out");
    let outside = tmp.path().join("outside");
    fs::create_dir_all(&out).unwrap();
    fs::create_dir_all(&outside).unwrap();
    // the link target does not exist yet, so File::create would make it
    symlink_dir(outside.join("x"), out.join("evil")).unwrap();
    forge(&chunks, "evil", b"hello");

    let cfg = DecoderConfig { policy: PathPolicy { follow_symlinks: true } };
    let err = Decoder::decode(&chunks, &out, &cfg).unwrap_err();
    assert!(matches!(err, Error::UnsafePath { .. }), "{:?}", err);
    assert!(!outside.join("x").exists());
}
