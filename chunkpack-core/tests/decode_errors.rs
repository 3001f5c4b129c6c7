use chunkpack_core::inspect::inspect;
use chunkpack_core::{Decoder, DecoderConfig, Encoder, EncoderConfig, Error};
use std::fs;
use std::path::{Path, PathBuf};

/// Pack 25 bytes as a (7) and b (18) with 10-byte chunks: chunk-00..02.
fn packed(td: &Path) -> PathBuf {
    let data = td.join("data");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("a"), vec![1u8; 7]).unwrap();
    fs::write(data.join("b"), vec![2u8; 18]).unwrap();
    let chunks = td.join("chunks");
    let cfg = EncoderConfig { chunk_size: 10, ..EncoderConfig::default() };
    Encoder::encode(&data, &chunks, &cfg).unwrap();
    chunks
}

fn decode(chunks: &Path, out: &Path) -> Result<(), Error> {
    Decoder::decode(chunks, out, &DecoderConfig::default()).map(|_| ())
}

#[test]
fn missing_header() {
    let td = tempfile::tempdir().unwrap();
    let chunks = packed(td.path());
    fs::remove_file(chunks.join("header")).unwrap();
    let err = decode(&chunks, &td.path().join("out")).unwrap_err();
    assert!(matches!(err, Error::MissingHeader { .. }), "{:?}", err);
}

#[test]
fn corrupted_header() {
    let td = tempfile::tempdir().unwrap();
    let chunks = packed(td.path());
    let bytes = fs::read(chunks.join("header")).unwrap();
    fs::write(chunks.join("header"), &bytes[..bytes.len() / 3]).unwrap();
    let err = decode(&chunks, &td.path().join("out")).unwrap_err();
    match err {
        Error::MalformedHeader { path, .. } => assert_eq!(path, chunks.join("header")),
        other => panic!("unexpected {:?}", other),
    }

    fs::write(chunks.join("header"), b"\x00\xffnot json").unwrap();
    let err = decode(&chunks, &td.path().join("out")).unwrap_err();
    assert!(matches!(err, Error::MalformedHeader { .. }), "{:?}", err);
}

#[test]
fn missing_middle_chunk() {
    let td = tempfile::tempdir().unwrap();
    let chunks = packed(td.path());
    fs::remove_file(chunks.join("chunk-01")).unwrap();
    let out = td.path().join("out");
    let err = decode(&chunks, &out).unwrap_err();
    assert!(matches!(err, Error::MissingChunk { .. }), "{:?}", err);
    assert!(err.to_string().contains("chunk-01"));
    // validation happens before any output is written
    assert!(!out.join("a").exists());
}

#[test]
fn short_chunk_is_missing_data() {
    let td = tempfile::tempdir().unwrap();
    let chunks = packed(td.path());
    fs::write(chunks.join("chunk-02"), vec![2u8; 3]).unwrap();
    let err = decode(&chunks, &td.path().join("out")).unwrap_err();
    assert!(matches!(err, Error::MissingChunk { .. }), "{:?}", err);
}

#[test]
fn oversized_chunk_is_corrupt() {
    let td = tempfile::tempdir().unwrap();
    let chunks = packed(td.path());
    fs::write(chunks.join("chunk-00"), vec![1u8; 11]).unwrap();
    let err = decode(&chunks, &td.path().join("out")).unwrap_err();
    assert!(matches!(err, Error::CorruptChunk { .. }), "{:?}", err);
}

#[test]
fn ambiguous_chunk_names_are_corrupt() {
    let td = tempfile::tempdir().unwrap();
    let chunks = packed(td.path());
    fs::copy(chunks.join("chunk-01"), chunks.join("chunk-1")).unwrap();
    let err = decode(&chunks, &td.path().join("out")).unwrap_err();
    assert!(matches!(err, Error::CorruptChunk { .. }), "{:?}", err);
    fs::remove_file(chunks.join("chunk-1")).unwrap();

    fs::write(chunks.join("chunk-03"), b"extra").unwrap();
    let err = decode(&chunks, &td.path().join("out")).unwrap_err();
    assert!(matches!(err, Error::CorruptChunk { .. }), "{:?}", err);
}

#[test]
fn unrelated_files_are_ignored() {
    let td = tempfile::tempdir().unwrap();
    let chunks = packed(td.path());
    fs::write(chunks.join("README.txt"), b"hello").unwrap();
    fs::write(chunks.join("chunks.zip"), b"nope").unwrap();
    fs::write(chunks.join("chunk-xx"), b"?").unwrap();
    fs::write(chunks.join("chunk-notes.txt"), b"mine").unwrap();
    fs::copy(chunks.join("chunk-01"), chunks.join("chunk-00.bak")).unwrap();
    let out = td.path().join("out");
    decode(&chunks, &out).unwrap();
    assert_eq!(fs::read(out.join("b")).unwrap(), vec![2u8; 18]);
}

#[test]
fn inspect_reports_layout_without_writing() {
    let td = tempfile::tempdir().unwrap();
    let chunks = packed(td.path());
    let rep = inspect(&chunks).unwrap();
    assert_eq!(rep.header.total_bytes, 25);
    assert_eq!(rep.chunks.len(), 3);
    assert!(rep.chunks[2].ends_with("chunk-02"));

    let err = inspect(&td.path().join("absent")).unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }), "{:?}", err);
}
