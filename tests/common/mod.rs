//! Shared fixtures for integration tests.
//!
//! Payloads are written the way rustdoc writes them, with a small encoder for
//! the VLQ hex stream and an array-container Roaring writer, so tests exercise
//! the same decoding path as real index files.
//!
//! # Available Fixtures
//!
//! - `non_english`: the `non_english_identifier` crate, built and ready to query
//! - `index_dir`: a temporary directory holding that crate as an index file

#![allow(dead_code)]

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rstest::fixture;
use rustdoc_search::index::{IndexFile, LoadedIndex, RawCrate, RawPath, RawSearchIndex, parse_index_file};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A value of the VLQ hex stream.
#[derive(Debug, Clone)]
pub enum Atom {
    Int(i32),
    List(Vec<Atom>),
}

impl Atom {
    fn encode(&self, out: &mut String) {
        match self {
            Self::Int(n) => encode_int(out, *n),
            Self::List(items) => {
                out.push('{');
                for item in items {
                    item.encode(out);
                }
                out.push('}');
            }
        }
    }
}

/// A list of plain type ids.
pub fn ids(values: &[i32]) -> Atom {
    Atom::List(values.iter().copied().map(Atom::Int).collect())
}

/// `[inputs, output, bound1, bound2, ...]`.
pub fn signature(inputs: Atom, output: Atom, bounds: Vec<Atom>) -> Atom {
    let mut parts = vec![inputs, output];
    parts.extend(bounds);
    Atom::List(parts)
}

fn encode_int(out: &mut String, n: i32) {
    let mut magnitude = (n.unsigned_abs() << 1) | u32::from(n < 0);
    let mut nibbles = Vec::new();
    loop {
        nibbles.push((magnitude & 0xF) as u8);
        magnitude >>= 4;
        if magnitude == 0 {
            break;
        }
    }
    let last = nibbles.len() - 1;
    for (i, nibble) in nibbles.iter().rev().enumerate() {
        let base = if i == last { b'`' } else { b'@' };
        out.push(char::from(base + nibble));
    }
}

/// Encodes top-level values; `None` is the zero sentinel.
pub fn vlq_stream(values: &[Option<Atom>]) -> String {
    let mut out = String::new();
    for value in values {
        match value {
            Some(atom) => atom.encode(&mut out),
            None => out.push('`'),
        }
    }
    out
}

/// Shard lengths for the `D` stream.
pub fn shard_lengths(lengths: &[i32]) -> String {
    vlq_stream(&lengths.iter().map(|&n| Some(Atom::Int(n))).collect::<Vec<_>>())
}

/// Serializes a set of small integers as a Roaring bitmap of array containers.
pub fn roaring_base64(values: &[u32]) -> String {
    let mut groups: BTreeMap<u16, Vec<u16>> = BTreeMap::new();
    for &value in values {
        groups
            .entry((value >> 16) as u16)
            .or_default()
            .push((value & 0xFFFF) as u16);
    }
    for lows in groups.values_mut() {
        lows.sort_unstable();
        lows.dedup();
    }

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&12346u32.to_le_bytes());
    bytes.extend_from_slice(&(groups.len() as u32).to_le_bytes());
    for (key, lows) in &groups {
        bytes.extend_from_slice(&key.to_le_bytes());
        bytes.extend_from_slice(&((lows.len() - 1) as u16).to_le_bytes());
    }
    let mut offset = bytes.len() + 4 * groups.len();
    for lows in groups.values() {
        bytes.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += 2 * lows.len();
    }
    for lows in groups.values() {
        for low in lows {
            bytes.extend_from_slice(&low.to_le_bytes());
        }
    }
    STANDARD.encode(bytes)
}

pub const CRATE: &str = "non_english_identifier";

/// A crate whose items are named in Chinese.
///
/// | local | item                 | kind     |
/// |-------|----------------------|----------|
/// | 0     | `加法`               | trait    |
/// | 1     | `加法::加上`         | tymethod |
/// | 2     | `add` (alias `加法`) | fn       |
/// | 3     | `add` (alias `加法`) | macro    |
/// | 4     | `中文名称的加法宏`   | macro    |
/// | 5     | `中文名称的加法API`  | fn       |
/// | 6     | `总计`               | fn       |
/// | 7     | `可迭代`             | trait    |
/// | 8     | `可选`               | type     |
///
/// `加上(Self: 加法, 类型)` and `总计(集合: 可迭代) -> 可选` carry signatures;
/// only the crate, `加法` and `总计` have descriptions.
pub fn non_english_crate() -> RawCrate {
    let signatures = [
        None,
        Some(signature(ids(&[-1, -2]), ids(&[]), vec![ids(&[1]), ids(&[])])),
        None,
        None,
        None,
        None,
        Some(signature(ids(&[-1]), Atom::Int(3), vec![ids(&[2])])),
        None,
        None,
    ];
    let mut aliases = BTreeMap::new();
    aliases.insert("加法".to_string(), vec![2, 3]);

    RawCrate {
        doc: "Identifiers in other scripts".to_string(),
        t: "KMHQQHHKI".to_string(),
        n: ["加法", "加上", "add", "add", "中文名称的加法宏", "中文名称的加法API", "总计", "可迭代", "可选"]
            .map(String::from)
            .to_vec(),
        // associated items keep their module path; the trait is the parent
        q: vec![(0, CRATE.to_string())],
        i: vec![0, 1, 0, 0, 0, 0, 0, 0, 0],
        p: vec![
            RawPath::WithPath(10, "加法".to_string(), 0),
            RawPath::WithPath(10, "可迭代".to_string(), 0),
            RawPath::WithPath(8, "可选".to_string(), 0),
        ],
        d: shard_lengths(&[3]),
        e: roaring_base64(&[2, 3, 4, 5, 6, 8, 9]),
        f: vlq_stream(&signatures),
        a: aliases,
        ..RawCrate::default()
    }
}

pub fn non_english_file() -> IndexFile {
    let mut descriptions = BTreeMap::new();
    descriptions.insert(
        CRATE.to_string(),
        vec![vec![
            "Identifiers in other scripts".to_string(),
            "Add".to_string(),
            "“sum”".to_string(),
        ]],
    );
    IndexFile {
        crates: RawSearchIndex(vec![(CRATE.to_string(), non_english_crate())]),
        descriptions,
    }
}

/// Writes `file` as JSON under `dir`.
pub fn write_index_file(dir: &Path, name: &str, file: &IndexFile) -> PathBuf {
    let path = dir.join(name);
    let json = serde_json::to_vec(file).expect("serialize index file");
    std::fs::write(&path, json).expect("write index file");
    path
}

#[fixture]
pub fn non_english() -> LoadedIndex {
    rustdoc_search::tracing::init();
    let json = serde_json::to_vec(&non_english_file()).expect("serialize index file");
    parse_index_file(Path::new("non_english_identifier.json"), &json).expect("fixture builds")
}

/// A temporary directory holding `index.json`.
pub struct IndexDir {
    pub dir: TempDir,
    pub path: PathBuf,
}

#[fixture]
pub fn index_dir() -> IndexDir {
    rustdoc_search::tracing::init();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_index_file(dir.path(), "index.json", &non_english_file());
    IndexDir { dir, path }
}
