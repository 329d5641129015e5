//! Read-only Roaring bitmaps in the portable serialization format.
//!
//! rustdoc ships the deprecated and empty-description sets of every crate as
//! base64 text holding this layout. Only membership tests are needed, so the
//! containers keep their serialized representation.

use crate::error::CorruptIndex;
use base64::{Engine as _, engine::general_purpose::STANDARD};

const COOKIE_WITH_RUNS: u8 = 0x3b;
const BITSET_THRESHOLD: usize = 4096;
const BITSET_BYTES: usize = 8192;
const OFFSET_TABLE_MIN_RUN_CONTAINERS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Container {
    /// `(start, length - 1)` pairs.
    Run(Vec<(u16, u16)>),
    /// Sorted low halves.
    Array(Vec<u16>),
    /// One bit per low half, little-endian bytes.
    Bits(Box<[u8]>),
}

impl Container {
    fn contains(&self, value: u16) -> bool {
        match self {
            Self::Run(runs) => runs.iter().any(|&(start, len_minus_one)| {
                value >= start && u32::from(value) <= u32::from(start) + u32::from(len_minus_one)
            }),
            Self::Array(values) => values.contains(&value),
            Self::Bits(bits) => bits[usize::from(value >> 3)] & (1 << (value & 7)) != 0,
        }
    }
}

/// A decoded bitmap supporting membership queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoaringBitmap {
    keys: Vec<u16>,
    containers: Vec<Container>,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], CorruptIndex> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + len)
            .ok_or(CorruptIndex::BitmapTruncated {
                offset: self.pos,
                needed: len,
            })?;
        self.pos += len;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, CorruptIndex> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, CorruptIndex> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

impl RoaringBitmap {
    /// Decodes base64 text. An empty string is the empty set.
    pub fn from_base64(text: &str) -> Result<Self, CorruptIndex> {
        if text.is_empty() {
            return Ok(Self::default());
        }
        let bytes = STANDARD
            .decode(text)
            .map_err(|e| CorruptIndex::Base64(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CorruptIndex> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        let mut cursor = Cursor { bytes, pos: 0 };
        let has_runs = bytes[0] == COOKIE_WITH_RUNS;
        let size = if has_runs {
            cursor.take(2)?;
            usize::from(cursor.u16()?) + 1
        } else {
            cursor.take(4)?;
            cursor.u32()? as usize
        };

        let run_flags = if has_runs {
            Some(cursor.take(size.div_ceil(8))?)
        } else {
            None
        };

        let mut keys = Vec::with_capacity(size);
        let mut cardinalities = Vec::with_capacity(size);
        for _ in 0..size {
            keys.push(cursor.u16()?);
            cardinalities.push(usize::from(cursor.u16()?) + 1);
        }

        let offsets = if !has_runs || size >= OFFSET_TABLE_MIN_RUN_CONTAINERS {
            let mut offsets = Vec::with_capacity(size);
            for _ in 0..size {
                offsets.push(cursor.u32()? as usize);
            }
            Some(offsets)
        } else {
            None
        };

        let mut containers = Vec::with_capacity(size);
        for (j, &cardinality) in cardinalities.iter().enumerate() {
            if let Some(offsets) = &offsets
                && offsets[j] != cursor.pos
            {
                return Err(CorruptIndex::BitmapOffset {
                    container: j,
                    cursor: cursor.pos,
                    expected: offsets[j],
                });
            }
            let is_run = run_flags.is_some_and(|flags| flags[j >> 3] & (1 << (j & 7)) != 0);
            let container = if is_run {
                let run_count = usize::from(cursor.u16()?);
                let mut runs = Vec::with_capacity(run_count);
                for _ in 0..run_count {
                    runs.push((cursor.u16()?, cursor.u16()?));
                }
                Container::Run(runs)
            } else if cardinality >= BITSET_THRESHOLD {
                Container::Bits(cursor.take(BITSET_BYTES)?.into())
            } else {
                let mut values = Vec::with_capacity(cardinality);
                for _ in 0..cardinality {
                    values.push(cursor.u16()?);
                }
                Container::Array(values)
            };
            containers.push(container);
        }

        Ok(Self { keys, containers })
    }

    pub fn contains(&self, value: u32) -> bool {
        let key = (value >> 16) as u16;
        let low = (value & 0xFFFF) as u16;
        self.keys
            .iter()
            .position(|&k| k == key)
            .is_some_and(|i| self.containers[i].contains(low))
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
