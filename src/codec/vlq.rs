//! Variable-length hex decoding.
//!
//! Each number is a run of 4-bit nibbles, most significant first. Nibbles are
//! carried in the low bits of printable characters: characters below '`' are
//! continuation digits, a character at or above '`' is the final digit. The low
//! bit of the assembled magnitude is the sign.
//!
//! Top-level values may be replaced by a single character in `'0'..='?'`, which
//! refers back to one of the last [`BACKREF_WINDOW`] values produced. The
//! character '`' alone stands for the constructor's zero value and is not
//! remembered.

use crate::error::CorruptIndex;
use std::collections::VecDeque;

/// Number of decoded values a backreference can reach.
pub const BACKREF_WINDOW: usize = 16;

const LIST_OPEN: u8 = b'{';
const LIST_CLOSE: u8 = b'}';
const ZERO_SENTINEL: u8 = b'`';
const BACKREF_BASE: u8 = b'0';
const BACKREF_END: u8 = b'@';

/// A value as it appears in the stream, before the caller gives it meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Int(i32),
    List(Vec<RawValue>),
}

impl RawValue {
    pub const fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(n) => Some(*n),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            Self::Int(_) => None,
        }
    }
}

/// Lazily decodes a stream of top-level values, handing each to `cons`.
///
/// The iterator ends when the input is exhausted; decoding errors are yielded
/// as items so the caller decides whether they are fatal.
pub struct VlqHexDecoder<'a, T, F> {
    input: &'a [u8],
    offset: usize,
    cons: F,
    backrefs: VecDeque<T>,
}

impl<T, F> std::fmt::Debug for VlqHexDecoder<'_, T, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VlqHexDecoder")
            .field("len", &self.input.len())
            .field("offset", &self.offset)
            .field("backrefs", &self.backrefs.len())
            .finish()
    }
}

impl<'a, T, F> VlqHexDecoder<'a, T, F>
where
    T: Clone,
    F: FnMut(RawValue) -> Result<T, CorruptIndex>,
{
    pub fn new(input: &'a str, cons: F) -> Self {
        Self {
            input: input.as_bytes(),
            offset: 0,
            cons,
            backrefs: VecDeque::with_capacity(BACKREF_WINDOW + 1),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Decodes the next value, treating end of input as corruption.
    pub fn next_required(&mut self) -> Result<T, CorruptIndex> {
        self.next().unwrap_or(Err(CorruptIndex::UnexpectedEnd {
            offset: self.offset,
        }))
    }

    fn read_top_level(&mut self, c: u8) -> Result<T, CorruptIndex> {
        if c < BACKREF_END {
            let offset = self.offset;
            self.offset += 1;
            let index = usize::from(c.wrapping_sub(BACKREF_BASE));
            return self
                .backrefs
                .get(index)
                .cloned()
                .ok_or(CorruptIndex::BadBackref {
                    index,
                    offset,
                    len: self.backrefs.len(),
                });
        }
        if c == ZERO_SENTINEL {
            self.offset += 1;
            return (self.cons)(RawValue::Int(0));
        }
        let raw = self.decode()?;
        let value = (self.cons)(raw)?;
        self.backrefs.push_front(value.clone());
        if self.backrefs.len() > BACKREF_WINDOW {
            self.backrefs.pop_back();
        }
        Ok(value)
    }

    fn decode(&mut self) -> Result<RawValue, CorruptIndex> {
        match self.input.get(self.offset) {
            None => Err(CorruptIndex::UnexpectedEnd {
                offset: self.offset,
            }),
            Some(&LIST_OPEN) => self.decode_list().map(RawValue::List),
            Some(_) => self.decode_int().map(RawValue::Int),
        }
    }

    fn decode_list(&mut self) -> Result<Vec<RawValue>, CorruptIndex> {
        let start = self.offset;
        self.offset += 1;
        let mut items = Vec::new();
        loop {
            match self.input.get(self.offset) {
                None => return Err(CorruptIndex::UnterminatedList { offset: start }),
                Some(&LIST_CLOSE) => {
                    self.offset += 1;
                    return Ok(items);
                }
                Some(_) => items.push(self.decode()?),
            }
        }
    }

    fn decode_int(&mut self) -> Result<i32, CorruptIndex> {
        let mut n: u32 = 0;
        loop {
            let Some(&c) = self.input.get(self.offset) else {
                return Err(CorruptIndex::UnexpectedEnd {
                    offset: self.offset,
                });
            };
            if c == LIST_OPEN || c == LIST_CLOSE {
                return Err(CorruptIndex::Malformed {
                    what: "integer interrupted by a list delimiter",
                });
            }
            n = (n << 4) | u32::from(c & 0xF);
            self.offset += 1;
            if c >= ZERO_SENTINEL {
                break;
            }
        }
        let negative = n & 1 == 1;
        let magnitude = (n as i32) >> 1;
        Ok(if negative {
            magnitude.wrapping_neg()
        } else {
            magnitude
        })
    }
}

impl<T, F> Iterator for VlqHexDecoder<'_, T, F>
where
    T: Clone,
    F: FnMut(RawValue) -> Result<T, CorruptIndex>,
{
    type Item = Result<T, CorruptIndex>;

    fn next(&mut self) -> Option<Self::Item> {
        let &c = self.input.get(self.offset)?;
        Some(self.read_top_level(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::rstest;

    fn identity(raw: RawValue) -> Result<RawValue, CorruptIndex> {
        Ok(raw)
    }

    fn decode_all(input: &str) -> Result<Vec<RawValue>, CorruptIndex> {
        VlqHexDecoder::new(input, identity).collect()
    }

    #[rstest]
    #[case("a", 0)]
    #[case("b", 1)]
    #[case("c", -1)]
    #[case("j", 5)]
    #[case("A`", 8)]
    #[case("Ac", -9)]
    #[case("OOn", 2047)]
    #[case("OOo", -2047)]
    fn decodes_scalars(#[case] input: &str, #[case] expected: i32) {
        let_assert!(Ok(values) = decode_all(input));
        check!(values == vec![RawValue::Int(expected)]);
    }

    #[test]
    fn decodes_nested_lists() {
        let_assert!(Ok(values) = decode_all("{b{cj}}"));
        check!(
            values
                == vec![RawValue::List(vec![
                    RawValue::Int(1),
                    RawValue::List(vec![RawValue::Int(-1), RawValue::Int(5)]),
                ])]
        );
    }

    #[test]
    fn zero_sentinel_uses_constructor_and_skips_window() {
        let mut seen = Vec::new();
        let decoder = VlqHexDecoder::new("b`0", |raw| {
            seen.push(raw.clone());
            Ok(raw)
        });
        let_assert!(Ok(values) = decoder.collect::<Result<Vec<_>, _>>());
        // the backreference resolves to `1`, not to the sentinel
        check!(values == vec![RawValue::Int(1), RawValue::Int(0), RawValue::Int(1)]);
        check!(seen == vec![RawValue::Int(1), RawValue::Int(0)]);
    }

    #[test]
    fn backreferences_count_from_most_recent() {
        let_assert!(Ok(values) = decode_all("bdf012"));
        let ints: Vec<_> = values.iter().filter_map(RawValue::as_int).collect();
        check!(ints == vec![1, 2, 3, 3, 2, 1]);
    }

    fn encode(value: i32) -> String {
        let mut n = if value < 0 {
            (value.unsigned_abs() << 1) | 1
        } else {
            value.unsigned_abs() << 1
        };
        let mut digits = Vec::new();
        loop {
            digits.push((n & 0xF) as u8);
            n >>= 4;
            if n == 0 {
                break;
            }
        }
        digits.reverse();
        let last = digits.len() - 1;
        digits
            .iter()
            .enumerate()
            .map(|(i, d)| char::from(if i == last { b'`' | d } else { b'@' | d }))
            .collect()
    }

    #[test]
    fn window_evicts_oldest_value() {
        let mut input: String = (1..=17).map(encode).collect();
        input.push('?');
        let_assert!(Ok(values) = decode_all(&input));
        check!(values.len() == 18);
        // slot 15 now holds the second value; the first fell out of the window
        check!(values[17] == RawValue::Int(2));
    }

    #[rstest]
    #[case(-300)]
    #[case(4096)]
    #[case(123_456)]
    fn multi_digit_values_decode(#[case] value: i32) {
        let_assert!(Ok(values) = decode_all(&encode(value)));
        check!(values == vec![RawValue::Int(value)]);
    }

    #[rstest]
    #[case("0")]
    #[case("b1")]
    fn backreference_outside_window_is_corruption(#[case] input: &str) {
        let_assert!(Err(CorruptIndex::BadBackref { .. }) = decode_all(input));
    }

    #[test]
    fn unterminated_list_is_corruption() {
        let_assert!(Err(CorruptIndex::UnterminatedList { offset: 0 }) = decode_all("{bc"));
    }

    #[test]
    fn truncated_number_is_corruption() {
        let_assert!(Err(CorruptIndex::UnexpectedEnd { .. }) = decode_all("AB"));
    }

    #[test]
    fn next_required_reports_exhaustion() {
        let mut decoder = VlqHexDecoder::new("b", identity);
        let_assert!(Ok(RawValue::Int(1)) = decoder.next_required());
        let_assert!(Err(CorruptIndex::UnexpectedEnd { offset: 1 }) = decoder.next_required());
    }
}
