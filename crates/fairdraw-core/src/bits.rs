//! Compact bit sequences.
//!
//! A [`BitStream`] packs bits MSB-first into bytes and tracks its exact
//! length, so truncation and extension never disturb bits already written.
//! On the wire it is always a string of `'0'`/`'1'` characters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid bit character {found:?} at position {position}")]
pub struct ParseBitsError {
    pub position: usize,
    pub found: char,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BitStream {
    bytes: Vec<u8>,
    len: usize,
}

impl BitStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bits.div_ceil(8)),
            len: 0,
        }
    }

    /// All bits of `bytes`, MSB first.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            len: bytes.len() * 8,
        }
    }

    /// Keep only `'0'` and `'1'` characters from `text`, ignoring the rest.
    /// Used for uploaded files and free-form input.
    pub fn from_text_lenient(text: &str) -> Self {
        text.chars()
            .filter_map(|c| match c {
                '0' => Some(false),
                '1' => Some(true),
                _ => None,
            })
            .collect()
    }

    /// Build from a slice of 0/1 values; any non-zero value is a one.
    pub fn from_bit_slice(bits: &[u8]) -> Self {
        bits.iter().map(|&b| b != 0).collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<bool> {
        (index < self.len).then(|| self.bytes[index / 8] & (0x80 >> (index % 8)) != 0)
    }

    pub fn push(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 0x80 >> (self.len % 8);
        }
        self.len += 1;
    }

    /// Append every bit of `bytes`, MSB first.
    pub fn extend_from_bytes(&mut self, bytes: &[u8]) {
        if self.len % 8 == 0 {
            self.bytes.extend_from_slice(bytes);
            self.len += bytes.len() * 8;
            return;
        }
        for &byte in bytes {
            for shift in (0..8).rev() {
                self.push((byte >> shift) & 1 == 1);
            }
        }
    }

    pub fn append(&mut self, other: &BitStream) {
        if self.len % 8 == 0 {
            self.bytes.extend_from_slice(&other.bytes);
            self.len += other.len;
        } else {
            self.extend(other.iter());
        }
    }

    /// Shorten to `len` bits. Does nothing if already shorter.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        self.len = len;
        self.bytes.truncate(len.div_ceil(8));
        let tail = len % 8;
        if tail != 0 {
            if let Some(last) = self.bytes.last_mut() {
                *last &= 0xFFu8 << (8 - tail);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.bytes[i / 8] & (0x80 >> (i % 8)) != 0)
    }

    pub fn count_ones(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// One byte per bit, each 0 or 1; the layout the test battery consumes.
    pub fn to_bit_vec(&self) -> Vec<u8> {
        self.iter().map(u8::from).collect()
    }

    /// Packed bytes; the final byte is zero-padded when `len` is not a
    /// multiple of eight.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for BitStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: String = self.iter().map(|b| if b { '1' } else { '0' }).collect();
        f.write_str(&s)
    }
}

impl FromStr for BitStream {
    type Err = ParseBitsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = Self::with_capacity(s.len());
        for (position, c) in s.chars().enumerate() {
            match c {
                '0' => out.push(false),
                '1' => out.push(true),
                found => return Err(ParseBitsError { position, found }),
            }
        }
        Ok(out)
    }
}

impl FromIterator<bool> for BitStream {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut out = Self::new();
        out.extend(iter);
        out
    }
}

impl Extend<bool> for BitStream {
    fn extend<I: IntoIterator<Item = bool>>(&mut self, iter: I) {
        for bit in iter {
            self.push(bit);
        }
    }
}

impl From<BitStream> for String {
    fn from(bits: BitStream) -> Self {
        bits.to_string()
    }
}

impl TryFrom<String> for BitStream {
    type Error = ParseBitsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_display() {
        let mut bits = BitStream::new();
        for b in [true, false, true, true, false, false, true, false, true] {
            bits.push(b);
        }
        assert_eq!(bits.len(), 9);
        assert_eq!(bits.to_string(), "101100101");
        assert_eq!(bits.as_bytes(), &[0b1011_0010, 0b1000_0000]);
    }

    #[test]
    fn test_from_bytes_msb_first() {
        let bits = BitStream::from_bytes(&[0xA5]);
        assert_eq!(bits.to_string(), "10100101");
        assert_eq!(bits.count_ones(), 4);
    }

    #[test]
    fn test_parse_rejects_other_characters() {
        let err = "0102".parse::<BitStream>().unwrap_err();
        assert_eq!(err.position, 2);
        assert_eq!(err.found, '2');
    }

    #[test]
    fn test_lenient_keeps_only_bits() {
        let bits = BitStream::from_text_lenient("01 10\n1x0");
        assert_eq!(bits.to_string(), "011010");
    }

    #[test]
    fn test_truncate_clears_tail() {
        let mut bits = BitStream::from_bytes(&[0xFF, 0xFF]);
        bits.truncate(10);
        assert_eq!(bits.len(), 10);
        assert_eq!(bits.as_bytes(), &[0xFF, 0b1100_0000]);
        assert_eq!(bits.count_ones(), 10);
        // Extension after truncation must not resurrect cleared bits.
        bits.push(false);
        assert_eq!(bits.to_string(), "11111111110");
    }

    #[test]
    fn test_truncate_longer_is_noop() {
        let mut bits: BitStream = "101".parse().unwrap();
        bits.truncate(8);
        assert_eq!(bits.to_string(), "101");
    }

    #[test]
    fn test_append_unaligned() {
        let mut a: BitStream = "101".parse().unwrap();
        let b = BitStream::from_bytes(&[0x0F]);
        a.append(&b);
        assert_eq!(a.to_string(), "10100001111");
        a.extend_from_bytes(&[0x80]);
        assert_eq!(a.len(), 19);
        assert_eq!(a.get(11), Some(true));
        assert_eq!(a.get(19), None);
    }

    #[test]
    fn test_serde_as_string() {
        let bits: BitStream = "0011".parse().unwrap();
        let json = serde_json::to_string(&bits).unwrap();
        assert_eq!(json, "\"0011\"");
        let back: BitStream = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bits);
        assert!(serde_json::from_str::<BitStream>("\"01a\"").is_err());
    }

    #[test]
    fn test_bit_vec_layout() {
        let bits: BitStream = "1001".parse().unwrap();
        assert_eq!(bits.to_bit_vec(), vec![1, 0, 0, 1]);
        assert_eq!(BitStream::from_bit_slice(&[1, 0, 0, 1]), bits);
    }
}
