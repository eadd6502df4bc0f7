// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Solax automation.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use solax_types::{InverterMode, ManualSubMode, WireEnum};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("expected {expected} words, got {actual}")]
    WordCount { expected: usize, actual: usize },

    #[error("ordinal {ordinal} is out of range for {name}")]
    Ordinal { name: &'static str, ordinal: u16 },
}

/// Semantic type carried by a register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Int,
    Pair,
    Bool,
    Enum(&'static str),
}

/// Conversion between a Rust value and raw register words
pub trait RegisterValue: Sized {
    const KIND: ValueKind;

    fn decode(words: &[u16]) -> Result<Self, CodecError>;

    /// Encoded words, sized to `count` where the type allows variable length
    fn encode(&self, count: u16) -> Vec<u16>;
}

fn expect_len(words: &[u16], expected: usize) -> Result<(), CodecError> {
    if words.len() < expected {
        return Err(CodecError::WordCount {
            expected,
            actual: words.len(),
        });
    }
    Ok(())
}

fn low_word(value: i32) -> u16 {
    u16::try_from(value & 0xFFFF).unwrap_or_default()
}

/// Each word carries two 8-bit character codes, high byte first.
/// Trailing NULs and padding spaces are dropped.
impl RegisterValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn decode(words: &[u16]) -> Result<Self, CodecError> {
        let text: String = words
            .iter()
            .flat_map(|w| w.to_be_bytes())
            .map(char::from)
            .collect();
        Ok(text.trim_end_matches(['\0', ' ']).to_owned())
    }

    /// One character code per word, zero-padded or truncated to `count`
    fn encode(&self, count: u16) -> Vec<u16> {
        let mut words: Vec<u16> = self
            .bytes()
            .take(usize::from(count))
            .map(u16::from)
            .collect();
        words.resize(usize::from(count), 0);
        words
    }
}

/// Signed 16-bit value widened to `i32`
impl RegisterValue for i32 {
    const KIND: ValueKind = ValueKind::Int;

    fn decode(words: &[u16]) -> Result<Self, CodecError> {
        expect_len(words, 1)?;
        Ok(i32::from(i16::from_be_bytes(words[0].to_be_bytes())))
    }

    fn encode(&self, _count: u16) -> Vec<u16> {
        vec![low_word(*self)]
    }
}

impl RegisterValue for [u16; 2] {
    const KIND: ValueKind = ValueKind::Pair;

    fn decode(words: &[u16]) -> Result<Self, CodecError> {
        expect_len(words, 2)?;
        Ok([words[0], words[1]])
    }

    fn encode(&self, _count: u16) -> Vec<u16> {
        self.to_vec()
    }
}

impl RegisterValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn decode(words: &[u16]) -> Result<Self, CodecError> {
        expect_len(words, 1)?;
        Ok(words[0] != 0)
    }

    fn encode(&self, _count: u16) -> Vec<u16> {
        vec![u16::from(*self)]
    }
}

fn decode_enum<E: WireEnum>(words: &[u16]) -> Result<E, CodecError> {
    expect_len(words, 1)?;
    E::from_ordinal(words[0]).ok_or(CodecError::Ordinal {
        name: E::NAME,
        ordinal: words[0],
    })
}

impl RegisterValue for InverterMode {
    const KIND: ValueKind = ValueKind::Enum(Self::NAME);

    fn decode(words: &[u16]) -> Result<Self, CodecError> {
        decode_enum(words)
    }

    fn encode(&self, _count: u16) -> Vec<u16> {
        vec![self.ordinal()]
    }
}

impl RegisterValue for ManualSubMode {
    const KIND: ValueKind = ValueKind::Enum(Self::NAME);

    fn decode(words: &[u16]) -> Result<Self, CodecError> {
        decode_enum(words)
    }

    fn encode(&self, _count: u16) -> Vec<u16> {
        vec![self.ordinal()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_serial_number() {
        // "H34A10I1234567"
        let words = [0x4833, 0x3441, 0x3130, 0x4931, 0x3233, 0x3435, 0x3637];
        assert_eq!(String::decode(&words).unwrap(), "H34A10I1234567");

        let padded = [0x4142, 0x4300, 0x0000];
        assert_eq!(String::decode(&padded).unwrap(), "ABC");
    }

    #[test]
    fn test_encode_string_pads_and_truncates() {
        assert_eq!("AB".to_owned().encode(4), vec![0x41, 0x42, 0, 0]);
        assert_eq!("ABCDEF".to_owned().encode(3), vec![0x41, 0x42, 0x43]);
    }

    #[test]
    fn test_int_is_signed_16_bit() {
        assert_eq!(i32::decode(&[0x0190]).unwrap(), 400);
        assert_eq!(i32::decode(&[0xFFFF]).unwrap(), -1);
        assert_eq!((-1_i32).encode(1), vec![0xFFFF]);
        assert_eq!(2014_i32.encode(1), vec![2014]);
        assert_eq!(0x1_0005_i32.encode(1), vec![5]);
    }

    #[test]
    fn test_pair_is_unsigned() {
        assert_eq!(<[u16; 2]>::decode(&[0xFFFF, 12]).unwrap(), [65535, 12]);
        assert_eq!(
            <[u16; 2]>::decode(&[1]),
            Err(CodecError::WordCount {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_bool() {
        assert!(bool::decode(&[1]).unwrap());
        assert!(!bool::decode(&[0]).unwrap());
        assert_eq!(true.encode(1), vec![1]);
    }

    #[test]
    fn test_enum_ordinals() {
        assert_eq!(InverterMode::decode(&[1]).unwrap(), InverterMode::FeedInPriority);
        assert_eq!(InverterMode::Manual.encode(1), vec![3]);
        assert_eq!(ManualSubMode::ForceDischarge.encode(1), vec![2]);
    }

    #[test]
    fn test_out_of_range_ordinal_is_error() {
        assert_eq!(
            InverterMode::decode(&[7]),
            Err(CodecError::Ordinal {
                name: "InverterMode",
                ordinal: 7
            })
        );
        assert!(ManualSubMode::decode(&[3]).is_err());
        assert!(InverterMode::decode(&[]).is_err());
    }
}
