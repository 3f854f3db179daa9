// Blackbox
// Copyright (c) 2026 The Blackbox Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `config` module defines the immutable configuration table the decoder consumes: the sync
//! pattern, the reserved FORMAT record parameters, the format-character table, and the field
//! scaling sets.

use std::collections::{BTreeMap, BTreeSet};

use crate::defs::FieldType;

/// Byte layout of the fixed-size FORMAT frame, offsets relative to the frame start.
///
/// The conventional frame is `<2 B sync, 1 B type id, 1 B msg_type, 1 B length, 4 B name,
/// 16 B format, 64 B columns>`.
#[derive(Clone, Copy, Debug)]
pub struct FmtFrameLayout {
    /// Offset of the described record type id.
    pub msg_type: usize,
    /// Offset of the described record's total wire length.
    pub length: usize,
    /// Offset and size of the NUL-padded record name.
    pub name: (usize, usize),
    /// Offset and size of the NUL-padded format string.
    pub format: (usize, usize),
    /// Offset and size of the NUL-padded comma-separated column names.
    pub columns: (usize, usize),
}

impl Default for FmtFrameLayout {
    fn default() -> Self {
        FmtFrameLayout {
            msg_type: 3,
            length: 4,
            name: (5, 4),
            format: (9, 16),
            columns: (25, 64),
        }
    }
}

/// `LogConfig` is the configuration table for a log decode session.
///
/// All knowledge about the wire protocol that is not learned from the log itself lives here: the
/// record sync pattern, the reserved FORMAT record type id and frame length, the mapping from
/// format characters to fixed-width wire types, and the field-level scaling rules. A default
/// `LogConfig` carries the conventional ArduPilot values.
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// The 2-byte pattern introducing every record.
    pub sync: [u8; 2],
    /// The reserved type id of FORMAT records.
    pub fmt_type: u8,
    /// The fixed total wire length of a FORMAT frame, including the 3-byte header.
    pub fmt_frame_len: usize,
    /// Mapping from format character to fixed-width wire type.
    pub field_types: BTreeMap<char, FieldType>,
    /// Format characters whose integer value is reinterpreted as a float via division by 100.
    pub scaled_chars: BTreeSet<char>,
    /// The format character holding a latitude/longitude as a 1e-7-scaled integer.
    pub latlon_char: char,
    /// Column names whose raw bytes are emitted verbatim, without NUL stripping or ASCII
    /// conversion. Applies to `Char64` fields only.
    pub passthrough_columns: BTreeSet<String>,
    /// Byte layout of the FORMAT frame.
    pub fmt_layout: FmtFrameLayout,
}

impl LogConfig {
    /// Get the wire type for a format character, if the character is known.
    pub fn field_type(&self, ch: char) -> Option<FieldType> {
        self.field_types.get(&ch).copied()
    }

    /// Query whether a format character denotes a centi-scaled integer.
    pub fn is_scaled(&self, ch: char) -> bool {
        self.scaled_chars.contains(&ch)
    }

    /// Query whether a column's raw bytes must be passed through untouched.
    pub fn is_passthrough(&self, column: &str) -> bool {
        self.passthrough_columns.contains(column)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        let field_types = [
            ('a', FieldType::I16x32),
            ('b', FieldType::I8),
            ('B', FieldType::U8),
            ('h', FieldType::I16),
            ('H', FieldType::U16),
            ('i', FieldType::I32),
            ('I', FieldType::U32),
            ('q', FieldType::I64),
            ('Q', FieldType::U64),
            ('f', FieldType::F32),
            ('d', FieldType::F64),
            ('c', FieldType::I16),
            ('C', FieldType::U16),
            ('e', FieldType::I32),
            ('E', FieldType::U32),
            ('L', FieldType::I32),
            ('M', FieldType::U8),
            ('n', FieldType::Char4),
            ('N', FieldType::Char16),
            ('Z', FieldType::Char64),
        ]
        .into_iter()
        .collect();

        LogConfig {
            sync: [0xa3, 0x95],
            fmt_type: 0x80,
            fmt_frame_len: 89,
            field_types,
            scaled_chars: ['c', 'C', 'e', 'E'].into_iter().collect(),
            latlon_char: 'L',
            passthrough_columns: ["Data", "Blob", "Payload"].into_iter().map(String::from).collect(),
            fmt_layout: FmtFrameLayout::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_default_field_types() {
        let config = LogConfig::default();

        assert_eq!(config.field_type('B'), Some(FieldType::U8));
        assert_eq!(config.field_type('L'), Some(FieldType::I32));
        assert_eq!(config.field_type('Z'), Some(FieldType::Char64));
        assert_eq!(config.field_type('a'), Some(FieldType::I16x32));
        assert_eq!(config.field_type('x'), None);
    }

    #[test]
    fn verify_default_scaling_sets() {
        let config = LogConfig::default();

        for ch in ['c', 'C', 'e', 'E'] {
            assert!(config.is_scaled(ch));
        }
        assert!(!config.is_scaled('L'));
        assert_eq!(config.latlon_char, 'L');
        for column in ["Data", "Blob", "Payload"] {
            assert!(config.is_passthrough(column));
        }
        assert!(!config.is_passthrough("Message"));
    }
}
