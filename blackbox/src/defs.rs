// Blackbox
// Copyright (c) 2026 The Blackbox Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `defs` module implements the format dictionary: per-record-type layout definitions learned
//! from FORMAT frames, the precomputed field extractors derived from them, and the plain-data
//! snapshot form used to hand a dictionary to an isolated worker.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::LogConfig;
use crate::errors::{decode_error, Result};
use crate::io::SliceReader;
use crate::record::Value;

/// A fixed-width on-wire field type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// A 4-byte NUL-padded character field.
    Char4,
    /// A 16-byte NUL-padded character field.
    Char16,
    /// A 64-byte NUL-padded character field.
    Char64,
    /// A fixed array of 32 little-endian signed 16-bit integers.
    I16x32,
}

impl FieldType {
    /// The number of bytes the field occupies on the wire.
    pub fn wire_size(&self) -> usize {
        match *self {
            FieldType::I8 | FieldType::U8 => 1,
            FieldType::I16 | FieldType::U16 => 2,
            FieldType::I32 | FieldType::U32 | FieldType::F32 => 4,
            FieldType::I64 | FieldType::U64 | FieldType::F64 => 8,
            FieldType::Char4 => 4,
            FieldType::Char16 => 16,
            FieldType::Char64 => 64,
            FieldType::I16x32 => 64,
        }
    }
}

/// The scaling rule applied to an integer field after extraction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Scale {
    /// Emit the integer unchanged.
    None,
    /// Emit the integer divided by 100 as a float.
    Centi,
    /// Emit the integer divided by 1e7 as a float (latitude/longitude).
    LatLon,
}

/// A precomputed extractor for one field of a record payload.
#[derive(Clone, Copy, Debug)]
struct FieldCodec {
    ty: FieldType,
    scale: Scale,
    /// Emit the raw bytes of a character field verbatim.
    passthrough: bool,
}

impl FieldCodec {
    fn extract(&self, reader: &mut SliceReader<'_>) -> Result<Value> {
        let value = match self.ty {
            FieldType::I8 => self.scale_signed(i64::from(reader.read_i8()?)),
            FieldType::U8 => self.scale_unsigned(u64::from(reader.read_u8()?)),
            FieldType::I16 => self.scale_signed(i64::from(reader.read_i16()?)),
            FieldType::U16 => self.scale_unsigned(u64::from(reader.read_u16()?)),
            FieldType::I32 => self.scale_signed(i64::from(reader.read_i32()?)),
            FieldType::U32 => self.scale_unsigned(u64::from(reader.read_u32()?)),
            FieldType::I64 => self.scale_signed(reader.read_i64()?),
            FieldType::U64 => self.scale_unsigned(reader.read_u64()?),
            FieldType::F32 => Value::from(reader.read_f32()?),
            FieldType::F64 => Value::from(reader.read_f64()?),
            FieldType::Char4 | FieldType::Char16 | FieldType::Char64 => {
                let bytes = reader.read_buf_bytes_ref(self.ty.wire_size())?;

                if self.passthrough {
                    Value::from(bytes)
                }
                else {
                    Value::from(decode_text_field(bytes))
                }
            }
            FieldType::I16x32 => {
                let mut ints = Vec::with_capacity(32);
                for _ in 0..32 {
                    ints.push(i64::from(reader.read_i16()?));
                }
                Value::Array(ints.into_boxed_slice())
            }
        };

        Ok(value)
    }

    fn scale_signed(&self, raw: i64) -> Value {
        match self.scale {
            Scale::None => Value::from(raw),
            Scale::Centi => Value::from(raw as f64 / 100.0),
            Scale::LatLon => Value::from(raw as f64 / 1e7),
        }
    }

    fn scale_unsigned(&self, raw: u64) -> Value {
        match self.scale {
            Scale::None => Value::from(raw),
            Scale::Centi => Value::from(raw as f64 / 100.0),
            Scale::LatLon => Value::from(raw as f64 / 1e7),
        }
    }
}

/// A `RecordLayout` is the precomputed batch extractor for a whole record payload.
///
/// Compiled once per format definition, it unpacks every field of a payload in a single
/// left-to-right pass.
#[derive(Debug)]
pub struct RecordLayout {
    codecs: Vec<FieldCodec>,
    wire_size: usize,
}

impl RecordLayout {
    /// Compile a layout from a format string and its column names.
    ///
    /// Fails if any format character is absent from the configuration's format-character table.
    fn compile(config: &LogConfig, format: &str, columns: &[Arc<str>]) -> Result<RecordLayout> {
        let mut codecs = Vec::with_capacity(columns.len());
        let mut wire_size = 0;

        for (ch, column) in format.chars().zip(columns) {
            let ty = match config.field_type(ch) {
                Some(ty) => ty,
                None => return decode_error("fmt: unknown format character"),
            };

            let scale = if config.is_scaled(ch) {
                Scale::Centi
            }
            else if ch == config.latlon_char {
                Scale::LatLon
            }
            else {
                Scale::None
            };

            let passthrough = ty == FieldType::Char64 && config.is_passthrough(column);

            codecs.push(FieldCodec { ty, scale, passthrough });
            wire_size += ty.wire_size();
        }

        Ok(RecordLayout { codecs, wire_size })
    }

    /// The number of payload bytes the layout consumes.
    pub fn wire_size(&self) -> usize {
        self.wire_size
    }

    /// Unpack every field of `payload` in declaration order.
    pub fn unpack(&self, payload: &[u8]) -> Result<Vec<Value>> {
        let mut reader = SliceReader::new(payload);
        let mut values = Vec::with_capacity(self.codecs.len());

        for codec in &self.codecs {
            values.push(codec.extract(&mut reader)?);
        }

        Ok(values)
    }
}

/// Decode a NUL-padded text field: trailing NULs are stripped, non-ASCII bytes are dropped.
fn decode_text_field(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |idx| idx + 1);

    bytes[..end].iter().filter(|b| b.is_ascii()).map(|&b| char::from(b)).collect()
}

/// A `FormatDef` is the decoded, compiled definition of one record type.
#[derive(Clone, Debug)]
pub struct FormatDef {
    name: Arc<str>,
    length: usize,
    format: Arc<str>,
    columns: Arc<[Arc<str>]>,
    layout: Arc<RecordLayout>,
}

impl FormatDef {
    /// Compile a definition from the fields of a FORMAT frame.
    ///
    /// The name, format string, and column list must be non-empty, the format string and column
    /// list must have equal lengths, every format character must be known to the configuration,
    /// and the declared length must cover at least the record header.
    pub fn compile(
        config: &LogConfig,
        name: &str,
        length: usize,
        format: &str,
        columns: Vec<String>,
    ) -> Result<FormatDef> {
        if name.is_empty() {
            return decode_error("fmt: empty record name");
        }
        if format.is_empty() || columns.is_empty() {
            return decode_error("fmt: empty format or column list");
        }
        if format.chars().count() != columns.len() {
            return decode_error("fmt: format and column counts differ");
        }
        if length < 3 {
            return decode_error("fmt: record length below header size");
        }

        let columns: Arc<[Arc<str>]> = columns.into_iter().map(Arc::from).collect();

        let layout = RecordLayout::compile(config, format, &columns)?;

        Ok(FormatDef {
            name: Arc::from(name),
            length,
            format: Arc::from(format),
            columns,
            layout: Arc::new(layout),
        })
    }

    /// The record type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The total wire length of a record of this type, including the 3-byte header.
    pub fn length(&self) -> usize {
        self.length
    }

    /// The format string.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// The column names in declaration order.
    pub fn columns(&self) -> &[Arc<str>] {
        &self.columns
    }

    /// The precomputed payload extractor.
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }
}

/// The plain-data form of a format definition.
///
/// A snapshot carries no compiled layout and can therefore cross into an isolated worker, which
/// recompiles the layout from the format string on its own side.
#[derive(Clone, Debug)]
pub struct FormatSnapshot {
    pub type_id: u8,
    pub name: String,
    pub length: usize,
    pub format: String,
    pub columns: Vec<String>,
}

/// A `FormatTable` maps record type ids to their compiled format definitions.
///
/// The table starts empty at session open and grows as FORMAT frames are decoded. A later FORMAT
/// frame for an already-known type id replaces the earlier definition.
#[derive(Clone, Debug, Default)]
pub struct FormatTable {
    defs: BTreeMap<u8, FormatDef>,
}

impl FormatTable {
    /// Get the definition for a record type id.
    pub fn get(&self, type_id: u8) -> Option<&FormatDef> {
        self.defs.get(&type_id)
    }

    /// Install a definition, replacing any earlier definition for the same type id.
    pub fn insert(&mut self, type_id: u8, def: FormatDef) {
        self.defs.insert(type_id, def);
    }

    /// The number of installed definitions.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Iterate the installed definitions in ascending type-id order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &FormatDef)> {
        self.defs.iter().map(|(&id, def)| (id, def))
    }

    /// Export the table as plain data for transfer to an isolated worker.
    pub fn snapshot(&self) -> Vec<FormatSnapshot> {
        self.defs
            .iter()
            .map(|(&type_id, def)| FormatSnapshot {
                type_id,
                name: def.name().to_string(),
                length: def.length(),
                format: def.format().to_string(),
                columns: def.columns().iter().map(|c| c.to_string()).collect(),
            })
            .collect()
    }

    /// Rebuild a table from plain data, recompiling every layout.
    pub fn from_snapshot(config: &LogConfig, snapshot: &[FormatSnapshot]) -> Result<FormatTable> {
        let mut table = FormatTable::default();

        for entry in snapshot {
            let def = FormatDef::compile(
                config,
                &entry.name,
                entry.length,
                &entry.format,
                entry.columns.clone(),
            )?;
            table.insert(entry.type_id, def);
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn verify_compile_rejections() {
        let config = LogConfig::default();

        assert!(FormatDef::compile(&config, "", 10, "B", columns(&["A"])).is_err());
        assert!(FormatDef::compile(&config, "GPS", 10, "", columns(&["A"])).is_err());
        assert!(FormatDef::compile(&config, "GPS", 10, "B", Vec::new()).is_err());
        assert!(FormatDef::compile(&config, "GPS", 10, "BH", columns(&["A"])).is_err());
        assert!(FormatDef::compile(&config, "GPS", 2, "B", columns(&["A"])).is_err());
        // 'x' is not a known format character.
        assert!(FormatDef::compile(&config, "GPS", 10, "x", columns(&["A"])).is_err());
    }

    #[test]
    fn verify_layout_wire_size() {
        let config = LogConfig::default();

        let def = FormatDef::compile(&config, "TEST", 30, "BHIqN", columns(&["A", "B", "C", "D", "E"]))
            .unwrap();

        assert_eq!(def.layout().wire_size(), 1 + 2 + 4 + 8 + 16);
    }

    #[test]
    fn verify_unpack_integers() {
        let config = LogConfig::default();
        let def = FormatDef::compile(&config, "TEST", 10, "BhI", columns(&["A", "B", "C"])).unwrap();

        let mut payload = Vec::new();
        payload.push(255u8);
        payload.extend_from_slice(&(-1234i16).to_le_bytes());
        payload.extend_from_slice(&100_000u32.to_le_bytes());

        let values = def.layout().unpack(&payload).unwrap();

        assert_eq!(values, vec![Value::from(255u8), Value::from(-1234i16), Value::from(100_000u32)]);
    }

    #[test]
    fn verify_unpack_scaled() {
        let config = LogConfig::default();
        let def = FormatDef::compile(&config, "TEST", 13, "cCL", columns(&["A", "B", "C"])).unwrap();

        let mut payload = Vec::new();
        payload.extend_from_slice(&1000i16.to_le_bytes());
        payload.extend_from_slice(&2550u16.to_le_bytes());
        payload.extend_from_slice(&376_543_210i32.to_le_bytes());

        let values = def.layout().unpack(&payload).unwrap();

        assert_eq!(values[0], Value::Float(10.0));
        assert_eq!(values[1], Value::Float(25.5));

        match values[2] {
            Value::Float(lat) => assert!((lat - 37.654_321_0).abs() < 1e-7),
            ref other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn verify_unpack_text_and_passthrough() {
        let config = LogConfig::default();

        // "Data" is a passthrough column for Char64 fields; "Message" is not.
        let def =
            FormatDef::compile(&config, "FILE", 131, "ZZ", columns(&["Message", "Data"])).unwrap();

        let mut payload = vec![0u8; 128];
        payload[..5].copy_from_slice(b"hello");
        for (i, byte) in payload[64..].iter_mut().enumerate() {
            *byte = i as u8;
        }

        let values = def.layout().unpack(&payload).unwrap();

        assert_eq!(values[0], Value::String(String::from("hello")));
        assert_eq!(values[1], Value::Binary(payload[64..].to_vec().into_boxed_slice()));
    }

    #[test]
    fn verify_unpack_array() {
        let config = LogConfig::default();
        let def = FormatDef::compile(&config, "ARR", 67, "a", columns(&["Samples"])).unwrap();

        let mut payload = Vec::new();
        for i in 0..32i16 {
            payload.extend_from_slice(&(i - 16).to_le_bytes());
        }

        let values = def.layout().unpack(&payload).unwrap();

        match values[0] {
            Value::Array(ref ints) => {
                assert_eq!(ints.len(), 32);
                assert_eq!(ints[0], -16);
                assert_eq!(ints[31], 15);
            }
            ref other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn verify_decode_text_field() {
        assert_eq!(decode_text_field(b"TEST\x00\x00"), "TEST");
        assert_eq!(decode_text_field(b"TEST"), "TEST");
        assert_eq!(decode_text_field(b"\x00\x00"), "");
        // Interior NULs survive; only trailing NULs are stripped.
        assert_eq!(decode_text_field(b"a\x00b\x00"), "a\x00b");
        // Non-ASCII bytes are dropped.
        assert_eq!(decode_text_field(b"a\xffb\x00"), "ab");
    }

    #[test]
    fn verify_snapshot_roundtrip() {
        let config = LogConfig::default();

        let mut table = FormatTable::default();
        table.insert(
            10,
            FormatDef::compile(&config, "GPS", 10, "BcL", columns(&["St", "Alt", "Lat"])).unwrap(),
        );
        table.insert(
            11,
            FormatDef::compile(&config, "IMU", 11, "hhhh", columns(&["A", "B", "C", "D"])).unwrap(),
        );

        let rebuilt = FormatTable::from_snapshot(&config, &table.snapshot()).unwrap();

        assert_eq!(rebuilt.len(), 2);

        let gps = rebuilt.get(10).unwrap();
        assert_eq!(gps.name(), "GPS");
        assert_eq!(gps.length(), 10);
        assert_eq!(gps.format(), "BcL");
        assert_eq!(gps.layout().wire_size(), 1 + 2 + 4);
        assert!(rebuilt.get(12).is_none());
    }

    #[test]
    fn verify_replace_on_insert() {
        let config = LogConfig::default();

        let mut table = FormatTable::default();
        table.insert(10, FormatDef::compile(&config, "GPS", 10, "B", columns(&["A"])).unwrap());
        table.insert(10, FormatDef::compile(&config, "GPS2", 12, "BH", columns(&["A", "B"])).unwrap());

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(10).unwrap().name(), "GPS2");
    }
}
