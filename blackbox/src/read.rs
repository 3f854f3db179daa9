// Blackbox
// Copyright (c) 2026 The Blackbox Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `read` module implements the streaming record decoder and the log decode session.
//!
//! [`RecordDecoder`] advances through a byte image frame-by-frame, learning FORMAT definitions as
//! it scans and yielding fully-decoded records. [`LogReader`] owns the memory image of one log
//! file and drives a decoder over it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::LogConfig;
use crate::defs::{FormatDef, FormatTable};
use crate::errors::{decode_error, Result};
use crate::io::LogImage;
use crate::locate::{next_frame, FrameClass};
use crate::record::{Record, Value, PACKET_TYPE_KEY};

/// The record type name emitted for decoded FORMAT frames.
pub const FMT_RECORD_NAME: &str = "FMT";

/// Decode a NUL-terminated header text field: cut at the first NUL, drop non-ASCII bytes, and
/// trim surrounding whitespace.
fn ascii_until_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());

    let text: String = bytes[..end].iter().filter(|b| b.is_ascii()).map(|&b| char::from(b)).collect();

    text.trim().to_string()
}

fn frame_field<'a>(frame: &'a [u8], field: (usize, usize)) -> Result<&'a [u8]> {
    match frame.get(field.0..field.0 + field.1) {
        Some(bytes) => Ok(bytes),
        None => decode_error("fmt: frame layout exceeds frame length"),
    }
}

/// Parse the FORMAT frame at `pos` into a compiled definition for the described record type.
///
/// The caller guarantees that a whole FORMAT frame lies at `pos`.
fn parse_format_frame(image: &[u8], config: &LogConfig, pos: usize) -> Result<(u8, FormatDef)> {
    let frame = &image[pos..pos + config.fmt_frame_len];
    let layout = &config.fmt_layout;

    let msg_type = match frame.get(layout.msg_type) {
        Some(&byte) => byte,
        None => return decode_error("fmt: frame layout exceeds frame length"),
    };
    let length = match frame.get(layout.length) {
        Some(&byte) => usize::from(byte),
        None => return decode_error("fmt: frame layout exceeds frame length"),
    };

    let name = ascii_until_nul(frame_field(frame, layout.name)?);
    let format = ascii_until_nul(frame_field(frame, layout.format)?);

    let columns: Vec<String> = ascii_until_nul(frame_field(frame, layout.columns)?)
        .split(',')
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .map(String::from)
        .collect();

    let def = FormatDef::compile(config, &name, length, &format, columns)?;

    Ok((msg_type, def))
}

/// Build the normalized record emitted for a decoded FORMAT frame.
fn build_fmt_record(type_id: u8, def: &FormatDef) -> Record {
    let mut record = Record::with_capacity(6);

    record.push(Arc::from(PACKET_TYPE_KEY), Value::from(FMT_RECORD_NAME));
    record.push(Arc::from("Type"), Value::from(type_id));
    record.push(Arc::from("Name"), Value::from(def.name()));
    record.push(Arc::from("Length"), Value::from(def.length() as u64));
    record.push(Arc::from("Format"), Value::from(def.format()));
    record.push(Arc::from("Columns"), Value::from(def.columns().join(",")));

    record
}

/// Decode the data frame at `pos` according to its definition.
fn decode_data_frame(image: &[u8], config: &LogConfig, def: &FormatDef, pos: usize) -> Result<Record> {
    let payload_start = pos + config.sync.len() + 1;

    let values = def.layout().unpack(&image[payload_start..])?;

    let mut record = Record::with_capacity(def.columns().len() + 1);
    record.push(Arc::from(PACKET_TYPE_KEY), Value::String(def.name().to_string()));

    for (column, value) in def.columns().iter().zip(values) {
        record.push(Arc::clone(column), value);
    }

    Ok(record)
}

/// The decoder engine shared by the streaming and session front-ends.
///
/// Failure policy: a frame that fails to decode never aborts the scan. The cursor advances one
/// byte past the suspect sync pattern and the scan continues.
fn next_record_at(
    image: &[u8],
    config: &LogConfig,
    table: &mut FormatTable,
    cursor: &mut usize,
    end: usize,
    filter: Option<&str>,
) -> Result<Option<Record>> {
    loop {
        let frame = match next_frame(image, config, table, *cursor, end) {
            Some(frame) => frame,
            None => return Ok(None),
        };

        match frame.class {
            FrameClass::Format => match parse_format_frame(image, config, frame.pos) {
                Ok((type_id, def)) => {
                    let record = if filter.map_or(true, |want| want == FMT_RECORD_NAME) {
                        Some(build_fmt_record(type_id, &def))
                    }
                    else {
                        None
                    };

                    table.insert(type_id, def);
                    *cursor = frame.pos + config.fmt_frame_len;

                    if let Some(record) = record {
                        return Ok(Some(record));
                    }
                }
                Err(err) => {
                    warn!("bad FORMAT frame at offset {}: {}", frame.pos, err);
                    *cursor = frame.pos + 1;
                }
            },
            FrameClass::Data(type_id) => {
                // The locator only classifies a data frame when its id is in the table.
                let def = match table.get(type_id) {
                    Some(def) => def,
                    None => unreachable!(),
                };

                if let Some(want) = filter {
                    if def.name() != want {
                        *cursor = frame.pos + def.length();
                        continue;
                    }
                }

                match decode_data_frame(image, config, def, frame.pos) {
                    Ok(record) => {
                        *cursor = frame.pos + def.length();
                        return Ok(Some(record));
                    }
                    Err(err) => {
                        warn!("bad {} record at offset {}: {}", def.name(), frame.pos, err);
                        *cursor = frame.pos + 1;
                    }
                }
            }
        }
    }
}

/// A `RecordDecoder` decodes records from a byte image slice.
///
/// The decoder owns its format table: definitions learned from FORMAT frames mid-scan apply to
/// the rest of the scan and can be recovered with [`RecordDecoder::into_table`].
pub struct RecordDecoder<'a> {
    image: &'a [u8],
    config: &'a LogConfig,
    table: FormatTable,
    cursor: usize,
    end: usize,
}

impl<'a> RecordDecoder<'a> {
    /// Instantiate a decoder over a whole image with an empty format table.
    pub fn new(image: &'a [u8], config: &'a LogConfig) -> RecordDecoder<'a> {
        RecordDecoder { image, config, table: FormatTable::default(), cursor: 0, end: image.len() }
    }

    /// Instantiate a decoder over a whole image with a previously-learned format table.
    pub fn with_table(image: &'a [u8], config: &'a LogConfig, table: FormatTable) -> RecordDecoder<'a> {
        RecordDecoder { image, config, table, cursor: 0, end: image.len() }
    }

    /// Restrict the decoder to frames starting in `[start, end)`.
    ///
    /// A record may start before `end` and extend past it; it is decoded whole. This is the
    /// contract chunked decoding relies on.
    pub fn with_range(mut self, start: usize, end: usize) -> RecordDecoder<'a> {
        self.cursor = start;
        self.end = end.min(self.image.len());
        self
    }

    /// The current cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The format table in its current state.
    pub fn table(&self) -> &FormatTable {
        &self.table
    }

    /// Consume the decoder, yielding its format table.
    pub fn into_table(self) -> FormatTable {
        self.table
    }

    /// Decode the next record, or report the end of the stream.
    ///
    /// With a `filter`, only records whose type name equals the filter are returned; frames of
    /// other types are skipped at full speed. FORMAT frames always update the format table, and
    /// are emitted when the filter is absent or equals [`FMT_RECORD_NAME`].
    pub fn next_record(&mut self, filter: Option<&str>) -> Result<Option<Record>> {
        next_record_at(self.image, self.config, &mut self.table, &mut self.cursor, self.end, filter)
    }
}

/// A `LogReader` is a decode session over one log file.
///
/// The file is acquired as a read-only memory image on open and released when the reader is
/// dropped, on every exit path.
pub struct LogReader {
    path: PathBuf,
    image: LogImage,
    config: LogConfig,
    table: FormatTable,
    cursor: usize,
}

impl LogReader {
    /// Open the log file at `path` with the default configuration.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<LogReader> {
        LogReader::with_config(path, LogConfig::default())
    }

    /// Open the log file at `path` with the given configuration.
    pub fn with_config<P: AsRef<Path>>(path: P, config: LogConfig) -> Result<LogReader> {
        let path = path.as_ref().to_path_buf();
        let image = LogImage::open(&path)?;

        info!("opened log {} ({} bytes)", path.display(), image.len());

        Ok(LogReader { path, image, config, table: FormatTable::default(), cursor: 0 })
    }

    /// Decode the next record, or report the end of the log.
    pub fn next_record(&mut self, filter: Option<&str>) -> Result<Option<Record>> {
        let end = self.image.len();

        next_record_at(self.image.bytes(), &self.config, &mut self.table, &mut self.cursor, end, filter)
    }

    /// Iterate the remaining records of the log.
    pub fn records(&mut self, filter: Option<&str>) -> Records<'_> {
        Records { reader: self, filter: filter.map(String::from) }
    }

    /// Decode every remaining record into a vector.
    pub fn read_all(&mut self, filter: Option<&str>) -> Result<Vec<Record>> {
        let mut records = Vec::new();

        while let Some(record) = self.next_record(filter)? {
            records.push(record);
        }

        Ok(records)
    }

    /// Reset the cursor to the start of the log. The format table is kept.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// The current cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The log length in bytes.
    pub fn len(&self) -> usize {
        self.image.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }

    /// The session configuration.
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// The format table in its current state.
    pub fn format_table(&self) -> &FormatTable {
        &self.table
    }
}

impl Drop for LogReader {
    fn drop(&mut self) {
        debug!("closed log {}", self.path.display());
    }
}

/// Iterator over the records of a [`LogReader`].
pub struct Records<'r> {
    reader: &'r mut LogReader,
    filter: Option<String>,
}

impl Iterator for Records<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.reader.next_record(self.filter.as_deref()).unwrap_or(None)
    }
}
