// Blackbox
// Copyright (c) 2026 The Blackbox Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `locate` module finds and classifies candidate record frames in a byte image.
//!
//! The sync pattern is only two bytes and frequently occurs inside record payloads, so a bare
//! pattern match does not identify a record start. A candidate is accepted only if its type id
//! passes the integrity filter: it is the reserved FORMAT id with a whole FORMAT frame in bounds,
//! or a dictionary-known id whose declared record length is in bounds.

use memchr::memmem;

use crate::config::LogConfig;
use crate::defs::FormatTable;

/// Classification of a located frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FrameClass {
    /// A FORMAT frame carrying a record type definition.
    Format,
    /// A data frame of the given dictionary-known record type id.
    Data(u8),
}

/// A located frame: the absolute byte offset of its sync pattern and its classification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Frame {
    pub pos: usize,
    pub class: FrameClass,
}

/// Find the next valid frame starting at an offset in `[from, until)`.
///
/// Sync occurrences that fail the integrity filter are skipped. Bounds checks are made against
/// the whole image, not `until`: a frame may *start* before `until` and extend past it.
pub fn next_frame(
    image: &[u8],
    config: &LogConfig,
    table: &FormatTable,
    from: usize,
    until: usize,
) -> Option<Frame> {
    let mut cursor = from;

    while cursor < until {
        let pos = match memmem::find(&image[cursor..], &config.sync) {
            Some(rel) => cursor + rel,
            None => return None,
        };

        if pos >= until {
            return None;
        }

        if let Some(class) = classify(image, config, table, pos) {
            return Some(Frame { pos, class });
        }

        // The sync pattern occurred inside a payload, or introduces a frame that cannot be
        // decoded. Resume the scan past it.
        cursor = pos + config.sync.len();
    }

    None
}

/// Apply the integrity filter to a sync occurrence at `pos`.
fn classify(image: &[u8], config: &LogConfig, table: &FormatTable, pos: usize) -> Option<FrameClass> {
    let type_id = *image.get(pos + config.sync.len())?;

    // The reserved FORMAT id is recognized regardless of dictionary state.
    if type_id == config.fmt_type {
        if pos + config.fmt_frame_len <= image.len() {
            return Some(FrameClass::Format);
        }
        return None;
    }

    match table.get(type_id) {
        Some(def) if pos + def.length() <= image.len() => Some(FrameClass::Data(type_id)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::FormatDef;

    fn pad(text: &str, len: usize) -> Vec<u8> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(len, 0);
        bytes
    }

    fn fmt_frame(msg_type: u8, length: u8, name: &str, format: &str, columns: &str) -> Vec<u8> {
        let mut frame = vec![0xa3, 0x95, 0x80, msg_type, length];
        frame.extend(pad(name, 4));
        frame.extend(pad(format, 16));
        frame.extend(pad(columns, 64));
        frame
    }

    fn table_with(config: &LogConfig, type_id: u8, length: usize, format: &str) -> FormatTable {
        let columns = (0..format.len()).map(|i| format!("C{}", i)).collect();
        let mut table = FormatTable::default();
        table.insert(type_id, FormatDef::compile(config, "TEST", length, format, columns).unwrap());
        table
    }

    #[test]
    fn verify_locate_format_frame() {
        let config = LogConfig::default();
        let table = FormatTable::default();

        let mut image = vec![0u8; 7];
        image.extend(fmt_frame(1, 6, "GPS", "B", "A"));

        let frame = next_frame(&image, &config, &table, 0, image.len()).unwrap();
        assert_eq!(frame, Frame { pos: 7, class: FrameClass::Format });
    }

    #[test]
    fn verify_truncated_format_frame_rejected() {
        let config = LogConfig::default();
        let table = FormatTable::default();

        // A FORMAT header whose 89-byte frame would extend past the image end.
        let image = fmt_frame(1, 6, "GPS", "B", "A")[..40].to_vec();

        assert_eq!(next_frame(&image, &config, &table, 0, image.len()), None);
    }

    #[test]
    fn verify_locate_known_data_frame() {
        let config = LogConfig::default();
        let table = table_with(&config, 0x22, 5, "H");

        let image = vec![0x00, 0xa3, 0x95, 0x22, 0xe8, 0x03];

        let frame = next_frame(&image, &config, &table, 0, image.len()).unwrap();
        assert_eq!(frame, Frame { pos: 1, class: FrameClass::Data(0x22) });
    }

    #[test]
    fn verify_unknown_type_skipped() {
        let config = LogConfig::default();
        let table = table_with(&config, 0x22, 5, "H");

        // First sync introduces an unknown id, second a known one.
        let image = vec![0xa3, 0x95, 0x77, 0x00, 0xa3, 0x95, 0x22, 0xe8, 0x03];

        let frame = next_frame(&image, &config, &table, 0, image.len()).unwrap();
        assert_eq!(frame.pos, 4);
    }

    #[test]
    fn verify_sync_in_payload_not_mistaken() {
        let config = LogConfig::default();
        let table = table_with(&config, 0x22, 7, "I");

        // A record whose payload contains the sync pattern followed by an unknown id.
        let mut image = vec![0xa3, 0x95, 0x22];
        image.extend_from_slice(&[0xa3, 0x95, 0x55, 0x00]);

        let frame = next_frame(&image, &config, &table, 0, image.len()).unwrap();
        assert_eq!(frame.pos, 0);

        // A scan resuming inside the payload must not classify the embedded sync as a frame.
        assert_eq!(next_frame(&image, &config, &table, 1, image.len()), None);
    }

    #[test]
    fn verify_short_data_frame_rejected() {
        let config = LogConfig::default();
        let table = table_with(&config, 0x22, 7, "I");

        // Known id, but only 2 of the 4 payload bytes are present.
        let image = vec![0xa3, 0x95, 0x22, 0x01, 0x02];

        assert_eq!(next_frame(&image, &config, &table, 0, image.len()), None);
    }

    #[test]
    fn verify_until_bounds_search() {
        let config = LogConfig::default();
        let table = table_with(&config, 0x22, 5, "H");

        let mut image = vec![0u8; 10];
        image.extend_from_slice(&[0xa3, 0x95, 0x22, 0x01, 0x02]);

        assert_eq!(next_frame(&image, &config, &table, 0, 10), None);
        assert!(next_frame(&image, &config, &table, 0, 11).is_some());
    }
}
