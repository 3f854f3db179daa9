// Blackbox
// Copyright (c) 2026 The Blackbox Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `chunk` module partitions a byte image into record-aligned ranges for parallel decoding.

use std::ops::Range;

use crate::config::LogConfig;
use crate::defs::FormatTable;
use crate::errors::{empty_log_error, no_valid_header_error, Result};
use crate::locate::next_frame;

/// The minimum nominal chunk size. Images smaller than this are decoded as a single chunk.
pub const MIN_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Partition `image` into up to `workers` contiguous half-open byte ranges, each starting on a
/// valid record header.
///
/// Chunk ends snap forward to the next valid record header, so every record lies wholly inside
/// exactly one chunk. A record header is validated with the same integrity filter the decoder
/// uses; a bare sync match is not a boundary, because payloads frequently contain the sync bytes.
/// The format table must already hold the definitions learned by a prelude scan, otherwise data
/// records ahead of the first in-chunk FORMAT frame would not be recognized as boundaries.
pub fn plan_chunks(
    image: &[u8],
    config: &LogConfig,
    table: &FormatTable,
    workers: usize,
) -> Result<Vec<Range<usize>>> {
    if image.is_empty() {
        return empty_log_error();
    }

    let workers = workers.max(1);
    let chunk_size = (image.len() / workers).max(MIN_CHUNK_SIZE);

    let first = match next_frame(image, config, table, 0, image.len()) {
        Some(frame) => frame.pos,
        None => return no_valid_header_error(),
    };

    let mut chunks = Vec::new();
    let mut start = first;

    loop {
        let tentative = (start + chunk_size).min(image.len());

        let end = match next_frame(image, config, table, tentative, image.len()) {
            Some(frame) => frame.pos,
            None => image.len(),
        };

        chunks.push(start..end);

        if end >= image.len() {
            break;
        }

        start = end;
    }

    Ok(chunks)
}
