// Blackbox
// Copyright (c) 2026 The Blackbox Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `parallel` module decodes a log with multiple workers over record-aligned chunks.
//!
//! A single-threaded prelude learns every FORMAT definition first, the image is partitioned into
//! record-aligned chunks, and each chunk is decoded independently. Concatenating the per-chunk
//! outputs in chunk order reproduces the single-threaded left-to-right scan exactly: chunks are
//! disjoint, contiguous, and decoded deterministically. No time-based reordering is performed.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};
use rayon::prelude::*;

use crate::chunk::plan_chunks;
use crate::config::LogConfig;
use crate::defs::{FormatSnapshot, FormatTable};
use crate::errors::{cancelled_error, chunk_failure_error, Error, Result};
use crate::io::LogImage;
use crate::read::{RecordDecoder, FMT_RECORD_NAME};
use crate::record::Record;

/// How chunk workers share state with the driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkerModel {
    /// Workers borrow the driver's memory image and reuse the prelude's compiled format table.
    Shared,
    /// Workers share nothing: each opens and maps the log itself, receives the format dictionary
    /// as plain data, and recompiles every layout from its format string.
    Isolated,
}

/// A `CancelToken` signals a running [`ParallelReader`] to stop dispatching chunks.
///
/// Chunks already being decoded run to completion; chunks not yet started are abandoned and the
/// decode returns [`Error::Cancelled`].
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

fn default_workers(model: WorkerModel) -> usize {
    match model {
        WorkerModel::Shared => 16,
        WorkerModel::Isolated => {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        }
    }
}

/// A `ParallelReader` decodes one log file with multiple workers.
///
/// The output is deterministic and equal to the single-threaded scan of [`crate::read::LogReader`].
pub struct ParallelReader {
    path: PathBuf,
    config: LogConfig,
    model: WorkerModel,
    workers: Option<usize>,
    cancel: CancelToken,
}

impl ParallelReader {
    /// Instantiate a reader for the log file at `path` with the default configuration and the
    /// isolated worker model.
    pub fn new<P: AsRef<Path>>(path: P) -> ParallelReader {
        ParallelReader {
            path: path.as_ref().to_path_buf(),
            config: LogConfig::default(),
            model: WorkerModel::Isolated,
            workers: None,
            cancel: CancelToken::new(),
        }
    }

    /// Use the given configuration.
    pub fn with_config(mut self, config: LogConfig) -> ParallelReader {
        self.config = config;
        self
    }

    /// Select the worker model.
    pub fn with_model(mut self, model: WorkerModel) -> ParallelReader {
        self.model = model;
        self
    }

    /// Use a fixed worker count instead of the model's default.
    pub fn with_workers(mut self, workers: usize) -> ParallelReader {
        self.workers = Some(workers.max(1));
        self
    }

    /// A token that can cancel this reader from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Decode the whole log, optionally filtered to one record type name.
    ///
    /// Protocol: open the image, learn every FORMAT definition in a single-threaded prelude scan,
    /// plan record-aligned chunks, decode each chunk on a sized thread pool, and concatenate the
    /// per-chunk outputs in chunk order. A worker failure tears the decode down and surfaces as
    /// [`Error::ChunkFailure`] wrapping the failed byte range.
    pub fn read_all(&self, filter: Option<&str>) -> Result<Vec<Record>> {
        let image = LogImage::open(&self.path)?;

        info!("opened log {} ({} bytes)", self.path.display(), image.len());

        // Prelude scan: only the side effect on the format table is wanted.
        let mut prelude = RecordDecoder::new(image.bytes(), &self.config);
        while prelude.next_record(Some(FMT_RECORD_NAME))?.is_some() {}
        let table = prelude.into_table();

        info!("prelude scan learned {} record types", table.len());

        let workers = self.workers.unwrap_or_else(|| default_workers(self.model));

        let chunks = plan_chunks(image.bytes(), &self.config, &table, workers)?;

        info!("dispatching {} chunks to {} workers ({:?} model)", chunks.len(), workers, self.model);

        let snapshot = match self.model {
            WorkerModel::Isolated => table.snapshot(),
            WorkerModel::Shared => Vec::new(),
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|err| Error::IoError(std::io::Error::other(err)))?;

        let chunked: Vec<Vec<Record>> = pool.install(|| {
            chunks
                .par_iter()
                .map(|chunk| self.decode_chunk(&image, &table, &snapshot, chunk, filter))
                .collect::<Result<_>>()
        })?;

        info!("joined {} chunks", chunked.len());

        let mut records = Vec::with_capacity(chunked.iter().map(Vec::len).sum());
        for chunk_records in chunked {
            records.extend(chunk_records);
        }

        info!("decoded {} records", records.len());

        Ok(records)
    }

    fn decode_chunk(
        &self,
        image: &LogImage,
        table: &FormatTable,
        snapshot: &[FormatSnapshot],
        chunk: &Range<usize>,
        filter: Option<&str>,
    ) -> Result<Vec<Record>> {
        if self.cancel.is_cancelled() {
            return cancelled_error();
        }

        let result = match self.model {
            WorkerModel::Shared => {
                decode_range(image.bytes(), &self.config, table.clone(), chunk, filter)
            }
            WorkerModel::Isolated => {
                // An isolated worker maps the file itself and rebuilds its table from plain data.
                LogImage::open(&self.path).and_then(|view| {
                    let table = FormatTable::from_snapshot(&self.config, snapshot)?;
                    decode_range(view.bytes(), &self.config, table, chunk, filter)
                })
            }
        };

        match result {
            Ok(records) => Ok(records),
            Err(Error::Cancelled) => cancelled_error(),
            Err(err) => chunk_failure_error(chunk.start, chunk.end, err),
        }
    }
}

/// Decode every record starting inside `chunk`.
fn decode_range(
    image: &[u8],
    config: &LogConfig,
    table: FormatTable,
    chunk: &Range<usize>,
    filter: Option<&str>,
) -> Result<Vec<Record>> {
    let mut decoder = RecordDecoder::with_table(image, config, table).with_range(chunk.start, chunk.end);

    let mut records = Vec::new();

    while let Some(record) = decoder.next_record(filter)? {
        records.push(record);
    }

    debug!("chunk [{}, {}) decoded {} records", chunk.start, chunk.end, records.len());

    Ok(records)
}
