// Blackbox
// Copyright (c) 2026 The Blackbox Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error::Error as StdError;
use std::fmt;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Blackbox.
#[derive(Debug)]
pub enum Error {
    /// An IO error occurred while opening or mapping the log file, or spawning a helper process.
    IoError(std::io::Error),
    /// The log file contains no bytes at all.
    EmptyLog,
    /// No sync pattern followed by a valid record type was found anywhere in the image.
    NoValidHeader,
    /// A frame contained malformed data and could not be decoded.
    DecodeError(&'static str),
    /// A worker failed while decoding a chunk. Wraps the failing byte range and the cause.
    ChunkFailure {
        /// First byte offset of the failed chunk.
        start: usize,
        /// One past the last byte offset of the failed chunk.
        end: usize,
        /// The error raised by the worker.
        source: Box<Error>,
    },
    /// Dispatch was aborted by a cancellation signal before all chunks were decoded.
    Cancelled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => {
                write!(f, "io error: {}", err)
            }
            Error::EmptyLog => {
                write!(f, "log file is empty")
            }
            Error::NoValidHeader => {
                write!(f, "no valid record header found in log")
            }
            Error::DecodeError(msg) => {
                write!(f, "malformed record: {}", msg)
            }
            Error::ChunkFailure { start, end, ref source } => {
                write!(f, "chunk [{}, {}) failed: {}", start, end, source)
            }
            Error::Cancelled => {
                write!(f, "decode cancelled")
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            Error::ChunkFailure { ref source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a decode error.
pub fn decode_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::DecodeError(desc))
}

/// Convenience function to create an empty-log error.
pub fn empty_log_error<T>() -> Result<T> {
    Err(Error::EmptyLog)
}

/// Convenience function to create a no-valid-header error.
pub fn no_valid_header_error<T>() -> Result<T> {
    Err(Error::NoValidHeader)
}

/// Convenience function to create a cancelled error.
pub fn cancelled_error<T>() -> Result<T> {
    Err(Error::Cancelled)
}

/// Convenience function to wrap a worker error with the chunk byte range it failed in.
pub fn chunk_failure_error<T>(start: usize, end: usize, source: Error) -> Result<T> {
    Err(Error::ChunkFailure { start, end, source: Box::new(source) })
}
