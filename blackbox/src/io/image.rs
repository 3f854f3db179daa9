// Blackbox
// Copyright (c) 2026 The Blackbox Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::path::Path;

use log::debug;
use memmap2::Mmap;

use crate::errors::Result;

/// A `LogImage` is a read-only memory image of one log file.
///
/// The image is acquired on open and released when the `LogImage` is dropped. A zero-length file
/// yields an empty image without a mapping, since a zero-length mapping is not portable.
pub struct LogImage {
    map: Option<Mmap>,
}

impl LogImage {
    /// Open the file at `path` as a read-only memory image.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<LogImage> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let map = if file.metadata()?.len() == 0 {
            None
        }
        else {
            // SAFETY: the mapping is read-only and private to this process. Decoding a log that
            // another process truncates mid-read is not a supported mode of operation.
            Some(unsafe { Mmap::map(&file)? })
        };

        let image = LogImage { map };

        debug!("mapped {} ({} bytes)", path.display(), image.len());

        Ok(image)
    }

    /// The whole image as a byte slice.
    pub fn bytes(&self) -> &[u8] {
        match self.map {
            Some(ref map) => map,
            None => &[],
        }
    }

    /// The image length in bytes.
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_none()
    }
}
