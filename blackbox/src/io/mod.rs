// Blackbox
// Copyright (c) 2026 The Blackbox Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements the byte-level views the decoder reads from: the memory image of a
//! log file, and a little-endian cursor over a byte slice.

mod image;
mod slice_reader;

pub use image::LogImage;
pub use slice_reader::SliceReader;
