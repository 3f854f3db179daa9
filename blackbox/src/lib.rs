// Blackbox
// Copyright (c) 2026 The Blackbox Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Blackbox is a decoding library for ArduPilot dataflash (`.BIN`) telemetry logs.
//!
//! A dataflash log is a self-describing byte stream: FORMAT records declare the on-wire layout of
//! every other record type that follows. Blackbox reconstructs that schema while scanning,
//! tolerates corruption without losing sync, and yields decoded, scaled records in file order.
//! Logs can be decoded with a single streaming pass ([`read::LogReader`]) or in parallel over
//! record-aligned chunks with identical output ([`parallel::ParallelReader`]).

pub mod chunk;
pub mod config;
pub mod defs;
pub mod errors;
pub mod io;
pub mod locate;
pub mod parallel;
pub mod read;
pub mod record;
