// Blackbox
// Copyright (c) 2026 The Blackbox Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end decode tests: parallel output must equal the single-threaded scan, and corruption
//! must never cost more than the record it hits.

use std::io::Write;

use blackbox::parallel::{ParallelReader, WorkerModel};
use blackbox::read::LogReader;
use blackbox::record::Record;

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

/// A log of one FORMAT frame and `count` 10-byte GPS records, preceded by `prefix` garbage bytes.
///
/// Payload bytes are chosen so the sync pattern never occurs inside a payload.
fn gps_log(prefix: usize, count: usize) -> Vec<u8> {
    let mut image = vec![0u8; prefix];

    image.extend(fmt_frame(0x30, 10, "GPS", "BIH", "St,TimeMS,Alt"));

    for i in 0..count {
        image.extend_from_slice(&[0xa3, 0x95, 0x30]);
        image.push((i % 160) as u8);
        image.extend_from_slice(&(i as u32).to_le_bytes());
        image.extend_from_slice(&((i as u16).wrapping_mul(3)).to_le_bytes());
    }

    image
}

fn write_log(image: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(image).unwrap();
    file.flush().unwrap();
    file
}

fn single_threaded(path: &std::path::Path) -> Vec<Record> {
    LogReader::open(path).unwrap().read_all(None).unwrap()
}

#[test]
fn verify_parallel_equals_single_threaded_with_garbage_prefix() {
    let log = write_log(&gps_log(1024, 1000));

    let expected = single_threaded(log.path());
    assert_eq!(expected.len(), 1001);
    assert_eq!(expected[0].packet_type(), "FMT");
    assert_eq!(expected[1000].packet_type(), "GPS");

    for model in [WorkerModel::Shared, WorkerModel::Isolated] {
        for workers in [1, 2, 4, 8] {
            let records = ParallelReader::new(log.path())
                .with_model(model)
                .with_workers(workers)
                .read_all(None)
                .unwrap();

            assert_eq!(records, expected, "model {:?}, {} workers", model, workers);
        }
    }
}

/// A log of one FORMAT frame and `count` 67-byte IMU records. Bulkier records than [`gps_log`],
/// to reach multi-chunk sizes with a modest record count.
fn imu_log(count: usize) -> Vec<u8> {
    let mut image = fmt_frame(0x31, 67, "IMU", "QQQQQQQQ", "A,B,C,D,E,F,G,H");

    for i in 0..count {
        image.extend_from_slice(&[0xa3, 0x95, 0x31]);
        for k in 0..8u64 {
            image.extend_from_slice(&(i as u64 + k).to_le_bytes());
        }
    }

    image
}

#[test]
fn verify_parallel_equals_single_threaded_multi_chunk() {
    // Just over the minimum chunk size, so more than one chunk is actually planned.
    let record_len = 67;
    let count = (10 * 1024 * 1024 + 512 * 1024) / record_len;
    let log = write_log(&imu_log(count));

    let expected = single_threaded(log.path());
    assert_eq!(expected.len(), count + 1);

    for model in [WorkerModel::Shared, WorkerModel::Isolated] {
        let records = ParallelReader::new(log.path())
            .with_model(model)
            .with_workers(4)
            .read_all(None)
            .unwrap();

        assert_eq!(records.len(), expected.len(), "model {:?}", model);
        assert_eq!(records, expected, "model {:?}", model);
    }
}

#[test]
fn verify_parallel_type_filter_matches() {
    let log = write_log(&gps_log(0, 500));

    let mut reader = LogReader::open(log.path()).unwrap();
    let expected = reader.read_all(Some("GPS")).unwrap();
    assert_eq!(expected.len(), 500);

    let records =
        ParallelReader::new(log.path()).with_workers(4).read_all(Some("GPS")).unwrap();

    assert_eq!(records, expected);
}

#[test]
fn verify_single_payload_corruption_costs_at_most_one_record() {
    let clean = gps_log(0, 1000);
    let expected = {
        let log = write_log(&clean);
        single_threaded(log.path())
    };

    // Flip the status byte of record 500.
    let mut corrupt = clean.clone();
    let offset = 89 + 500 * 10 + 3;
    corrupt[offset] ^= 0xff;

    let log = write_log(&corrupt);
    let records = single_threaded(log.path());

    assert_eq!(records.len(), expected.len());

    let differing = records.iter().zip(&expected).filter(|(a, b)| a != b).count();
    assert_eq!(differing, 1);
}

#[test]
fn verify_truncated_tail_parallel_matches() {
    let mut image = gps_log(0, 200);
    // Drop the last 4 bytes: the final record keeps its header but loses payload.
    image.truncate(image.len() - 4);

    let log = write_log(&image);

    let expected = single_threaded(log.path());
    assert_eq!(expected.len(), 200);

    for model in [WorkerModel::Shared, WorkerModel::Isolated] {
        let records = ParallelReader::new(log.path())
            .with_model(model)
            .with_workers(4)
            .read_all(None)
            .unwrap();

        assert_eq!(records, expected, "model {:?}", model);
    }
}
