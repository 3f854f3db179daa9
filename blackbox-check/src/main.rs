// Blackbox Check Tool
// Copyright (c) 2026 The Blackbox Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};

use blackbox::errors::{Error, Result};
use blackbox::parallel::{ParallelReader, WorkerModel};
use blackbox::read::LogReader;
use blackbox::record::{Record, Value};

use clap::{Arg, ArgAction};
use log::warn;

/// The absolute maximum allowable delta between a decoded float field and the reference value.
/// Matches the 1e-7 resolution of the scaled latitude/longitude fields.
const ABS_MAX_ALLOWABLE_DELTA: f64 = 1e-7;

#[derive(Default)]
struct TestOptions {
    ref_cmd: String,
    model: Option<WorkerModel>,
    is_quiet: bool,
    is_per_field: bool,
    stop_after_fail: bool,
}

#[derive(Default)]
struct TestResult {
    n_records: u64,
    n_failed_records: u64,
    n_fields: u64,
    n_failed_fields: u64,
    abs_max_delta: f64,
    tgt_extra_records: u64,
    ref_extra_records: u64,
}

struct RefProcess {
    child: Child,
}

impl RefProcess {
    /// Spawn the reference decoder with the log path appended as its final argument.
    ///
    /// The reference is expected to write one JSON object per line to stdout, shaped like the
    /// decoder's own records: column keys plus the `mavpackettype` type key.
    fn try_spawn(ref_cmd: &str, path: &str) -> Result<RefProcess> {
        let mut parts = ref_cmd.split_whitespace();

        let program = match parts.next() {
            Some(program) => program,
            None => {
                return Err(Error::IoError(std::io::Error::other("empty reference command")));
            }
        };

        let child = Command::new(program)
            .args(parts)
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(RefProcess { child })
    }
}

fn value_matches(value: &Value, reference: &serde_json::Value, abs_max_delta: &mut f64) -> bool {
    match value {
        Value::Float(tgt) => match reference.as_f64() {
            Some(ref_val) => {
                if tgt.is_nan() || ref_val.is_nan() {
                    return tgt.is_nan() && ref_val.is_nan();
                }

                let delta = (tgt - ref_val).abs();
                *abs_max_delta = abs_max_delta.max(delta);

                delta <= ABS_MAX_ALLOWABLE_DELTA
            }
            // JSON has no representation for NaN; a null reference matches a NaN field.
            None => tgt.is_nan() && reference.is_null(),
        },
        Value::SignedInt(tgt) => {
            reference.as_i64() == Some(*tgt) || reference.as_f64() == Some(*tgt as f64)
        }
        Value::UnsignedInt(tgt) => {
            reference.as_u64() == Some(*tgt) || reference.as_f64() == Some(*tgt as f64)
        }
        Value::String(tgt) => reference.as_str() == Some(tgt.as_str()),
        Value::Binary(buf) => match reference.as_array() {
            Some(arr) => {
                arr.len() == buf.len()
                    && arr.iter().zip(buf.iter()).all(|(r, &b)| r.as_u64() == Some(u64::from(b)))
            }
            None => false,
        },
        Value::Array(ints) => match reference.as_array() {
            Some(arr) => {
                arr.len() == ints.len()
                    && arr.iter().zip(ints.iter()).all(|(r, &i)| r.as_i64() == Some(i))
            }
            None => false,
        },
    }
}

fn compare_record(
    index: u64,
    record: &Record,
    reference: &serde_json::Value,
    opts: &TestOptions,
    res: &mut TestResult,
) -> bool {
    let object = match reference.as_object() {
        Some(object) => object,
        None => {
            if !opts.is_quiet {
                eprintln!("[FAIL] record {}: reference line is not a JSON object", index);
            }
            res.n_failed_fields += record.len() as u64;
            res.n_fields += record.len() as u64;
            return false;
        }
    };

    let mut is_ok = object.len() == record.len();

    if !is_ok && !opts.is_quiet {
        eprintln!(
            "[FAIL] record {} ({}): {} keys decoded, {} in reference",
            index,
            record.packet_type(),
            record.len(),
            object.len()
        );
    }

    for (key, value) in record.iter() {
        res.n_fields += 1;

        let matched = match object.get(key) {
            Some(ref_value) => value_matches(value, ref_value, &mut res.abs_max_delta),
            None => false,
        };

        if !matched {
            res.n_failed_fields += 1;
            is_ok = false;

            if opts.is_per_field && !opts.is_quiet {
                eprintln!(
                    "[FAIL] record {} ({}): field {} decoded as {}, reference {}",
                    index,
                    record.packet_type(),
                    key,
                    value,
                    object.get(key).unwrap_or(&serde_json::Value::Null)
                );
            }
        }
    }

    is_ok
}

fn decode_target(path: &str, opts: &TestOptions) -> Result<Vec<Record>> {
    match opts.model {
        None => LogReader::open(path)?.read_all(None),
        Some(model) => ParallelReader::new(path).with_model(model).read_all(None),
    }
}

fn run_check(path: &str, opts: &TestOptions, res: &mut TestResult) -> Result<()> {
    // Target decode first: the whole record list is needed anyway, and a decoder failure should
    // not leave a zombie reference process behind.
    let records = decode_target(path, opts)?;

    let mut process = RefProcess::try_spawn(&opts.ref_cmd, path)?;

    let stdout = match process.child.stdout.take() {
        Some(stdout) => stdout,
        None => return Err(Error::IoError(std::io::Error::other("no reference stdout"))),
    };

    let mut lines = BufReader::new(stdout).lines();
    let mut records_iter = records.iter();

    loop {
        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };

        if line.trim().is_empty() {
            continue;
        }

        let record = match records_iter.next() {
            Some(record) => record,
            None => {
                // The reference decoded more records than the target.
                res.ref_extra_records += 1 + lines.by_ref().flatten().count() as u64;
                break;
            }
        };

        res.n_records += 1;

        let reference = match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(reference) => reference,
            Err(err) => {
                warn!("unparseable reference line for record {}: {}", res.n_records - 1, err);
                res.n_failed_records += 1;
                continue;
            }
        };

        if !compare_record(res.n_records - 1, record, &reference, opts, res) {
            res.n_failed_records += 1;

            if opts.stop_after_fail {
                break;
            }
        }
    }

    res.tgt_extra_records = records_iter.count() as u64;

    process.child.wait()?;

    Ok(())
}

fn main() {
    pretty_env_logger::init();

    let matches = clap::Command::new("Blackbox Check")
        .version("1.0")
        .about("Check Blackbox output against a reference decoding")
        .arg(
            Arg::new("ref-cmd")
                .long("ref")
                .value_name("CMD")
                .default_value("mavlogdump.py --format json")
                .help("Reference decoder command; emits one JSON record per line on stdout"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .value_parser(["none", "shared", "isolated"])
                .default_value("none")
                .help("Decode single-threaded (none), or in parallel with the given worker model"),
        )
        .arg(
            Arg::new("fields")
                .long("fields")
                .action(ArgAction::SetTrue)
                .help("Print failures per field"),
        )
        .arg(
            Arg::new("stop-after-fail")
                .long("first-fail")
                .short('f')
                .action(ArgAction::SetTrue)
                .help("Stop checking after the first failed record"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Only print check results"),
        )
        .arg(Arg::new("INPUT").help("The input log file path").required(true).index(1))
        .get_matches();

    let path = matches.get_one::<String>("INPUT").unwrap();

    let model = match matches.get_one::<String>("model").unwrap().as_str() {
        "shared" => Some(WorkerModel::Shared),
        "isolated" => Some(WorkerModel::Isolated),
        _ => None,
    };

    let opts = TestOptions {
        ref_cmd: matches.get_one::<String>("ref-cmd").unwrap().clone(),
        model,
        is_quiet: matches.get_flag("quiet"),
        is_per_field: matches.get_flag("fields"),
        stop_after_fail: matches.get_flag("stop-after-fail"),
    };

    let mut res: TestResult = Default::default();

    println!("Input Path: {}", path);
    println!();

    if let Err(err) = run_check(path, &opts, &mut res) {
        eprintln!("Check interrupted by error: {}", err);
        std::process::exit(2);
    }

    println!("Check Results");
    println!("=================================================");
    println!();
    println!("  Failed/Total Records: {:>12}/{:>12}", res.n_failed_records, res.n_records);
    println!("  Failed/Total Fields:  {:>12}/{:>12}", res.n_failed_fields, res.n_fields);
    println!("  Abs Max Float Delta:  {:>25.8}", res.abs_max_delta);
    println!("  Extra Target Records: {:>25}", res.tgt_extra_records);
    println!("  Extra Ref. Records:   {:>25}", res.ref_extra_records);
    println!();

    let failed =
        res.n_failed_records > 0 || res.tgt_extra_records > 0 || res.ref_extra_records > 0;

    if failed {
        println!("FAIL");
        std::process::exit(1);
    }

    println!("PASS");
}
