// Blackbox Dump Tool
// Copyright (c) 2026 The Blackbox Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::time::Instant;

use blackbox::errors::Result;
use blackbox::parallel::{ParallelReader, WorkerModel};
use blackbox::read::LogReader;
use blackbox::record::{Record, Value};

use clap::{Arg, ArgAction};
use log::error;

#[derive(Copy, Clone)]
enum DecodeModel {
    Single,
    Shared,
    Isolated,
}

struct DumpOptions {
    record_type: Option<String>,
    model: DecodeModel,
    workers: Option<usize>,
    print: bool,
    json: bool,
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Binary(buf) => buf.iter().map(|&b| serde_json::Value::from(b)).collect(),
        // NaN and infinities have no JSON representation and serialize as null.
        Value::Float(float) => {
            serde_json::Number::from_f64(*float).map_or(serde_json::Value::Null, Into::into)
        }
        Value::SignedInt(int) => serde_json::Value::from(*int),
        Value::UnsignedInt(uint) => serde_json::Value::from(*uint),
        Value::String(string) => serde_json::Value::from(string.as_str()),
        Value::Array(ints) => ints.iter().map(|&i| serde_json::Value::from(i)).collect(),
    }
}

fn record_to_json(record: &Record) -> serde_json::Value {
    let mut object = serde_json::Map::new();

    for (key, value) in record.iter() {
        object.insert(key.to_string(), value_to_json(value));
    }

    serde_json::Value::Object(object)
}

fn decode(path: &str, opts: &DumpOptions) -> Result<Vec<Record>> {
    let record_type = opts.record_type.as_deref();

    match opts.model {
        DecodeModel::Single => LogReader::open(path)?.read_all(record_type),
        DecodeModel::Shared | DecodeModel::Isolated => {
            let model = match opts.model {
                DecodeModel::Shared => WorkerModel::Shared,
                _ => WorkerModel::Isolated,
            };

            let mut reader = ParallelReader::new(path).with_model(model);

            if let Some(workers) = opts.workers {
                reader = reader.with_workers(workers);
            }

            reader.read_all(record_type)
        }
    }
}

fn run(path: &str, opts: &DumpOptions) -> Result<()> {
    let started = Instant::now();

    let records = decode(path, opts)?;

    let elapsed = started.elapsed();

    if opts.print || opts.json {
        for record in &records {
            if opts.json {
                println!("{}", record_to_json(record));
            }
            else {
                println!("{}", record);
            }
        }
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in &records {
        *counts.entry(record.packet_type()).or_default() += 1;
    }

    println!("Decoded {} records in {:.3}s", records.len(), elapsed.as_secs_f64());
    for (name, count) in counts {
        println!("  {:<6} {:>10}", name, count);
    }

    Ok(())
}

fn main() {
    pretty_env_logger::init();

    let matches = clap::Command::new("Blackbox Dump")
        .version("1.0")
        .about("Decode ArduPilot dataflash logs with Blackbox")
        .arg(
            Arg::new("type")
                .long("type")
                .short('t')
                .value_name("NAME")
                .help("Only decode records of the given type name"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .value_parser(["none", "shared", "isolated"])
                .default_value("none")
                .help("Decode single-threaded (none), or in parallel with the given worker model"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .short('w')
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .help("Number of parallel workers (defaults to the worker model's choice)"),
        )
        .arg(
            Arg::new("print")
                .long("print")
                .short('p')
                .action(ArgAction::SetTrue)
                .help("Print every decoded record"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print every decoded record as a JSON line"),
        )
        .arg(Arg::new("INPUT").help("The input log file path").required(true).index(1))
        .get_matches();

    let path = matches.get_one::<String>("INPUT").unwrap();

    let model = match matches.get_one::<String>("model").unwrap().as_str() {
        "shared" => DecodeModel::Shared,
        "isolated" => DecodeModel::Isolated,
        _ => DecodeModel::Single,
    };

    let opts = DumpOptions {
        record_type: matches.get_one::<String>("type").cloned(),
        model,
        workers: matches.get_one::<usize>("workers").copied(),
        print: matches.get_flag("print"),
        json: matches.get_flag("json"),
    };

    if let Err(err) = run(path, &opts) {
        error!("{}", err);
        std::process::exit(1);
    }
}
