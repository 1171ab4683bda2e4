//! Minimal command-line harness exercising `Document` end-to-end: open a
//! save file (or start fresh), optionally apply one transform config given
//! as JSON, print document statistics, and optionally re-save. This is the
//! debugging/demo surface the engine's external-interfaces section asks
//! for, not a product UI - `graphcore` ships no renderer or file adapters,
//! so there is nothing else here to build a real CLI product out of.
//!
//! Exit codes follow the documented contract: `0` on a clean run, `1` if
//! the requested save file could not be opened, `2` on any other
//! unrecoverable error (bad transform JSON, a save failure).

use std::fs;
use std::process::ExitCode;

use graphcore::document::Document;
use graphcore::save::{load_from_bytes, save_to_bytes};
use graphcore::transform::TransformConfig;

struct Args {
    open_path: Option<String>,
    apply_json: Option<String>,
    save_path: Option<String>,
}

fn parse_args() -> Args {
    let mut open_path = None;
    let mut apply_json = None;
    let mut save_path = None;

    let mut raw = std::env::args().skip(1);
    while let Some(flag) = raw.next() {
        let mut take_value = || {
            raw.next().unwrap_or_else(|| {
                eprintln!("{flag} requires a value");
                std::process::exit(2);
            })
        };
        match flag.as_str() {
            "--open" => open_path = Some(take_value()),
            "--apply" => apply_json = Some(take_value()),
            "--save" => save_path = Some(take_value()),
            other => {
                eprintln!("unrecognised argument `{other}`");
                eprintln!("usage: cli [--open <path>] [--apply <json-transform-config>] [--save <path>]");
                std::process::exit(2);
            }
        }
    }

    Args { open_path, apply_json, save_path }
}

fn main() -> ExitCode {
    let args = parse_args();

    let mut document = match args.open_path {
        Some(path) => match fs::read(&path).map_err(|e| e.to_string()).and_then(|bytes| load_from_bytes(&bytes).map_err(|e| e.to_string())) {
            Ok(document) => document,
            Err(message) => {
                eprintln!("failed to open `{path}`: {message}");
                return ExitCode::from(1);
            }
        },
        None => match Document::new() {
            Ok(document) => document,
            Err(e) => {
                eprintln!("unrecoverable core error: {e}");
                return ExitCode::from(2);
            }
        },
    };

    if let Some(json) = args.apply_json {
        match serde_json::from_str::<TransformConfig>(&json) {
            Ok(config) => {
                let mut configs = document.transform_configs().to_vec();
                configs.push(config);
                document.set_transform_configs(configs);
            }
            Err(e) => {
                eprintln!("invalid transform config: {e}");
                return ExitCode::from(2);
            }
        }
    }

    print_stats(&document);

    if let Some(path) = args.save_path {
        match save_to_bytes(&document) {
            Ok(bytes) => {
                if let Err(e) = fs::write(&path, bytes) {
                    eprintln!("failed to write `{path}`: {e}");
                    return ExitCode::from(2);
                }
            }
            Err(e) => {
                eprintln!("unrecoverable core error while saving: {e}");
                return ExitCode::from(2);
            }
        }
    }

    ExitCode::from(0)
}

fn print_stats(document: &Document) {
    println!("nodes:      {}", document.graph().num_nodes());
    println!("edges:      {}", document.graph().num_edges());
    println!("components: {}", document.components().num_components());
    println!("attributes: {}", document.registry().len());
    for name in document.registry().names() {
        println!("  - {name}");
    }
    for alert in document.alerts().iter() {
        println!("alert[{:?}] {}: {}", alert.level, alert.source, alert.message);
    }
}
