/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use bitscan_tools::utils::{run_all, tracing::init_subscriber, RunFile, RunResult};
use clap::Parser;

/// Run the Hamming scan and top-k selection workloads described by a JSON file.
#[derive(Debug, Parser)]
struct Args {
    /// JSON file with a list of runs.
    #[arg(long)]
    input: PathBuf,

    /// Write the results of every run to this file as JSON.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Seed for the generated codes and distances.
    #[arg(long, default_value_t = 0xb175_ca9)]
    seed: u64,
}

fn main() -> ExitCode {
    init_subscriber();
    let args = Args::parse();
    ExitCode::from(report(main_inner(&args)))
}

/// Log the outcome of a session and return the process exit status. Errors are reported
/// here only, so the caller must not print them again.
fn report(outcome: anyhow::Result<Vec<RunResult>>) -> u8 {
    match outcome {
        Ok(results) => {
            tracing::info!("completed {} runs", results.len());
            0
        }
        Err(err) => {
            tracing::error!("{:#}", err);
            1
        }
    }
}

fn main_inner(args: &Args) -> anyhow::Result<Vec<RunResult>> {
    let file = RunFile::load(&args.input)?;
    tracing::info!("loaded {} runs from {}", file.runs.len(), args.input.display());

    let results = run_all(&file, args.seed)?;
    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&results)?;
        std::fs::write(output, json)
            .with_context(|| format!("failed to write {}", output.display()))?;
    }
    Ok(results)
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use std::path::Path;

    use bitscan_tools::utils::tracing::init_test_subscriber;

    use super::*;

    fn run_integration_test(input: &Path, output: &Path, seed: u64) -> serde_json::Value {
        let seed = seed.to_string();
        let args = Args::parse_from([
            "bitscan_run",
            "--input",
            input.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
            "--seed",
            seed.as_str(),
        ]);
        let results = main_inner(&args).unwrap();
        assert!(output.exists());

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(written.as_array().unwrap().len(), results.len());
        written
    }

    #[test]
    fn integration_test() {
        let _guard = init_test_subscriber();
        let input = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("demos")
            .join("run.json");

        let dir = tempfile::tempdir().unwrap();
        let first = run_integration_test(&input, &dir.path().join("first.json"), 7);
        let second = run_integration_test(&input, &dir.path().join("second.json"), 7);

        let checksums = |v: &serde_json::Value| -> Vec<u64> {
            v.as_array()
                .unwrap()
                .iter()
                .map(|r| r["checksum"].as_u64().unwrap())
                .collect()
        };
        assert_eq!(checksums(&first), checksums(&second));
        assert_eq!(first[0]["run"]["kind"], "hamming");
    }

    #[test]
    fn exit_status() {
        let _guard = init_test_subscriber();
        assert_eq!(report(Ok(Vec::new())), 0);
        assert_eq!(report(Err(anyhow::anyhow!("no runs"))), 1);
    }

    #[test]
    fn missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::parse_from([
            "bitscan_run",
            "--input",
            dir.path().join("absent.json").to_str().unwrap(),
        ]);
        let err = main_inner(&args).unwrap_err();
        assert!(format!("{err:#}").starts_with("failed to read"), "{err:#}");
    }
}
