/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{num::NonZeroUsize, path::Path};

use anyhow::Context;
use bitscan_select::DeviceConfig;
use serde::{Deserialize, Serialize};

const NUM_MEASUREMENTS: NonZeroUsize = NonZeroUsize::new(5).unwrap();

fn num_measurements() -> NonZeroUsize {
    NUM_MEASUREMENTS
}

/// Distance used by a Hamming scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    /// Number of differing bits.
    #[default]
    Bitwise,
    /// Number of differing bytes.
    Generalized,
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = match self {
            Self::Bitwise => "bitwise",
            Self::Generalized => "generalized",
        };
        write!(f, "{}", st)
    }
}

/// Score a random query against a buffer of random codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HammingRun {
    pub code_size: NonZeroUsize,
    pub num_codes: NonZeroUsize,
    #[serde(default)]
    pub distance: Distance,
    /// Return the `k` nearest codes instead of every distance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<NonZeroUsize>,
    /// Score codes on the Rayon thread pool.
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "num_measurements")]
    pub num_measurements: NonZeroUsize,
}

/// Select the top `k` of a random distance matrix with a random bias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectRun {
    pub rows: NonZeroUsize,
    pub cols: NonZeroUsize,
    pub k: NonZeroUsize,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default = "num_measurements")]
    pub num_measurements: NonZeroUsize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Run {
    Hamming(HammingRun),
    Select(SelectRun),
}

impl Run {
    /// Reject runs that are guaranteed to fail before generating any data.
    pub fn check(&self) -> anyhow::Result<()> {
        match self {
            Self::Hamming(run) => {
                if let Some(k) = run.k {
                    if run.distance == Distance::Generalized {
                        anyhow::bail!("nearest neighbor search requires the bitwise distance");
                    }
                    if k > run.num_codes {
                        anyhow::bail!(
                            "k ({}) exceeds the number of codes ({})",
                            k,
                            run.num_codes
                        );
                    }
                }
                if run.distance == Distance::Generalized
                    && !run.code_size.get().is_multiple_of(8)
                {
                    anyhow::bail!(
                        "generalized Hamming distance requires a code size that is a multiple \
                         of 8, instead got {}",
                        run.code_size
                    );
                }
            }
            Self::Select(run) => {
                if run.k > run.cols {
                    anyhow::bail!("k ({}) exceeds the number of columns ({})", run.k, run.cols);
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Run {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hamming(run) => {
                write!(
                    f,
                    "{} hamming, {} codes of {} bytes",
                    run.distance, run.num_codes, run.code_size
                )?;
                if let Some(k) = run.k {
                    write!(f, ", k = {}", k)?;
                }
                Ok(())
            }
            Self::Select(run) => write!(
                f,
                "select, {} x {}, k = {}",
                run.rows, run.cols, run.k
            ),
        }
    }
}

/// The contents of an input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFile {
    pub runs: Vec<Run>,
}

impl RunFile {
    /// Parse and check the run file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid run file {}", path.display()))
    }

    /// Parse and check a run file from a JSON string.
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let file: Self = serde_json::from_str(contents)?;
        for (i, run) in file.runs.iter().enumerate() {
            run.check().with_context(|| format!("run {}", i))?;
        }
        Ok(file)
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_runs() {
        let file = RunFile::parse(
            r#"{
                "runs": [
                    {"kind": "hamming", "code_size": 32, "num_codes": 1000},
                    {"kind": "hamming", "code_size": 16, "num_codes": 10, "distance": "generalized",
                     "parallel": true, "num_measurements": 2},
                    {"kind": "select", "rows": 4, "cols": 100, "k": 10,
                     "device": {"num_threads": 2, "launch": {"lanes": 8}}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(file.runs.len(), 3);
        match &file.runs[0] {
            Run::Hamming(run) => {
                assert_eq!(run.code_size.get(), 32);
                assert_eq!(run.distance, Distance::Bitwise);
                assert_eq!(run.k, None);
                assert!(!run.parallel);
                assert_eq!(run.num_measurements, NUM_MEASUREMENTS);
            }
            other => panic!("unexpected run {other:?}"),
        }
        match &file.runs[2] {
            Run::Select(run) => {
                assert_eq!(run.k.get(), 10);
                assert_eq!(run.device.num_threads, NonZeroUsize::new(2));
                assert_eq!(run.device.launch.lanes().get(), 8);
            }
            other => panic!("unexpected run {other:?}"),
        }
        assert_eq!(
            file.runs[1].to_string(),
            "generalized hamming, 10 codes of 16 bytes"
        );
    }

    #[test]
    fn rejected_runs() {
        let err = RunFile::parse(
            r#"{"runs": [{"kind": "select", "rows": 1, "cols": 5, "k": 6}]}"#,
        )
        .unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "run 0: k (6) exceeds the number of columns (5)"
        );

        let err = RunFile::parse(
            r#"{"runs": [{"kind": "hamming", "code_size": 12, "num_codes": 5,
                          "distance": "generalized"}]}"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("multiple of 8"), "{err:#}");

        assert!(RunFile::parse(r#"{"runs": [{"kind": "hamming", "code_size": 0, "num_codes": 1}]}"#).is_err());
        assert!(RunFile::parse(r#"{"runs": [{"kind": "sort"}]}"#).is_err());
        assert!(RunFile::parse(r#"{"runs": [], "seed": 1}"#).is_err());
    }
}
