//! Output file naming and writing
//!
//! `{sample}_enhanced.json` becomes `{sample}_hl7.json`; any other stem gets an
//! `_hl7` suffix. The failure log sits next to it as `{stem}_failures.json`.

use crate::error::FailureRecord;
use std::path::{Path, PathBuf};
use vsr_common::{Report, Result};

const INPUT_SUFFIX: &str = "_enhanced";
const OUTPUT_SUFFIX: &str = "_hl7";

/// Output stem for an input report path
pub fn output_stem(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let base = stem.strip_suffix(INPUT_SUFFIX).unwrap_or(&stem);
    format!("{}{}", base, OUTPUT_SUFFIX)
}

/// Paths of the enriched report and its failure log inside `output_dir`
pub fn output_paths(input: &Path, output_dir: &Path) -> (PathBuf, PathBuf) {
    let stem = output_stem(input);
    (
        output_dir.join(format!("{}.json", stem)),
        output_dir.join(format!("{}_failures.json", stem)),
    )
}

pub fn write_report(path: &Path, report: &Report) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn write_failures(path: &Path, failures: &[FailureRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(failures)?;
    std::fs::write(path, json)?;
    Ok(())
}
