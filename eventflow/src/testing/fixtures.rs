//! On-disk fixtures for end-to-end runs.

use crate::core::Event;
use crate::options::RunDescriptor;
use anyhow::Context;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Events numbered `0..count` carrying `{"n": number}`.
#[must_use]
pub fn numbered_events(count: u64) -> Vec<Event> {
    (0..count)
        .map(|n| Event::new(n, serde_json::json!({ "n": n })))
        .collect()
}

/// Writes a raw JSON-lines input artifact for the source `<dir>/<base>.txt`.
///
/// The artifact lands at `<dir>/<base>.root`, which is where a host with an
/// empty input kind looks for it. Returns the source path to put in a run
/// descriptor.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_input_artifact(dir: &Path, base: &str, count: u64) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let artifact = dir.join(format!("{base}.root"));
    let mut file = fs::File::create(&artifact)
        .with_context(|| format!("creating {}", artifact.display()))?;
    for n in 0..count {
        writeln!(file, "{}", serde_json::json!({ "n": n }))?;
    }
    Ok(dir.join(format!("{base}.txt")))
}

/// Writes one scope file per channel prefix for every trigger number.
///
/// Files are named `<prefix>_<trigger:05>.txt` and hold a header line
/// followed by `samples` time/amplitude pairs.
///
/// # Errors
///
/// Returns an error if a file cannot be written.
pub fn write_scope_files(
    dir: &Path,
    prefixes: &[&str],
    triggers: &[u64],
    samples: usize,
) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut written = Vec::new();
    for prefix in prefixes {
        for trigger in triggers {
            let path = dir.join(format!("{prefix}_{trigger:05}.txt"));
            let mut file = fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            writeln!(file, "time amplitude")?;
            for i in 0..samples {
                writeln!(file, "{}e-9 {}", i, (i % 7) as f64 * 0.5)?;
            }
            written.push(path);
        }
    }
    Ok(written)
}

/// Serializes descriptors into a run configuration document.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn run_config_json(descriptors: &[RunDescriptor]) -> anyhow::Result<String> {
    serde_json::to_string_pretty(descriptors).context("serializing run descriptors")
}

/// Reads every JSON-lines record of an artifact as a raw value.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line is not JSON.
pub fn read_records(path: &Path) -> anyhow::Result<Vec<serde_json::Value>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).context("parsing record"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_events() {
        let events = numbered_events(3);
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].number, 2);
        assert_eq!(events[2].payload["n"], 2);
    }

    #[test]
    fn test_write_input_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_input_artifact(dir.path(), "pos1", 4).unwrap();
        assert_eq!(source, dir.path().join("pos1.txt"));
        let records = read_records(&dir.path().join("pos1.root")).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[3]["n"], 3);
    }

    #[test]
    fn test_write_scope_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_scope_files(dir.path(), &["C1", "C2"], &[3, 4], 5).unwrap();
        assert_eq!(files.len(), 4);
        assert!(dir.path().join("C2_00004.txt").exists());
    }

    #[test]
    fn test_run_config_json() {
        let raw = run_config_json(&[RunDescriptor::new("in/a.txt")]).unwrap();
        assert!(raw.contains("in/a.txt"));
    }
}
