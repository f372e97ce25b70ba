//! Artifact naming.
//!
//! A source path `dir/base.ext1.ext2` and an artifact kind `k` produce
//! `dir/base.k.root`. The base name is cut at the first `.`, so repeated
//! resolution of an already-resolved name is stable.

use std::path::{Path, PathBuf};

/// Fixed extension of every artifact produced by a host.
pub const ARTIFACT_EXTENSION: &str = "root";

/// Derives an artifact name from a source path and an artifact kind.
///
/// An empty `kind` yields `dir/base.root`.
#[must_use]
pub fn generate_name(source: &str, kind: &str) -> String {
    let path = Path::new(source);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(source);
    let base = file_name.split('.').next().unwrap_or_default();

    let mut name = String::with_capacity(base.len() + kind.len() + ARTIFACT_EXTENSION.len() + 2);
    name.push_str(base);
    if !kind.is_empty() {
        name.push('.');
        name.push_str(kind);
    }
    name.push('.');
    name.push_str(ARTIFACT_EXTENSION);

    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(name).to_string_lossy().into_owned(),
        _ => name,
    }
}

/// Resolves the path of an artifact, honoring an optional output directory.
///
/// When `output_dir` is set only the generated file name is kept and placed
/// inside that directory.
#[must_use]
pub fn resolve_artifact_path(source: &str, kind: &str, output_dir: Option<&str>) -> PathBuf {
    let generated = PathBuf::from(generate_name(source, kind));
    match (output_dir, generated.file_name()) {
        (Some(dir), Some(file_name)) => Path::new(dir).join(file_name),
        _ => generated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_truncates_at_first_dot() {
        assert_eq!(generate_name("dir/c1_0554.txt", "reco"), "dir/c1_0554.reco.root");
        assert_eq!(
            generate_name("data/run.2024.raw.txt", "calib"),
            "data/run.calib.root"
        );
    }

    #[test]
    fn test_empty_kind() {
        assert_eq!(generate_name("dir/c1_0554.txt", ""), "dir/c1_0554.root");
        assert_eq!(generate_name("plain", ""), "plain.root");
    }

    #[test]
    fn test_multi_part_kind() {
        assert_eq!(
            generate_name("unitTestData/x/test_file.json", "reco.sig"),
            "unitTestData/x/test_file.reco.sig.root"
        );
    }

    #[test]
    fn test_is_idempotent() {
        let once = generate_name("dir/c1_0554.txt", "reco");
        assert_eq!(generate_name("dir/c1_0554.txt", "reco"), once);
        assert_eq!(generate_name(&once, "reco"), once);
    }

    #[test]
    fn test_output_dir_keeps_file_name() {
        assert_eq!(
            resolve_artifact_path("in/pos1.txt", "reco", Some("out")),
            PathBuf::from("out/pos1.reco.root")
        );
        assert_eq!(
            resolve_artifact_path("in/pos1.txt", "reco", None),
            PathBuf::from("in/pos1.reco.root")
        );
    }
}
