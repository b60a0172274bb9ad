#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.temp_dir.path().join(name)).expect("read workspace file")
    }
}

pub const PRIMARY_CSV: &str = "id,name\n24100,Alice\n24101,Bob\n";
pub const SECONDARY_CSV: &str = "id;region\n16100;North\n";

/// Run file for the two-source scenario: NAME from P, REGION from S through
/// the 24/16 prefix swap.
pub const RUN_YAML: &str = r#"
destination: [ID, NAME, REGION]
identifier_rules:
  - { kind: replace_prefix, from: "24", to: "16" }
  - { kind: replace_prefix, from: "16", to: "24" }
sources:
  - { name: P, path: primary.csv, identifier_column: id, priority: 1 }
  - { name: S, path: secondary.csv, identifier_column: id, priority: 2, delimiter: ";" }
rules:
  - { target: ID, kind: direct, source: P, column: id }
  - { target: NAME, kind: direct, source: P, column: name }
  - { target: REGION, kind: direct, source: S, column: region }
scope:
  identifiers: ["24100", "24101"]
"#;

/// Writes the scenario sources and run file, returning the run file path.
pub fn write_scenario(workspace: &TestWorkspace) -> PathBuf {
    workspace.write("primary.csv", PRIMARY_CSV);
    workspace.write("secondary.csv", SECONDARY_CSV);
    workspace.write("run.yaml", RUN_YAML)
}
