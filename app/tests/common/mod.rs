//! Test helper module for E2E tests
//!
//! Provides `TestFixture` for setting up a snippet directory and running `snip`.

#![allow(dead_code)] // Test helpers may not be used in all test modules
#![allow(deprecated)] // cargo_bin() deprecation

pub mod mcp;

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use std::path::PathBuf;

/// Temporary snippet root with helpers for writing snippets and running
/// the `snip` CLI against it.
pub struct TestFixture {
    pub dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// The snippet root passed as `--root`.
    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    // ============ Snippet files ============

    /// Write `<root>/<path>` (e.g. `SSH/connect`), creating folders.
    pub fn add_snippet(&self, path: &str, content: &str) -> &Self {
        self.dir.child(path).write_str(content).unwrap();
        self
    }

    pub fn add_binary(&self, path: &str, bytes: &[u8]) -> &Self {
        self.dir.child(path).write_binary(bytes).unwrap();
        self
    }

    pub fn snippet_exists(&self, path: &str) -> bool {
        self.root().join(path).is_file()
    }

    pub fn read_snippet(&self, path: &str) -> String {
        std::fs::read_to_string(self.root().join(path)).unwrap()
    }

    /// The small example collection most tests search over.
    pub fn with_examples(&self) -> &Self {
        self.add_snippet("Find/in directory", "find . -maxdepth 1 ${name}")
            .add_snippet("Find/from directory", "find . -iname ${name}")
            .add_snippet("SSH/connect", "ssh ${user}@${host}")
    }

    // ============ snip CLI ============

    pub fn snip(&self) -> Command {
        let mut cmd = Command::cargo_bin("snip").unwrap();
        cmd.current_dir(self.root());
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// `snip <subcommand> --root <root> <args...>`
    pub fn run(&self, subcommand: &str, args: &[&str]) -> Command {
        let mut cmd = self.snip();
        cmd.arg(subcommand).arg("--root").arg(self.root()).args(args);
        cmd
    }

    /// Run `snip search` and return stdout.
    pub fn search(&self, input: &str) -> String {
        let output = self
            .run("search", &[input])
            .output()
            .expect("snip search failed");
        assert!(output.status.success(), "snip search exited with {}", output.status);
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    /// Run `snip list` and return stdout.
    pub fn list(&self) -> String {
        let output = self.run("list", &[]).output().expect("snip list failed");
        assert!(output.status.success());
        String::from_utf8_lossy(&output.stdout).into_owned()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
