//! Abstractions for filesystem and command access to enable mocking.
//!
//! The `FileSystem` trait lets readers work against the real `/proc` and
//! `/sys` trees on Linux or against an in-memory mock in tests and on other
//! platforms. `CommandRunner` does the same for vendor tools that only
//! speak stdout (`nvidia-smi`).

use std::io;
use std::path::Path;
use std::process::Command;

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Abstraction for running an external command and capturing stdout.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args`, returning trimmed stdout on success.
    fn run(&self, program: &str, args: &[&str]) -> io::Result<String>;
}

/// Real command runner that delegates to `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealCommand;

impl RealCommand {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for RealCommand {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<String> {
        let out = Command::new(program).args(args).output()?;
        if !out.status.success() {
            return Err(io::Error::other(format!(
                "{} exited with {}",
                program, out.status
            )));
        }
        String::from_utf8(out.stdout)
            .map(|s| s.trim().to_string())
            .map_err(|_| io::Error::other(format!("{} produced non-utf8 output", program)))
    }
}
