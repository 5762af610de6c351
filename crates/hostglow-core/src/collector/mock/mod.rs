//! In-memory implementations of [`FileSystem`] and [`CommandRunner`].
//!
//! Clones share the same backing store, so a test (or the non-Linux demo
//! runtime) can hand clones to the readers and still mutate file contents
//! between sampling cycles.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::collector::traits::{CommandRunner, FileSystem};

/// Mock filesystem backed by a shared path-to-content map.
#[derive(Debug, Default, Clone)]
pub struct MockFs {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a file's contents.
    pub fn set_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), content.into());
    }

    /// Removes a file, making subsequent reads fail with `NotFound`.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.files.lock().unwrap().remove(path.as_ref());
    }

    /// A plausible idle x86 host: every standard source present, one
    /// non-loopback interface, one disk, one package thermal zone.
    pub fn typical_system() -> Self {
        let fs = Self::new();
        fs.set_file("/proc/loadavg", "0.52 0.58 0.59 1/977 12345\n");
        fs.set_file(
            "/proc/meminfo",
            "MemTotal:       16384000 kB\n\
             MemFree:         8192000 kB\n\
             MemAvailable:   12000000 kB\n\
             Buffers:          512000 kB\n",
        );
        fs.set_file("/proc/uptime", "35412.74 131400.28\n");
        fs.set_file(
            "/proc/net/dev",
            "Inter-|   Receive                                                |  Transmit\n \
             face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n\
                 lo:  123456     1000    0    0    0     0          0         0   123456     1000    0    0    0     0       0          0\n\
             enp3s0: 9876543     5678    0    0    0     0          0         0 87654321     4321    0    0    0     0       0          0\n",
        );
        fs.set_file(
            "/proc/diskstats",
            "   8       0 sda 1234 0 56789 100 5678 0 98765 200 0 150 300 0 0 0 0\n",
        );
        fs.set_file("/sys/class/thermal/thermal_zone0/type", "x86_pkg_temp\n");
        fs.set_file("/sys/class/thermal/thermal_zone0/temp", "45000\n");
        fs
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{:?}", path)))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }
}

/// Mock command runner mapping program names to canned stdout or errors.
#[derive(Debug, Default, Clone)]
pub struct MockCommand {
    outputs: Arc<Mutex<HashMap<String, Result<String, String>>>>,
}

impl MockCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `program` succeed with the given (trimmed) stdout.
    pub fn set_output(&self, program: &str, stdout: &str) {
        self.outputs
            .lock()
            .unwrap()
            .insert(program.to_string(), Ok(stdout.trim().to_string()));
    }

    /// Makes `program` fail with the given message.
    pub fn set_failure(&self, program: &str, message: &str) {
        self.outputs
            .lock()
            .unwrap()
            .insert(program.to_string(), Err(message.to_string()));
    }
}

impl CommandRunner for MockCommand {
    fn run(&self, program: &str, _args: &[&str]) -> io::Result<String> {
        match self.outputs.lock().unwrap().get(program) {
            Some(Ok(stdout)) => Ok(stdout.clone()),
            Some(Err(message)) => Err(io::Error::other(message.clone())),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: command not found", program),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let fs = MockFs::new();
        let clone = fs.clone();
        fs.set_file("/proc/uptime", "1.0 2.0\n");
        assert_eq!(
            clone.read_to_string(Path::new("/proc/uptime")).unwrap(),
            "1.0 2.0\n"
        );

        clone.remove_file("/proc/uptime");
        assert!(!fs.exists(Path::new("/proc/uptime")));
    }

    #[test]
    fn typical_system_has_all_sources() {
        let fs = MockFs::typical_system();
        for path in [
            "/proc/loadavg",
            "/proc/meminfo",
            "/proc/uptime",
            "/proc/net/dev",
            "/proc/diskstats",
            "/sys/class/thermal/thermal_zone0/type",
            "/sys/class/thermal/thermal_zone0/temp",
        ] {
            assert!(fs.exists(Path::new(path)), "missing {}", path);
        }
    }

    #[test]
    fn mock_command_outputs() {
        let cmd = MockCommand::new();
        cmd.set_output("nvidia-smi", "62\n");
        assert_eq!(cmd.run("nvidia-smi", &[]).unwrap(), "62");

        cmd.set_failure("nvidia-smi", "driver not loaded");
        assert!(cmd.run("nvidia-smi", &[]).is_err());
        assert!(cmd.run("unknown", &[]).is_err());
    }
}
