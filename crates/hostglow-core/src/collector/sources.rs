//! The source readers and their startup-time sensor resolution.
//!
//! A [`SourceReader`] reads one OS text interface per cycle and returns
//! typed [`Sample`]s. Paths and sensor identifiers are resolved once in
//! [`build_readers`]; per-cycle failures surface as [`ReadError`] and are
//! contained by the pipeline, never aborting the cycle for other readers.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use crate::collector::parser::{
    parse_diskstats, parse_loadavg, parse_meminfo, parse_millidegrees, parse_net_dev,
    parse_nvidia_smi_temp, parse_uptime,
};
use crate::collector::traits::{CommandRunner, FileSystem};
use crate::config::{AgentConfig, ConfigError, GpuType, HostType};

/// A sector is 512 bytes in /proc/diskstats regardless of the device's
/// logical block size.
const SECTOR_BYTES: u64 = 512;

/// How a raw sample value is to be interpreted downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// Instantaneous value, used directly.
    Gauge,
    /// Cumulative counter; the pipeline converts it to a per-second rate.
    Counter,
}

/// One raw reading produced by a source reader during a cycle.
///
/// For counters, `name` is already the name of the *derived* rate metric;
/// `value` is the cumulative reading the converter diffs.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: &'static str,
    pub labels: Vec<(&'static str, String)>,
    pub kind: SampleKind,
    pub value: f64,
    pub help: &'static str,
}

impl Sample {
    pub fn gauge(name: &'static str, help: &'static str, value: f64) -> Self {
        Self {
            name,
            labels: Vec::new(),
            kind: SampleKind::Gauge,
            value,
            help,
        }
    }

    pub fn counter(name: &'static str, help: &'static str, value: f64) -> Self {
        Self {
            name,
            labels: Vec::new(),
            kind: SampleKind::Counter,
            value,
            help,
        }
    }

    pub fn with_label(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.labels.push((key, value.into()));
        self
    }
}

/// Error type for whole-source read failures.
///
/// Field-level parse problems are not errors: readers skip the field and
/// return the rest (partial success).
#[derive(Debug)]
pub enum ReadError {
    /// The backing path is missing or unreadable this cycle.
    Unavailable { path: String, cause: io::Error },
    /// A vendor command failed to run or exited non-zero.
    Command { program: String, cause: io::Error },
    /// The read did not complete within the per-reader budget.
    Timeout { after: Duration },
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::Unavailable { path, cause } => {
                write!(f, "source {} unavailable: {}", path, cause)
            }
            ReadError::Command { program, cause } => {
                write!(f, "command {} failed: {}", program, cause)
            }
            ReadError::Timeout { after } => {
                write!(f, "read timed out after {:?}", after)
            }
        }
    }
}

impl std::error::Error for ReadError {}

/// One OS text interface, read once per sampling cycle.
pub trait SourceReader: Send {
    /// Stable identifier, used for logging and the `source_up` metric.
    fn source_id(&self) -> &'static str;

    /// Reads the source and returns what parsed. Field-level failures are
    /// skipped; only whole-source failures return an error.
    fn read(&mut self) -> Result<Vec<Sample>, ReadError>;
}

/// Reader handle shared between the sync cycle driver and the async loop.
pub type SharedReader = Arc<Mutex<Box<dyn SourceReader + Send>>>;

fn read_path<F: FileSystem>(fs: &F, path: &Path) -> Result<String, ReadError> {
    fs.read_to_string(path)
        .map_err(|cause| ReadError::Unavailable {
            path: path.display().to_string(),
            cause,
        })
}

// ============================================================
// /proc readers
// ============================================================

/// Load averages from `/proc/loadavg`.
pub struct LoadAvgReader<F> {
    fs: F,
    path: PathBuf,
}

impl<F: FileSystem> LoadAvgReader<F> {
    pub fn new(fs: F, proc_path: &str) -> Self {
        Self {
            fs,
            path: Path::new(proc_path).join("loadavg"),
        }
    }
}

impl<F: FileSystem> SourceReader for LoadAvgReader<F> {
    fn source_id(&self) -> &'static str {
        "loadavg"
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let content = read_path(&self.fs, &self.path)?;
        match parse_loadavg(&content) {
            Ok(load) => Ok(vec![
                Sample::gauge(
                    "hostglow_load_average_1m",
                    "System load average over the last minute",
                    load.load1,
                ),
                Sample::gauge(
                    "hostglow_load_average_5m",
                    "System load average over the last five minutes",
                    load.load5,
                ),
                Sample::gauge(
                    "hostglow_load_average_15m",
                    "System load average over the last fifteen minutes",
                    load.load15,
                ),
            ]),
            Err(e) => {
                debug!(source = self.source_id(), error = %e, "skipping unparsable content");
                Ok(Vec::new())
            }
        }
    }
}

/// Memory figures from `/proc/meminfo`.
pub struct MemInfoReader<F> {
    fs: F,
    path: PathBuf,
}

impl<F: FileSystem> MemInfoReader<F> {
    pub fn new(fs: F, proc_path: &str) -> Self {
        Self {
            fs,
            path: Path::new(proc_path).join("meminfo"),
        }
    }
}

impl<F: FileSystem> SourceReader for MemInfoReader<F> {
    fn source_id(&self) -> &'static str {
        "meminfo"
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let content = read_path(&self.fs, &self.path)?;
        let info = match parse_meminfo(&content) {
            Ok(info) => info,
            Err(e) => {
                debug!(source = self.source_id(), error = %e, "skipping unparsable content");
                return Ok(Vec::new());
            }
        };

        let mut samples = Vec::with_capacity(3);
        if let Some(total) = info.total_kb {
            samples.push(Sample::gauge(
                "hostglow_memory_total_kilobytes",
                "Total RAM reported by the kernel",
                total as f64,
            ));
        }
        if let Some(available) = info.available_kb {
            samples.push(Sample::gauge(
                "hostglow_memory_available_kilobytes",
                "Estimate of RAM available for new workloads",
                available as f64,
            ));
        }
        if let Some(used) = info.used_kb() {
            samples.push(Sample::gauge(
                "hostglow_memory_used_kilobytes",
                "Current RAM usage (total minus available)",
                used as f64,
            ));
        }
        Ok(samples)
    }
}

/// Uptime from `/proc/uptime`.
pub struct UptimeReader<F> {
    fs: F,
    path: PathBuf,
}

impl<F: FileSystem> UptimeReader<F> {
    pub fn new(fs: F, proc_path: &str) -> Self {
        Self {
            fs,
            path: Path::new(proc_path).join("uptime"),
        }
    }
}

impl<F: FileSystem> SourceReader for UptimeReader<F> {
    fn source_id(&self) -> &'static str {
        "uptime"
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let content = read_path(&self.fs, &self.path)?;
        match parse_uptime(&content) {
            Ok(seconds) => Ok(vec![Sample::gauge(
                "hostglow_uptime_seconds",
                "System uptime in seconds",
                seconds,
            )]),
            Err(e) => {
                debug!(source = self.source_id(), error = %e, "skipping unparsable content");
                Ok(Vec::new())
            }
        }
    }
}

/// Per-interface traffic counters from `/proc/net/dev`.
pub struct NetDevReader<F> {
    fs: F,
    path: PathBuf,
    /// Substring filter on interface names; `None` collects everything.
    filter: Option<String>,
}

impl<F: FileSystem> NetDevReader<F> {
    pub fn new(fs: F, proc_path: &str, filter: Option<String>) -> Self {
        Self {
            fs,
            path: Path::new(proc_path).join("net/dev"),
            filter,
        }
    }

    fn matches(&self, interface: &str) -> bool {
        match &self.filter {
            Some(f) => interface.contains(f.as_str()),
            None => true,
        }
    }
}

impl<F: FileSystem> SourceReader for NetDevReader<F> {
    fn source_id(&self) -> &'static str {
        "netdev"
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let content = read_path(&self.fs, &self.path)?;
        let devices = match parse_net_dev(&content) {
            Ok(devices) => devices,
            Err(e) => {
                debug!(source = self.source_id(), error = %e, "skipping unparsable content");
                return Ok(Vec::new());
            }
        };

        let mut samples = Vec::new();
        for dev in devices.iter().filter(|d| self.matches(&d.interface)) {
            samples.push(
                Sample::counter(
                    "hostglow_network_receive_bytes_per_second",
                    "Bytes received per second on the interface",
                    dev.rx_bytes as f64,
                )
                .with_label("interface", &dev.interface),
            );
            samples.push(
                Sample::counter(
                    "hostglow_network_transmit_bytes_per_second",
                    "Bytes transmitted per second on the interface",
                    dev.tx_bytes as f64,
                )
                .with_label("interface", &dev.interface),
            );
            samples.push(
                Sample::counter(
                    "hostglow_network_receive_packets_per_second",
                    "Packets received per second on the interface",
                    dev.rx_packets as f64,
                )
                .with_label("interface", &dev.interface),
            );
            samples.push(
                Sample::counter(
                    "hostglow_network_transmit_packets_per_second",
                    "Packets transmitted per second on the interface",
                    dev.tx_packets as f64,
                )
                .with_label("interface", &dev.interface),
            );
        }
        Ok(samples)
    }
}

/// Per-device I/O counters from `/proc/diskstats`.
pub struct DiskStatsReader<F> {
    fs: F,
    path: PathBuf,
}

impl<F: FileSystem> DiskStatsReader<F> {
    pub fn new(fs: F, proc_path: &str) -> Self {
        Self {
            fs,
            path: Path::new(proc_path).join("diskstats"),
        }
    }
}

impl<F: FileSystem> SourceReader for DiskStatsReader<F> {
    fn source_id(&self) -> &'static str {
        "diskstats"
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let content = read_path(&self.fs, &self.path)?;
        let disks = match parse_diskstats(&content) {
            Ok(disks) => disks,
            Err(e) => {
                debug!(source = self.source_id(), error = %e, "skipping unparsable content");
                return Ok(Vec::new());
            }
        };

        let mut samples = Vec::with_capacity(disks.len() * 2);
        for disk in &disks {
            samples.push(
                Sample::counter(
                    "hostglow_disk_read_bytes_per_second",
                    "Bytes read per second from the block device",
                    (disk.read_sectors * SECTOR_BYTES) as f64,
                )
                .with_label("device", &disk.device),
            );
            samples.push(
                Sample::counter(
                    "hostglow_disk_write_bytes_per_second",
                    "Bytes written per second to the block device",
                    (disk.write_sectors * SECTOR_BYTES) as f64,
                )
                .with_label("device", &disk.device),
            );
        }
        Ok(samples)
    }
}

// ============================================================
// /sys and vendor readers
// ============================================================

/// CPU package temperature from a thermal zone resolved at startup.
pub struct ThermalReader<F> {
    fs: F,
    temp_path: PathBuf,
}

impl<F: FileSystem> ThermalReader<F> {
    pub fn new(fs: F, temp_path: PathBuf) -> Self {
        Self { fs, temp_path }
    }
}

impl<F: FileSystem> SourceReader for ThermalReader<F> {
    fn source_id(&self) -> &'static str {
        "thermal"
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let content = read_path(&self.fs, &self.temp_path)?;
        match parse_millidegrees(&content) {
            Ok(celsius) => Ok(vec![Sample::gauge(
                "hostglow_cpu_temperature_celsius",
                "CPU package temperature in degrees Celsius",
                celsius,
            )]),
            Err(e) => {
                debug!(source = self.source_id(), error = %e, "skipping unparsable content");
                Ok(Vec::new())
            }
        }
    }
}

/// AMD GPU temperature from the hwmon sensor resolved at startup.
pub struct AmdGpuReader<F> {
    fs: F,
    temp_path: PathBuf,
}

impl<F: FileSystem> AmdGpuReader<F> {
    pub fn new(fs: F, temp_path: PathBuf) -> Self {
        Self { fs, temp_path }
    }
}

impl<F: FileSystem> SourceReader for AmdGpuReader<F> {
    fn source_id(&self) -> &'static str {
        "gpu"
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let content = read_path(&self.fs, &self.temp_path)?;
        match parse_millidegrees(&content) {
            Ok(celsius) => Ok(vec![Sample::gauge(
                "hostglow_gpu_temperature_celsius",
                "GPU temperature in degrees Celsius",
                celsius,
            )]),
            Err(e) => {
                debug!(source = self.source_id(), error = %e, "skipping unparsable content");
                Ok(Vec::new())
            }
        }
    }
}

const NVIDIA_SMI: &str = "nvidia-smi";
const NVIDIA_SMI_ARGS: &[&str] = &["--query-gpu=temperature.gpu", "--format=csv,noheader"];

/// NVIDIA GPU temperature via `nvidia-smi`.
pub struct NvidiaGpuReader<C> {
    runner: C,
}

impl<C: CommandRunner> NvidiaGpuReader<C> {
    pub fn new(runner: C) -> Self {
        Self { runner }
    }
}

impl<C: CommandRunner + Send> SourceReader for NvidiaGpuReader<C> {
    fn source_id(&self) -> &'static str {
        "gpu"
    }

    fn read(&mut self) -> Result<Vec<Sample>, ReadError> {
        let stdout =
            self.runner
                .run(NVIDIA_SMI, NVIDIA_SMI_ARGS)
                .map_err(|cause| ReadError::Command {
                    program: NVIDIA_SMI.to_string(),
                    cause,
                })?;
        match parse_nvidia_smi_temp(&stdout) {
            Ok(celsius) => Ok(vec![Sample::gauge(
                "hostglow_gpu_temperature_celsius",
                "GPU temperature in degrees Celsius",
                celsius,
            )]),
            Err(e) => {
                // nvidia-smi ran but could not talk to the driver.
                debug!(source = self.source_id(), error = %e, "skipping unparsable content");
                Ok(Vec::new())
            }
        }
    }
}

// ============================================================
// Startup resolution
// ============================================================

/// Thermal zones are numbered contiguously; scan stops at the first gap.
const MAX_THERMAL_ZONES: u32 = 100;

/// Two cards is already exotic for the hosts this agent targets.
const MAX_DRM_CARDS: u32 = 2;

/// Scans thermal zones for the type string the host exposes its CPU
/// package temperature under, returning the zone's `temp` path.
pub fn detect_thermal_zone<F: FileSystem>(
    fs: &F,
    sys_path: &str,
    host_type: HostType,
) -> Result<PathBuf, ConfigError> {
    for i in 0..MAX_THERMAL_ZONES {
        let type_path = format!("{}/class/thermal/thermal_zone{}/type", sys_path, i);
        let Ok(zone_type) = fs.read_to_string(Path::new(&type_path)) else {
            break;
        };
        if zone_type.trim() == host_type.thermal_zone_type() {
            return Ok(PathBuf::from(format!(
                "{}/class/thermal/thermal_zone{}/temp",
                sys_path, i
            )));
        }
    }
    Err(ConfigError::ThermalZoneNotFound(host_type))
}

/// Scans DRM cards for the amdgpu hwmon, returning its temperature path.
pub fn detect_amd_card<F: FileSystem>(fs: &F, sys_path: &str) -> Result<PathBuf, ConfigError> {
    for i in 0..MAX_DRM_CARDS {
        let name_path = format!("{}/class/drm/card{}/device/hwmon/hwmon1/name", sys_path, i);
        if let Ok(name) = fs.read_to_string(Path::new(&name_path))
            && name.trim() == "amdgpu"
        {
            return Ok(PathBuf::from(format!(
                "{}/class/drm/card{}/device/hwmon/hwmon1/temp1_input",
                sys_path, i
            )));
        }
    }
    Err(ConfigError::GpuNotFound(GpuType::Amd))
}

/// Builds the full reader set for a configuration, resolving sensor paths
/// once. `gpu_type = none` constructs no GPU reader at all.
pub fn build_readers<F, C>(
    fs: F,
    runner: C,
    cfg: &AgentConfig,
) -> Result<Vec<SharedReader>, ConfigError>
where
    F: FileSystem + Clone + 'static,
    C: CommandRunner + Send + 'static,
{
    let thermal_path = detect_thermal_zone(&fs, &cfg.sys_path, cfg.host_type)?;

    let mut readers: Vec<Box<dyn SourceReader + Send>> = vec![
        Box::new(LoadAvgReader::new(fs.clone(), &cfg.proc_path)),
        Box::new(MemInfoReader::new(fs.clone(), &cfg.proc_path)),
        Box::new(UptimeReader::new(fs.clone(), &cfg.proc_path)),
        Box::new(NetDevReader::new(
            fs.clone(),
            &cfg.proc_path,
            cfg.net_interface_filter.clone(),
        )),
        Box::new(DiskStatsReader::new(fs.clone(), &cfg.proc_path)),
        Box::new(ThermalReader::new(fs.clone(), thermal_path)),
    ];

    match cfg.gpu_type {
        GpuType::None => {}
        GpuType::Nvidia => readers.push(Box::new(NvidiaGpuReader::new(runner))),
        GpuType::Amd => {
            let temp_path = detect_amd_card(&fs, &cfg.sys_path)?;
            readers.push(Box::new(AmdGpuReader::new(fs, temp_path)));
        }
    }

    Ok(readers
        .into_iter()
        .map(|r| Arc::new(Mutex::new(r)))
        .collect())
}
