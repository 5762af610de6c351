//! Agent configuration: host/GPU type selection and sampling settings.
//!
//! `HostType` and `GpuType` are closed enums resolved once at startup;
//! they select which source readers get built and which sensor paths are
//! probed. Invalid values are fatal configuration errors.

use std::str::FromStr;
use std::time::Duration;

/// Host type, selecting the thermal zone the CPU temperature comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostType {
    #[default]
    Generic,
    RaspberryPi,
}

impl HostType {
    /// Thermal zone `type` string this host exposes its CPU package
    /// temperature under.
    pub fn thermal_zone_type(self) -> &'static str {
        match self {
            HostType::Generic => "x86_pkg_temp",
            HostType::RaspberryPi => "cpu-thermal",
        }
    }
}

impl FromStr for HostType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(HostType::Generic),
            "raspberrypi" => Ok(HostType::RaspberryPi),
            other => Err(ConfigError::InvalidHostType(other.to_string())),
        }
    }
}

impl std::fmt::Display for HostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostType::Generic => write!(f, "generic"),
            HostType::RaspberryPi => write!(f, "raspberrypi"),
        }
    }
}

/// GPU type, selecting (or disabling) the GPU temperature reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuType {
    #[default]
    None,
    Nvidia,
    Amd,
}

impl FromStr for GpuType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(GpuType::None),
            "nvidia" => Ok(GpuType::Nvidia),
            "amd" => Ok(GpuType::Amd),
            other => Err(ConfigError::InvalidGpuType(other.to_string())),
        }
    }
}

impl std::fmt::Display for GpuType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuType::None => write!(f, "none"),
            GpuType::Nvidia => write!(f, "nvidia"),
            GpuType::Amd => write!(f, "amd"),
        }
    }
}

/// Settings consumed by reader construction and the sampling pipeline.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base path of the proc filesystem (usually "/proc").
    pub proc_path: String,
    /// Base path of the sys filesystem (usually "/sys").
    pub sys_path: String,
    /// Substring filter on interface names; `None` collects all interfaces.
    pub net_interface_filter: Option<String>,
    pub host_type: HostType,
    pub gpu_type: GpuType,
    /// Fixed sampling interval.
    pub interval: Duration,
    /// Consecutive cycles a counter key may go unobserved before its
    /// rate state is evicted.
    pub stale_cycles: u64,
}

impl AgentConfig {
    /// Maximum interval over which a rate is still computed; longer gaps
    /// re-seed instead of producing diluted rates.
    pub fn max_rate_dt_secs(&self) -> f64 {
        (self.interval.as_secs_f64() * 10.0).max(60.0)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            proc_path: "/proc".to_string(),
            sys_path: "/sys".to_string(),
            net_interface_filter: None,
            host_type: HostType::Generic,
            gpu_type: GpuType::None,
            interval: Duration::from_secs(10),
            stale_cycles: 5,
        }
    }
}

/// Checks startup timing values. A zero interval would panic the sampling
/// loop after startup and a zero timeout would fail every read, so both
/// are rejected before any task is spawned.
pub fn validate_timing(interval_secs: u64, reader_timeout_secs: u64) -> Result<(), ConfigError> {
    if interval_secs == 0 {
        return Err(ConfigError::InvalidInterval(interval_secs));
    }
    if reader_timeout_secs == 0 {
        return Err(ConfigError::InvalidReaderTimeout(reader_timeout_secs));
    }
    Ok(())
}

/// Fatal startup configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    InvalidHostType(String),
    InvalidGpuType(String),
    InvalidInterval(u64),
    InvalidReaderTimeout(u64),
    /// Thermal zones were exhausted without finding the expected type.
    ThermalZoneNotFound(HostType),
    /// DRM cards were exhausted without finding the expected hwmon name.
    GpuNotFound(GpuType),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidHostType(s) => {
                write!(f, "invalid host type {:?} (expected generic|raspberrypi)", s)
            }
            ConfigError::InvalidGpuType(s) => {
                write!(f, "invalid gpu type {:?} (expected none|nvidia|amd)", s)
            }
            ConfigError::InvalidInterval(s) => {
                write!(f, "invalid sampling interval {}s (must be at least 1)", s)
            }
            ConfigError::InvalidReaderTimeout(s) => {
                write!(f, "invalid reader timeout {}s (must be at least 1)", s)
            }
            ConfigError::ThermalZoneNotFound(host) => write!(
                f,
                "no thermal zone of type {:?} found for host type {}",
                host.thermal_zone_type(),
                host
            ),
            ConfigError::GpuNotFound(gpu) => {
                write!(f, "no {} GPU sensor found", gpu)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_type_from_str() {
        assert_eq!("generic".parse::<HostType>().unwrap(), HostType::Generic);
        assert_eq!(
            "raspberrypi".parse::<HostType>().unwrap(),
            HostType::RaspberryPi
        );
        assert!("commodore64".parse::<HostType>().is_err());
    }

    #[test]
    fn gpu_type_from_str() {
        assert_eq!("none".parse::<GpuType>().unwrap(), GpuType::None);
        assert_eq!("nvidia".parse::<GpuType>().unwrap(), GpuType::Nvidia);
        assert_eq!("amd".parse::<GpuType>().unwrap(), GpuType::Amd);
        assert!("voodoo2".parse::<GpuType>().is_err());
    }

    #[test]
    fn thermal_zone_type_by_host() {
        assert_eq!(HostType::Generic.thermal_zone_type(), "x86_pkg_temp");
        assert_eq!(HostType::RaspberryPi.thermal_zone_type(), "cpu-thermal");
    }

    #[test]
    fn zero_interval_is_rejected() {
        // interval(Duration::ZERO) panics inside the sampling task where
        // nothing would surface it, so startup must refuse the value.
        assert!(matches!(
            validate_timing(0, 5),
            Err(ConfigError::InvalidInterval(0))
        ));
    }

    #[test]
    fn zero_reader_timeout_is_rejected() {
        assert!(matches!(
            validate_timing(10, 0),
            Err(ConfigError::InvalidReaderTimeout(0))
        ));
    }

    #[test]
    fn default_timing_is_valid() {
        assert!(validate_timing(10, 5).is_ok());
        assert!(validate_timing(1, 1).is_ok());
    }

    #[test]
    fn max_rate_dt_scales_with_interval() {
        let mut cfg = AgentConfig::default();
        assert!((cfg.max_rate_dt_secs() - 100.0).abs() < 1e-9);
        cfg.interval = Duration::from_secs(1);
        // Floor of 60s for short intervals.
        assert!((cfg.max_rate_dt_secs() - 60.0).abs() < 1e-9);
    }
}
