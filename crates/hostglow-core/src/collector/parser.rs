//! Parsers for `/proc` and `/sys` text interfaces.
//!
//! These are pure functions that parse pseudo-file contents into structured
//! data, designed to be testable with string inputs. Fields are identified
//! by name or by the documented column contract of each kernel interface,
//! never by strict line counts; a field that fails to parse is skipped
//! rather than failing the whole source.

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parsed data from `/proc/loadavg`.
///
/// Depends on the first three whitespace-separated fields (1/5/15 minute
/// load averages); the scheduler entity counts are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadAvg {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

/// Parses `/proc/loadavg` content.
pub fn parse_loadavg(content: &str) -> Result<LoadAvg, ParseError> {
    let mut parts = content.split_whitespace();

    let mut next = |name: &str| -> Result<f64, ParseError> {
        parts
            .next()
            .ok_or_else(|| ParseError::new(format!("missing {}", name)))?
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    Ok(LoadAvg {
        load1: next("load1")?,
        load5: next("load5")?,
        load15: next("load15")?,
    })
}

/// Parsed data from `/proc/meminfo`.
///
/// Depends on the `MemTotal` and `MemAvailable` lines (kB values).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemInfo {
    pub total_kb: Option<u64>,
    pub available_kb: Option<u64>,
}

impl MemInfo {
    /// Used memory (total − available), the load figure the agent exports.
    pub fn used_kb(&self) -> Option<u64> {
        match (self.total_kb, self.available_kb) {
            (Some(t), Some(a)) => Some(t.saturating_sub(a)),
            _ => None,
        }
    }
}

/// Parses `/proc/meminfo` content.
///
/// Missing or malformed lines leave the corresponding field `None`
/// (partial success); the parser itself only fails on empty input.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    if content.trim().is_empty() {
        return Err(ParseError::new("empty meminfo"));
    }

    let parse_kb = |line: &str| -> Option<u64> {
        line.split_once(':')
            .map(|(_, rest)| rest)?
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    };

    let mut info = MemInfo::default();
    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            info.total_kb = parse_kb(line);
        } else if line.starts_with("MemAvailable:") {
            info.available_kb = parse_kb(line);
        }
        if info.total_kb.is_some() && info.available_kb.is_some() {
            break;
        }
    }
    Ok(info)
}

/// Parses `/proc/uptime` content (first field, seconds since boot).
pub fn parse_uptime(content: &str) -> Result<f64, ParseError> {
    content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::new("empty uptime"))?
        .parse()
        .map_err(|_| ParseError::new("invalid uptime"))
}

/// Per-interface counters from `/proc/net/dev`.
///
/// Depends on receive columns 0 (bytes) and 1 (packets) and transmit
/// columns 8 (bytes) and 9 (packets) after the interface name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetDevCounters {
    pub interface: String,
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
}

/// Parses `/proc/net/dev` content.
///
/// Header lines (containing `|`) are skipped; malformed interface lines
/// are skipped rather than failing the file.
pub fn parse_net_dev(content: &str) -> Result<Vec<NetDevCounters>, ParseError> {
    let mut devices = Vec::new();

    for line in content.lines() {
        if line.contains('|') || line.trim().is_empty() {
            continue;
        }

        let Some((name, counters)) = line.split_once(':') else {
            continue;
        };
        let values: Vec<&str> = counters.split_whitespace().collect();
        if values.len() < 16 {
            continue;
        }

        let get = |idx: usize| -> Option<u64> { values.get(idx)?.parse().ok() };
        let (Some(rx_bytes), Some(rx_packets), Some(tx_bytes), Some(tx_packets)) =
            (get(0), get(1), get(8), get(9))
        else {
            continue;
        };

        devices.push(NetDevCounters {
            interface: name.trim().to_string(),
            rx_bytes,
            rx_packets,
            tx_bytes,
            tx_packets,
        });
    }

    Ok(devices)
}

/// Per-device counters from `/proc/diskstats`.
///
/// Depends on column 2 (device name), column 5 (sectors read) and
/// column 9 (sectors written); a sector is 512 bytes regardless of the
/// device's logical block size, per the kernel's iostat contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskCounters {
    pub device: String,
    pub read_sectors: u64,
    pub write_sectors: u64,
}

/// Parses `/proc/diskstats` content, skipping malformed lines.
pub fn parse_diskstats(content: &str) -> Result<Vec<DiskCounters>, ParseError> {
    let mut disks = Vec::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue;
        }

        let get = |idx: usize| -> Option<u64> { parts.get(idx)?.parse().ok() };
        let (Some(read_sectors), Some(write_sectors)) = (get(5), get(9)) else {
            continue;
        };

        disks.push(DiskCounters {
            device: parts[2].to_string(),
            read_sectors,
            write_sectors,
        });
    }

    Ok(disks)
}

/// Parses a millidegree sensor value (thermal zone `temp`, hwmon
/// `temp1_input`) into degrees Celsius.
pub fn parse_millidegrees(content: &str) -> Result<f64, ParseError> {
    let raw: i64 = content
        .trim()
        .parse()
        .map_err(|_| ParseError::new("invalid millidegree value"))?;
    Ok(raw as f64 / 1000.0)
}

/// Parses `nvidia-smi --query-gpu=temperature.gpu --format=csv,noheader`
/// output (a bare integer in degrees Celsius).
pub fn parse_nvidia_smi_temp(stdout: &str) -> Result<f64, ParseError> {
    stdout
        .trim()
        .parse::<i64>()
        .map(|t| t as f64)
        .map_err(|_| ParseError::new("nvidia-smi returned no temperature"))
}
