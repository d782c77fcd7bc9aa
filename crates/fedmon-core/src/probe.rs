//! Best-effort hardware/OS probe.
//!
//! A probe sweep reads per-core CPU tick counters, cpufreq metadata, the
//! vendor GPU sysfs node, memory availability and the battery. Every value is
//! read independently; anything missing, unreadable or malformed is `None`
//! and the sweep carries on. Nothing here blocks beyond a handful of small
//! procfs/sysfs reads, so [`ResourceProbe::read`] is safe to call from the
//! sampling thread every 100 ms.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ProbeConfig;

/// Cumulative tick counters for one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoreTicks {
    /// Ticks spent doing anything but idling/waiting on I/O.
    pub active: u64,
    pub total: u64,
}

/// cpufreq metadata for one core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CpuFreqReading {
    pub available_freqs: Option<String>,
    pub available_governors: Option<String>,
    pub cur_freq: Option<i64>,
    pub governor: Option<String>,
    pub max_freq: Option<i64>,
    pub min_freq: Option<i64>,
}

/// One core's counters and frequency metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreReading {
    /// Kernel CPU number (`cpuN`).
    pub cpu: usize,
    pub ticks: CoreTicks,
    pub freq: CpuFreqReading,
}

/// Vendor GPU node (`/sys/kernel/gpu`), present on many Android SoCs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GpuReading {
    /// Raw busy field, percentage formatted (e.g. `"37 %"`).
    pub busy: Option<String>,
    pub cur_clock: Option<i64>,
    pub governor: Option<String>,
    pub freq_table: Option<String>,
    pub max_clock: Option<i64>,
    pub min_clock: Option<i64>,
}

/// System memory in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryReading {
    pub available: u64,
    pub total: u64,
}

/// Battery charge as `level` out of `scale`, plus instantaneous draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BatteryReading {
    pub level: Option<i64>,
    pub scale: Option<i64>,
    pub power_watts: Option<f64>,
}

/// Result of one probe sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlatformSnapshot {
    pub cores: Vec<CoreReading>,
    pub gpu: GpuReading,
    pub memory: Option<MemoryReading>,
    pub battery: BatteryReading,
}

/// Source of platform snapshots.
pub trait ResourceProbe: Send {
    /// Take one sweep. Never fails; missing values are `None`.
    fn read(&mut self) -> PlatformSnapshot;
}

/// Probe reading procfs/sysfs under configurable roots.
#[derive(Debug, Clone)]
pub struct SysfsProbe {
    proc_root: PathBuf,
    sys_root: PathBuf,
}

impl SysfsProbe {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            proc_root: config.proc_root.clone(),
            sys_root: config.sys_root.clone(),
        }
    }

    fn read_cores(&self) -> Vec<CoreReading> {
        let Ok(raw) = std::fs::read_to_string(self.proc_root.join("stat")) else {
            log::debug!("cpu tick counters unavailable");
            return Vec::new();
        };
        let cpu_root = self.sys_root.join("devices/system/cpu");
        parse_proc_stat(&raw)
            .into_iter()
            .map(|(cpu, ticks)| CoreReading {
                cpu,
                ticks,
                freq: read_cpufreq(&cpu_root.join(format!("cpu{cpu}")).join("cpufreq")),
            })
            .collect()
    }

    fn read_gpu(&self) -> GpuReading {
        let dir = self.sys_root.join("kernel/gpu");
        GpuReading {
            busy: read_first_line(&dir.join("gpu_busy")),
            cur_clock: read_i64(&dir.join("gpu_clock")),
            governor: read_first_line(&dir.join("gpu_governor")),
            freq_table: read_first_line(&dir.join("gpu_freq_table")),
            max_clock: read_i64(&dir.join("gpu_max_clock")),
            min_clock: read_i64(&dir.join("gpu_min_clock")),
        }
    }

    fn read_memory(&self) -> Option<MemoryReading> {
        let raw = std::fs::read_to_string(self.proc_root.join("meminfo")).ok()?;
        parse_meminfo(&raw)
    }

    fn read_battery(&self) -> BatteryReading {
        let Some(dir) = find_battery_dir(&self.sys_root.join("class/power_supply")) else {
            return BatteryReading::default();
        };
        read_battery_dir(&dir)
    }
}

impl ResourceProbe for SysfsProbe {
    fn read(&mut self) -> PlatformSnapshot {
        PlatformSnapshot {
            cores: self.read_cores(),
            gpu: self.read_gpu(),
            memory: self.read_memory(),
            battery: self.read_battery(),
        }
    }
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

/// First line of a sysfs/procfs file, trimmed. Empty counts as missing.
fn read_first_line(path: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(path).ok()?;
    let line = raw.lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

fn read_i64(path: &Path) -> Option<i64> {
    read_first_line(path).and_then(|s| s.parse().ok())
}

fn read_cpufreq(dir: &Path) -> CpuFreqReading {
    if !dir.is_dir() {
        return CpuFreqReading::default();
    }
    CpuFreqReading {
        available_freqs: read_first_line(&dir.join("scaling_available_frequencies")),
        available_governors: read_first_line(&dir.join("scaling_available_governors")),
        cur_freq: read_i64(&dir.join("scaling_cur_freq")),
        governor: read_first_line(&dir.join("scaling_governor")),
        max_freq: read_i64(&dir.join("scaling_max_freq")),
        min_freq: read_i64(&dir.join("scaling_min_freq")),
    }
}

fn find_battery_dir(root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs.into_iter().find(|dir| {
        read_first_line(&dir.join("type")).is_some_and(|t| t.eq_ignore_ascii_case("battery"))
    })
}

fn read_battery_dir(dir: &Path) -> BatteryReading {
    let (level, scale) = if let Some(capacity) = read_i64(&dir.join("capacity")) {
        (Some(capacity), Some(100))
    } else if let Some(now) = read_i64(&dir.join("energy_now")) {
        (Some(now), read_i64(&dir.join("energy_full")))
    } else if let Some(now) = read_i64(&dir.join("charge_now")) {
        (Some(now), read_i64(&dir.join("charge_full")))
    } else {
        (None, None)
    };

    // power_supply reports micro-units; some drivers only expose I and V.
    let power_watts = read_i64(&dir.join("power_now"))
        .map(|uw| uw.unsigned_abs() as f64 / 1_000_000.0)
        .or_else(|| {
            let ua = read_i64(&dir.join("current_now"))?;
            let uv = read_i64(&dir.join("voltage_now"))?;
            Some(ua.unsigned_abs() as f64 * uv.unsigned_abs() as f64 / 1e12)
        });

    BatteryReading {
        level,
        scale,
        power_watts,
    }
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Per-core tick counters from `/proc/stat` (`cpuN` lines only).
///
/// Total is the sum of user, nice, system, idle, iowait, irq, softirq and
/// steal; guest time is already folded into user/nice. Active excludes idle
/// and iowait.
pub fn parse_proc_stat(raw: &str) -> Vec<(usize, CoreTicks)> {
    let mut cores = Vec::new();
    for line in raw.lines() {
        let mut parts = line.split_whitespace();
        let Some(label) = parts.next() else {
            continue;
        };
        let Some(cpu) = label.strip_prefix("cpu").and_then(|n| n.parse::<usize>().ok()) else {
            continue;
        };
        // A malformed column would shift the rest; skip the whole line.
        let Some(fields) = parts
            .take(8)
            .map(|s| s.parse::<u64>().ok())
            .collect::<Option<Vec<u64>>>()
            .filter(|f| f.len() >= 4)
        else {
            continue;
        };
        let total: u64 = fields.iter().sum();
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        cores.push((
            cpu,
            CoreTicks {
                active: total.saturating_sub(idle),
                total,
            },
        ));
    }
    cores.sort_by_key(|(cpu, _)| *cpu);
    cores
}

/// `MemAvailable`/`MemTotal` from `/proc/meminfo`, in bytes.
pub fn parse_meminfo(raw: &str) -> Option<MemoryReading> {
    let mut available = None;
    let mut total = None;
    for line in raw.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let value = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok());
        match key {
            "MemAvailable" => available = value.map(|kb| kb * 1024),
            "MemTotal" => total = value.map(|kb| kb * 1024),
            _ => {}
        }
    }
    Some(MemoryReading {
        available: available?,
        total: total?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn probe_at(root: &Path) -> SysfsProbe {
        SysfsProbe::new(&ProbeConfig {
            proc_root: root.join("proc"),
            sys_root: root.join("sys"),
        })
    }

    #[test]
    fn proc_stat_skips_aggregate_line() {
        let raw = "cpu  10 0 10 80 0 0 0 0 0 0\n\
                   cpu0 5 0 5 40 0 0 0 0 0 0\n\
                   cpu1 5 0 5 30 10 0 0 0 0 0\n\
                   intr 12345\n";
        let cores = parse_proc_stat(raw);
        assert_eq!(cores.len(), 2);
        assert_eq!(cores[0], (0, CoreTicks { active: 10, total: 50 }));
        assert_eq!(cores[1], (1, CoreTicks { active: 10, total: 50 }));
    }

    #[test]
    fn proc_stat_ignores_short_lines() {
        assert!(parse_proc_stat("cpu0 1 2\n").is_empty());
        assert!(parse_proc_stat("").is_empty());
    }

    #[test]
    fn proc_stat_skips_lines_with_malformed_columns() {
        let raw = "cpu0 5 x 5 40 0 0 0 0 0 0\n\
                   cpu1 5 0 5 30 10 0 0 0 0 0\n";
        let cores = parse_proc_stat(raw);
        assert_eq!(cores, vec![(1, CoreTicks { active: 10, total: 50 })]);
    }

    #[test]
    fn meminfo_needs_both_fields() {
        let raw = "MemTotal:       2000 kB\nMemFree:         100 kB\nMemAvailable:    500 kB\n";
        assert_eq!(
            parse_meminfo(raw),
            Some(MemoryReading {
                available: 500 * 1024,
                total: 2000 * 1024
            })
        );
        assert_eq!(parse_meminfo("MemTotal: 2000 kB\n"), None);
    }

    #[test]
    fn empty_roots_yield_unavailable_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let snap = probe_at(tmp.path()).read();
        assert!(snap.cores.is_empty());
        assert_eq!(snap.gpu, GpuReading::default());
        assert_eq!(snap.memory, None);
        assert_eq!(snap.battery, BatteryReading::default());
    }

    #[test]
    fn reads_fixture_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "proc/stat", "cpu 1 1 1 1\ncpu0 100 0 0 100 0 0 0 0\n");
        write(root, "proc/meminfo", "MemTotal: 4 kB\nMemAvailable: 1 kB\n");
        let freq = "sys/devices/system/cpu/cpu0/cpufreq";
        write(root, &format!("{freq}/scaling_cur_freq"), "1800000\n");
        write(root, &format!("{freq}/scaling_governor"), "schedutil\n");
        write(root, &format!("{freq}/scaling_available_frequencies"), "300000 1800000 \n");
        write(root, "sys/kernel/gpu/gpu_busy", "37 %\n");
        write(root, "sys/kernel/gpu/gpu_clock", "585\n");
        write(root, "sys/kernel/gpu/gpu_max_clock", "not-a-number\n");
        write(root, "sys/class/power_supply/AC/type", "Mains\n");
        write(root, "sys/class/power_supply/BAT0/type", "Battery\n");
        write(root, "sys/class/power_supply/BAT0/capacity", "81\n");
        write(root, "sys/class/power_supply/BAT0/power_now", "2500000\n");

        let snap = probe_at(root).read();

        assert_eq!(snap.cores.len(), 1);
        let core = &snap.cores[0];
        assert_eq!(core.ticks, CoreTicks { active: 100, total: 200 });
        assert_eq!(core.freq.cur_freq, Some(1_800_000));
        assert_eq!(core.freq.governor.as_deref(), Some("schedutil"));
        assert_eq!(core.freq.available_freqs.as_deref(), Some("300000 1800000"));
        assert_eq!(core.freq.max_freq, None);

        assert_eq!(snap.gpu.busy.as_deref(), Some("37 %"));
        assert_eq!(snap.gpu.cur_clock, Some(585));
        assert_eq!(snap.gpu.max_clock, None);

        assert_eq!(
            snap.memory,
            Some(MemoryReading {
                available: 1024,
                total: 4096
            })
        );
        assert_eq!(snap.battery.level, Some(81));
        assert_eq!(snap.battery.scale, Some(100));
        assert_eq!(snap.battery.power_watts, Some(2.5));
    }

    #[test]
    fn battery_falls_back_to_charge_counters() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("battery");
        write(tmp.path(), "battery/charge_now", "1500000\n");
        write(tmp.path(), "battery/charge_full", "3000000\n");
        write(tmp.path(), "battery/current_now", "-500000\n");
        write(tmp.path(), "battery/voltage_now", "4000000\n");
        let b = read_battery_dir(&dir);
        assert_eq!(b.level, Some(1_500_000));
        assert_eq!(b.scale, Some(3_000_000));
        assert_eq!(b.power_watts, Some(2.0));
    }

    #[test]
    fn first_line_is_trimmed_and_empty_is_missing() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "a", "  hello  \nworld\n");
        write(tmp.path(), "b", "\n");
        assert_eq!(read_first_line(&tmp.path().join("a")).as_deref(), Some("hello"));
        assert_eq!(read_first_line(&tmp.path().join("b")), None);
        assert_eq!(read_first_line(&tmp.path().join("missing")), None);
    }
}
