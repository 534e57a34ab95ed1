//! System metrics collection for fleet agents
//!
//! Samples the four sub-records the kernel expects in a snapshot:
//! - CPU utilisation and core count
//! - Memory totals in GB and percent used
//! - Disk usage of the root filesystem (largest disk as fallback)
//! - Network bytes sent/received, summed over interfaces

use serde::Serialize;
use std::path::Path;
use sysinfo::{Disks, Networks, System};
use tokio::time::Duration;
use tracing::debug;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Complete system metrics (field names match the kernel's snapshot message)
#[derive(Debug, Clone, Serialize)]
pub struct SystemMetrics {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub disk: DiskMetrics,
    pub network: NetworkMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuMetrics {
    pub utilization: f64,
    pub cores: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryMetrics {
    pub total_gb: f64,
    pub available_gb: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskMetrics {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkMetrics {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

/// Keeps sysinfo handles alive between samples so CPU usage and network
/// counters are measured against the previous refresh.
pub struct MetricsCollector {
    sys: System,
    disks: Disks,
    networks: Networks,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        Self {
            sys,
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
        }
    }

    pub async fn collect(&mut self) -> SystemMetrics {
        debug!("Collecting system metrics...");

        // Wait a moment for accurate CPU readings
        self.sys.refresh_cpu_usage();
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();
        self.disks.refresh();
        self.networks.refresh();

        let cpu = CpuMetrics {
            utilization: f64::from(self.sys.global_cpu_info().cpu_usage()).clamp(0.0, 100.0),
            cores: self.sys.cpus().len() as u32,
        };

        let memory = MemoryMetrics::from_bytes(self.sys.total_memory(), self.sys.available_memory());

        let disk = select_disk(
            self.disks
                .list()
                .iter()
                .map(|d| (d.mount_point(), d.total_space(), d.available_space())),
        );

        let (bytes_sent, bytes_recv) = self
            .networks
            .iter()
            .fold((0u64, 0u64), |(sent, recv), (_, data)| {
                (sent.saturating_add(data.total_transmitted()), recv.saturating_add(data.total_received()))
            });

        SystemMetrics {
            cpu,
            memory,
            disk,
            network: NetworkMetrics { bytes_sent, bytes_recv },
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMetrics {
    fn from_bytes(total: u64, available: u64) -> Self {
        let available = available.min(total);
        Self {
            total_gb: to_gb(total),
            available_gb: to_gb(available),
            percent: percent_of(total - available, total),
        }
    }
}

impl DiskMetrics {
    fn from_bytes(total: u64, available: u64) -> Self {
        let available = available.min(total);
        let used = total - available;
        Self {
            total_gb: to_gb(total),
            used_gb: to_gb(used),
            free_gb: to_gb(available),
            percent: percent_of(used, total),
        }
    }
}

/// Picks the root mount, or the largest disk when there is no `/`
/// (Windows, some containers). All zeros when no disk is visible.
fn select_disk<'a, I>(disks: I) -> DiskMetrics
where
    I: IntoIterator<Item = (&'a Path, u64, u64)>,
{
    let mut root = None;
    let mut largest: Option<(u64, u64)> = None;

    for (mount, total, available) in disks {
        if mount == Path::new("/") {
            root = Some((total, available));
        }
        if largest.map_or(true, |(t, _)| total > t) {
            largest = Some((total, available));
        }
    }

    let (total, available) = root.or(largest).unwrap_or((0, 0));
    DiskMetrics::from_bytes(total, available)
}

fn to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

fn percent_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GB: u64 = 1024 * 1024 * 1024;

    #[tokio::test]
    async fn test_metrics_collection() {
        let mut collector = MetricsCollector::new();
        let metrics = collector.collect().await;
        assert!(metrics.cpu.cores > 0);
        assert!(metrics.memory.total_gb > 0.0);
        assert!((0.0..=100.0).contains(&metrics.cpu.utilization));
        assert!((0.0..=100.0).contains(&metrics.memory.percent));
    }

    #[test]
    fn test_memory_conversion() {
        let m = MemoryMetrics::from_bytes(16 * GB, 4 * GB);
        assert_eq!(m.total_gb, 16.0);
        assert_eq!(m.available_gb, 4.0);
        assert_eq!(m.percent, 75.0);

        // available > total never yields a negative usage
        let m = MemoryMetrics::from_bytes(GB, 2 * GB);
        assert_eq!(m.percent, 0.0);
    }

    #[test]
    fn test_root_disk_is_preferred() {
        let disks = [
            (Path::new("/data"), 2_000 * GB, 1_000 * GB),
            (Path::new("/"), 100 * GB, 40 * GB),
        ];
        let d = select_disk(disks);
        assert_eq!(d.total_gb, 100.0);
        assert_eq!(d.used_gb, 60.0);
        assert_eq!(d.free_gb, 40.0);
        assert_eq!(d.percent, 60.0);
    }

    #[test]
    fn test_largest_disk_without_root() {
        let disks = [
            (Path::new("C:\\"), 500 * GB, 250 * GB),
            (Path::new("D:\\"), 1_000 * GB, 900 * GB),
        ];
        let d = select_disk(disks);
        assert_eq!(d.total_gb, 1_000.0);
        assert_eq!(d.percent, 10.0);
    }

    #[test]
    fn test_no_disks() {
        let d = select_disk(std::iter::empty());
        assert_eq!(d.total_gb, 0.0);
        assert_eq!(d.percent, 0.0);
    }

    #[test]
    fn test_serialized_field_names() {
        let metrics = SystemMetrics {
            cpu: CpuMetrics { utilization: 1.5, cores: 2 },
            memory: MemoryMetrics::from_bytes(2 * GB, GB),
            disk: DiskMetrics::from_bytes(10 * GB, 5 * GB),
            network: NetworkMetrics { bytes_sent: 7, bytes_recv: 9 },
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["cpu"]["utilization"], 1.5);
        assert_eq!(json["memory"]["available_gb"], 1.0);
        assert_eq!(json["disk"]["free_gb"], 5.0);
        assert_eq!(json["network"]["bytes_recv"], 9);
    }
}
