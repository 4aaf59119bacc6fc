use crate::config::{BaseType, Counter, Micros, BYTES_PER_MIB, MICROS_PER_SECOND};
use crate::fixed::Fixed;

/// Monotonic device counters. Only the raw operation layer and the host
/// orchestrator mutate them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub elapsed_time: Micros,
    pub host_write_requests: Counter,
    pub host_read_requests: Counter,
    pub pages_written: Counter,
    pub pages_read: Counter,
    pub blocks_erased: Counter,
    pub pages_write_failed: Counter,
    pub gc_forced_count: Counter,
}

impl Stats {
    pub fn write_amplification(&self, scale: u32) -> Fixed {
        Fixed::ratio(self.pages_written.into(), self.host_write_requests.into(), scale)
    }

    /// Percent of executed page writes that failed on a full disk.
    pub fn failure_rate(&self, scale: u32) -> Fixed {
        Fixed::ratio(
            u128::from(self.pages_write_failed) * 100,
            self.pages_written.into(),
            scale,
        )
    }

    pub fn elapsed_seconds(&self, scale: u32) -> Fixed {
        Fixed::ratio(self.elapsed_time.into(), MICROS_PER_SECOND, scale)
    }

    pub fn iops(&self, scale: u32) -> Fixed {
        let ops = u128::from(self.pages_written) + u128::from(self.pages_read);
        Fixed::ratio(ops * MICROS_PER_SECOND, self.elapsed_time.into(), scale)
    }

    /// Host traffic in MiB/s of simulated time.
    pub fn bandwidth_host(&self, page_size: BaseType, scale: u32) -> Fixed {
        let pages = u128::from(self.host_write_requests) + u128::from(self.host_read_requests);
        let bytes = pages * page_size as u128;
        Fixed::ratio(
            bytes * MICROS_PER_SECOND,
            BYTES_PER_MIB * u128::from(self.elapsed_time),
            scale,
        )
    }

    pub fn is_write_failing(&self) -> bool {
        self.pages_write_failed > 0
    }
}

pub fn pages_to_mib(pages: u128, page_size: BaseType, scale: u32) -> Fixed {
    Fixed::ratio(pages * page_size as u128, BYTES_PER_MIB, scale)
}

/// Point-in-time metric record. Field order is the column order of exported
/// rows and must not change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub elapsed_time: Micros,
    pub iops: Fixed,
    pub bandwidth: Fixed,
    pub write_amplification: Fixed,
    pub host_write_requests: Counter,
    pub host_read_requests: Counter,
    pub pages_written: Counter,
    pub pages_read: Counter,
    pub blocks_erased: Counter,
    pub pages_write_failed: Counter,
    pub dirty_pages: Counter,
}

impl StatsSnapshot {
    pub const CSV_HEADER: &'static str = "time,iops,bandwidth,amplification,host_write,host_read,\
                                          disk_write,disk_read,block_erased,failures,dirty";

    pub fn new(stats: &Stats, dirty_pages: BaseType, page_size: BaseType, scale: u32) -> Self {
        StatsSnapshot {
            elapsed_time: stats.elapsed_time,
            iops: stats.iops(0),
            bandwidth: stats.bandwidth_host(page_size, scale),
            write_amplification: stats.write_amplification(scale),
            host_write_requests: stats.host_write_requests,
            host_read_requests: stats.host_read_requests,
            pages_written: stats.pages_written,
            pages_read: stats.pages_read,
            blocks_erased: stats.blocks_erased,
            pages_write_failed: stats.pages_write_failed,
            dirty_pages: dirty_pages as Counter,
        }
    }

    pub fn columns(&self) -> [String; 11] {
        [
            self.elapsed_time.to_string(),
            self.iops.to_string(),
            self.bandwidth.to_string(),
            self.write_amplification.to_string(),
            self.host_write_requests.to_string(),
            self.host_read_requests.to_string(),
            self.pages_written.to_string(),
            self.pages_read.to_string(),
            self.blocks_erased.to_string(),
            self.pages_write_failed.to_string(),
            self.dirty_pages.to_string(),
        ]
    }

    pub fn to_csv_row(&self) -> String {
        self.columns().join(",")
    }
}
