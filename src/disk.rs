use std::fmt;

use byte_unit::Byte;
use log::{debug, warn};

use crate::config::{BaseType, BlockId, DeathTime, DiskConfig, PageId, MICROS_PER_SECOND};
use crate::error::Result;
use crate::fixed::Fixed;
use crate::flash::FlashStore;
use crate::gc::{self, GarbageCollector, GcReport};
use crate::nand::{Nand, Outcome};
use crate::policy::{Placement, WritePolicy};
use crate::stats::{pages_to_mib, Stats, StatsSnapshot};

/// A simulated disk: the raw NAND plus one write policy and one garbage collector.
pub struct Disk {
    nand: Nand,
    policy: Box<dyn WritePolicy>,
    gc: Box<dyn GarbageCollector>,
}

impl Disk {
    pub fn new(config: DiskConfig, policy: Box<dyn WritePolicy>, gc: Box<dyn GarbageCollector>) -> Result<Self> {
        let nand = Nand::new(config)?;
        debug!(
            "new disk: {} x {} pages, policy {}, gc {}",
            nand.config().total_blocks,
            nand.config().pages_per_block,
            policy.name(),
            gc.name()
        );
        Ok(Disk { nand, policy, gc })
    }

    pub fn config(&self) -> &DiskConfig {
        self.nand.config()
    }

    pub fn flash(&self) -> &FlashStore {
        self.nand.flash()
    }

    pub fn stats(&self) -> &Stats {
        self.nand.stats()
    }

    pub fn write_policy_name(&self) -> String {
        self.policy.name()
    }

    pub fn gc_name(&self) -> String {
        self.gc.name()
    }

    /// Metric record in export column order.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.nand.snapshot()
    }

    pub fn elapsed_time(&self) -> u64 {
        self.stats().elapsed_time
    }

    pub fn elapsed_seconds(&self) -> Fixed {
        self.stats().elapsed_seconds(self.config().metric_scale)
    }

    pub fn write_amplification(&self) -> Fixed {
        self.stats().write_amplification(self.config().metric_scale)
    }

    pub fn failure_rate(&self) -> Fixed {
        self.stats().failure_rate(self.config().metric_scale)
    }

    pub fn iops(&self) -> Fixed {
        self.stats().iops(0)
    }

    pub fn bandwidth_host(&self) -> Fixed {
        self.stats()
            .bandwidth_host(self.config().page_size, self.config().metric_scale)
    }

    pub fn is_write_failing(&self) -> bool {
        self.stats().is_write_failing()
    }

    pub fn number_of_empty_pages(&self) -> BaseType {
        self.flash().number_of_empty_pages()
    }

    pub fn number_of_dirty_pages(&self) -> BaseType {
        self.flash().number_of_dirty_pages()
    }

    pub fn number_of_in_use_pages(&self) -> BaseType {
        self.flash().number_of_in_use_pages()
    }

    /// First block with every page empty.
    pub fn get_empty_block(&self) -> Option<BlockId> {
        self.flash().empty_block()
    }

    /// External trigger for a collection pass.
    pub fn run_gc(&mut self, force: bool, run_once: bool) -> Result<GcReport> {
        gc::run(self.gc.as_mut(), &mut self.nand, force, run_once)
    }

    /// Host page write.
    pub fn write(&mut self, block: BlockId, page: PageId, death_time: DeathTime) -> Result<Outcome> {
        self.nand.flash().check_page(block, page)?;

        match self.policy.place(&self.nand, block, page, death_time)? {
            Placement::Requested => self.host_write(block, page, death_time, false),
            Placement::Update => self.host_write(block, page, death_time, true),
            Placement::Fresh(b, p) => {
                self.run_gc(false, false)?;
                let outcome = self.nand.write(b, p, death_time, self.policy.as_mut())?;
                if outcome.is_success() {
                    self.nand.stats_mut().host_write_requests += 1;
                }
                Ok(outcome)
            }
        }
    }

    /// Host page read.
    pub fn read(&mut self, block: BlockId, page: PageId) -> Result<Outcome> {
        self.nand.flash().check_page(block, page)?;
        self.run_gc(false, false)?;

        let outcome = self.nand.read(block, page)?;
        if outcome.is_success() {
            self.nand.stats_mut().host_read_requests += 1;
        }
        Ok(outcome)
    }

    fn host_write(&mut self, block: BlockId, page: PageId, death_time: DeathTime, run_once: bool) -> Result<Outcome> {
        self.run_gc(false, run_once)?;

        let mut outcome = self.nand.write(block, page, death_time, self.policy.as_mut())?;
        if outcome == Outcome::DiskFull {
            // the retry decides whether this write counts as failed
            let stats = self.nand.stats_mut();
            stats.pages_write_failed = stats.pages_write_failed.saturating_sub(1);
            stats.gc_forced_count += 1;

            let report = self.run_gc(true, false)?;
            outcome = self.nand.write(block, page, death_time, self.policy.as_mut())?;
            if outcome == Outcome::DiskFull {
                warn!("write ({}, {}) failed after forced gc ({:?})", block, page, report);
            }
        }

        if outcome.is_success() {
            self.nand.stats_mut().host_write_requests += 1;
        }
        Ok(outcome)
    }
}

fn capacity(bytes: BaseType) -> String {
    Byte::from(bytes).get_appropriate_unit(true).to_string()
}

impl fmt::Display for Disk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cfg = self.config();
        let stats = self.stats();
        let scale = cfg.metric_scale;
        let mib = |pages: u64| pages_to_mib(pages.into(), cfg.page_size, scale);
        let per_second = |op_time: u64| {
            let bytes = MICROS_PER_SECOND / u128::from(op_time) * cfg.page_size as u128;
            capacity(bytes as BaseType)
        };

        writeln!(f, "WP: {}\t\tGC: {}", self.write_policy_name(), self.gc_name())?;
        writeln!(
            f,
            "{} pages per block, {} blocks, {} pages of {} [Bytes]. Capacity {}",
            cfg.pages_per_block,
            cfg.total_blocks,
            cfg.total_pages(),
            cfg.page_size,
            capacity(cfg.total_disk_size())
        )?;
        writeln!(
            f,
            "Max bandwidth read: {}/s\t write: {}/s (theoretical)",
            per_second(cfg.read_page_time),
            per_second(cfg.write_page_time)
        )?;
        for (label, pages) in [
            ("Dirty", self.number_of_dirty_pages()),
            ("Empty", self.number_of_empty_pages()),
            ("In Use", self.number_of_in_use_pages()),
        ] {
            writeln!(f, "{}: {} pages ({} MiB)", label, pages, mib(pages as u64))?;
        }
        writeln!(
            f,
            "Host read: {} ({} MiB), write: {} ({} MiB)",
            stats.host_read_requests,
            mib(stats.host_read_requests),
            stats.host_write_requests,
            mib(stats.host_write_requests)
        )?;
        writeln!(
            f,
            "Disk read: {} ({} MiB), write: {} ({} MiB)",
            stats.pages_read,
            mib(stats.pages_read),
            stats.pages_written,
            mib(stats.pages_written)
        )?;
        writeln!(
            f,
            "Erased blocks: {} ({})",
            stats.blocks_erased,
            capacity(stats.blocks_erased as BaseType * cfg.block_size())
        )?;
        writeln!(
            f,
            "Failures: {} % ({} pages, {} MiB)",
            self.failure_rate(),
            stats.pages_write_failed,
            mib(stats.pages_write_failed)
        )?;
        writeln!(f, "GC Forced count: {}", stats.gc_forced_count)?;
        writeln!(
            f,
            "Time: {} [s]\t IOPS: {}\t Bandwidth: {} [MiB/s]",
            self.elapsed_seconds(),
            self.iops(),
            self.bandwidth_host()
        )?;
        writeln!(f, "Write Amplification: {}", self.write_amplification())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::PageStatus;
    use crate::gc::{NoGc, SimpleGc};
    use crate::policy::{DeathTimePolicy, DefaultPolicy, InPlacePolicy};

    fn base_disk(blocks: usize, pages: usize) -> Disk {
        Disk::new(
            DiskConfig::with_geometry(blocks, pages),
            Box::new(DefaultPolicy),
            Box::new(NoGc),
        )
        .unwrap()
    }

    fn simple_gc_disk(blocks: usize, pages: usize, threshold: &str) -> Disk {
        Disk::new(
            DiskConfig::with_geometry(blocks, pages),
            Box::new(DefaultPolicy),
            Box::new(SimpleGc::new(0, threshold.parse().unwrap())),
        )
        .unwrap()
    }

    #[test]
    fn update_chain_ends_in_disk_full() {
        let mut disk = base_disk(2, 4);

        assert_eq!(disk.write(0, 0, None).unwrap(), Outcome::Success);
        assert_eq!(disk.stats().pages_written, 1);
        assert_eq!(disk.flash().block(0).unwrap().empty_count(), 3);

        assert_eq!(disk.write(0, 0, None).unwrap(), Outcome::Success);
        let block = disk.flash().block(0).unwrap();
        assert_eq!(block.status(1), PageStatus::InUse);
        assert_eq!(block.empty_count(), 2);
        assert_eq!(block.dirty_count(), 1);
        assert_eq!(disk.stats().pages_written, 2);

        // follow the live copy until the block runs out of empty pages
        assert_eq!(disk.write(0, 1, None).unwrap(), Outcome::Success);
        assert_eq!(disk.write(0, 2, None).unwrap(), Outcome::Success);
        assert_eq!(disk.flash().block(0).unwrap().empty_count(), 0);
        let host_writes = disk.stats().host_write_requests;

        assert_eq!(disk.write(0, 3, None).unwrap(), Outcome::DiskFull);
        assert_eq!(disk.stats().pages_write_failed, 1);
        assert_eq!(disk.stats().gc_forced_count, 1);
        assert_eq!(disk.stats().host_write_requests, host_writes);
        assert_eq!(disk.stats().pages_written, 4);
        assert!(disk.is_write_failing());
    }

    #[test]
    fn fresh_writes_have_unit_amplification() {
        let mut disk = base_disk(4, 8);
        for b in 0..4 {
            for p in 0..8 {
                assert_eq!(disk.write(b, p, None).unwrap(), Outcome::Success);
            }
        }
        assert_eq!(disk.stats().host_write_requests, 32);
        assert_eq!(disk.write_amplification(), Fixed::from_int(1, 0));
        assert_eq!(disk.number_of_in_use_pages(), 32);
        assert_eq!(disk.get_empty_block(), None);
    }

    #[test]
    fn forced_gc_retry_rescues_full_block() {
        // threshold 1.0 keeps the regular pass idle, only the forced pass compacts
        let mut disk = simple_gc_disk(1, 4, "1");
        disk.write(0, 0, None).unwrap();
        disk.write(0, 0, None).unwrap();
        disk.write(0, 2, None).unwrap();
        disk.write(0, 3, None).unwrap();
        assert_eq!(disk.flash().block(0).unwrap().empty_count(), 0);

        assert_eq!(disk.write(0, 3, None).unwrap(), Outcome::Success);
        let stats = disk.stats();
        assert_eq!(stats.pages_write_failed, 0);
        assert_eq!(stats.gc_forced_count, 1);
        assert_eq!(stats.blocks_erased, 1);
        assert_eq!(stats.host_write_requests, 5);
        assert_eq!(disk.flash().block(0).unwrap().status(3), PageStatus::Dirty);
    }

    #[test]
    fn regular_gc_runs_before_write() {
        let mut disk = simple_gc_disk(2, 4, "0.5");
        disk.write(0, 0, None).unwrap();
        disk.write(0, 0, None).unwrap();
        disk.write(0, 1, None).unwrap();
        // block 0: two dirty pages, compacted on the next host call
        assert_eq!(disk.number_of_dirty_pages(), 2);

        assert_eq!(disk.read(0, 2).unwrap(), Outcome::Success);
        assert_eq!(disk.number_of_dirty_pages(), 0);
        assert_eq!(disk.stats().blocks_erased, 1);
        assert_eq!(disk.stats().host_read_requests, 1);
        assert_eq!(disk.stats().host_write_requests, 3);
    }

    #[test]
    fn in_place_policy_never_fails() {
        let mut disk = Disk::new(
            DiskConfig::with_geometry(1, 4),
            Box::new(InPlacePolicy),
            Box::new(NoGc),
        )
        .unwrap();
        for p in 0..4 {
            disk.write(0, p, None).unwrap();
        }
        for _ in 0..10 {
            assert_eq!(disk.write(0, 1, None).unwrap(), Outcome::Success);
        }
        assert_eq!(disk.stats().pages_write_failed, 0);
        assert_eq!(disk.stats().host_write_requests, 14);
        assert!(disk.write_amplification() > Fixed::from_int(1, 0));
    }

    #[test]
    fn death_time_disk_redirects_fresh_writes() {
        let mut disk = Disk::new(
            DiskConfig::with_geometry(2, 4),
            Box::new(DeathTimePolicy),
            Box::new(NoGc),
        )
        .unwrap();
        // both blocks empty: equal fallback scores, lowest block wins
        disk.write(0, 0, Some(50)).unwrap();
        assert_eq!(disk.write(1, 3, Some(51)).unwrap(), Outcome::Success);

        assert_eq!(disk.flash().block(0).unwrap().status(1), PageStatus::InUse);
        assert_eq!(disk.flash().block(0).unwrap().death_time(1), Some(51));
        assert_eq!(disk.flash().block(1).unwrap().status(3), PageStatus::Empty);
        assert_eq!(disk.stats().host_write_requests, 2);

        // an update goes through the regular path at its own address
        assert_eq!(disk.write(0, 1, Some(60)).unwrap(), Outcome::Success);
        assert_eq!(disk.flash().block(0).unwrap().status(1), PageStatus::Dirty);
        assert_eq!(disk.flash().block(0).unwrap().death_time(2), Some(60));
        assert_eq!(disk.stats().host_write_requests, 3);
    }

    #[test]
    fn read_counts_only_successes() {
        let mut disk = base_disk(1, 4);
        assert_eq!(disk.read(0, 0).unwrap(), Outcome::FailedDirty);
        disk.write(0, 0, None).unwrap();
        assert_eq!(disk.read(0, 0).unwrap(), Outcome::Success);
        assert_eq!(disk.stats().host_read_requests, 1);
        assert!(disk.read(0, 4).is_err());
        assert!(disk.write(1, 0, None).is_err());
        assert_eq!(disk.stats().host_write_requests, 1);
    }

    #[test]
    fn run_gc_once_selects() {
        let mut disk = base_disk(2, 4);
        disk.write(1, 0, None).unwrap();
        disk.write(1, 0, None).unwrap();
        assert_eq!(disk.run_gc(false, true).unwrap(), GcReport::Selected(1));
    }

    #[test]
    fn summary_mentions_strategies() {
        let mut disk = simple_gc_disk(2, 4, "0.4");
        disk.write(0, 0, None).unwrap();
        let text = disk.to_string();
        assert!(text.contains("WP: Default"));
        assert!(text.contains("GC: simple (0, 0.4)"));
        assert!(text.contains("Write Amplification: 1.000"));
        assert!(text.contains("GC Forced count: 0"));
    }
}
