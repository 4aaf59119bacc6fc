use log::{trace, warn};

use crate::config::{BlockId, DeathTime, DiskConfig, PageId};
use crate::error::Result;
use crate::flash::{FlashStore, PageStatus};
use crate::policy::{Relocation, WritePolicy};
use crate::stats::{Stats, StatsSnapshot};

/// Physical result of a page operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Read of an empty/dirty page or write to a dirty page; discarded without side effects.
    FailedDirty,
    /// No valid location for an update-write.
    DiskFull,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }
}

/// Raw physical operations over the page table, charging the timing model
/// into the statistics.
#[derive(Debug, Clone)]
pub struct Nand {
    config: DiskConfig,
    flash: FlashStore,
    stats: Stats,
}

impl Nand {
    pub fn new(config: DiskConfig) -> Result<Self> {
        config.validate()?;
        let flash = FlashStore::new(config.total_blocks, config.pages_per_block);
        Ok(Nand {
            config,
            flash,
            stats: Stats::default(),
        })
    }

    pub fn config(&self) -> &DiskConfig {
        &self.config
    }

    pub fn flash(&self) -> &FlashStore {
        &self.flash
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::new(
            &self.stats,
            self.flash.number_of_dirty_pages(),
            self.config.page_size,
            self.config.metric_scale,
        )
    }

    pub fn first_empty_page(&self, block: BlockId) -> Result<Option<PageId>> {
        Ok(self.flash.block(block)?.first_empty_page())
    }

    /// Write one page. An update of a live page moves the data to the first
    /// empty page of the same block, or hands a full block to `policy`.
    pub fn write(
        &mut self,
        block: BlockId,
        page: PageId,
        death_time: DeathTime,
        policy: &mut dyn WritePolicy,
    ) -> Result<Outcome> {
        match self.flash.status(block, page)? {
            PageStatus::Empty => self.program(block, page, death_time),
            PageStatus::InUse => match self.first_empty_page(block)? {
                Some(new_page) => {
                    let blk = self.flash.block_mut(block)?;
                    blk.invalidate(page);
                    blk.fill(new_page, death_time);
                    self.charge_write();
                    trace!("update ({}, {}) -> ({}, {})", block, page, block, new_page);
                    Ok(Outcome::Success)
                }
                None => match policy.full_block_relocate(self, block, page, death_time)? {
                    Relocation::Done => Ok(Outcome::Success),
                    Relocation::NoRoom => {
                        self.stats.pages_write_failed += 1;
                        warn!("disk full: no room for update of ({}, {})", block, page);
                        Ok(Outcome::DiskFull)
                    }
                },
            },
            PageStatus::Dirty => Ok(Outcome::FailedDirty),
        }
    }

    /// Write into an empty page. Anything else is discarded as dirty.
    pub fn program(&mut self, block: BlockId, page: PageId, death_time: DeathTime) -> Result<Outcome> {
        if self.flash.status(block, page)? != PageStatus::Empty {
            return Ok(Outcome::FailedDirty);
        }
        self.flash.block_mut(block)?.fill(page, death_time);
        self.charge_write();
        trace!("program ({}, {})", block, page);
        Ok(Outcome::Success)
    }

    pub fn read(&mut self, block: BlockId, page: PageId) -> Result<Outcome> {
        match self.flash.status(block, page)? {
            PageStatus::InUse => {
                self.stats.elapsed_time += self.config.read_page_time;
                self.stats.pages_read += 1;
                Ok(Outcome::Success)
            }
            PageStatus::Empty | PageStatus::Dirty => Ok(Outcome::FailedDirty),
        }
    }

    pub fn erase(&mut self, block: BlockId) -> Result<()> {
        self.reset_block(block)?;
        self.stats.elapsed_time += self.config.erase_block_time;
        self.stats.blocks_erased += 1;
        trace!("erase {}", block);
        Ok(())
    }

    /// Erase without charging time or counting the erase.
    pub(crate) fn reset_block(&mut self, block: BlockId) -> Result<()> {
        self.flash.block_mut(block)?.erase();
        Ok(())
    }

    fn charge_write(&mut self) {
        self.stats.elapsed_time += self.config.write_page_time;
        self.stats.pages_written += 1;
    }
}
