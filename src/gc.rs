use log::debug;

use crate::config::{BlockId, Micros};
use crate::error::Result;
use crate::fixed::Fixed;
use crate::nand::Nand;

/// What a collection pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcReport {
    NotRun,
    Ran { compacted: usize },
    /// Single-block selection only: the dirtiest block, nothing compacted.
    Selected(BlockId),
}

impl GcReport {
    pub fn ran(&self) -> bool {
        matches!(self, GcReport::Ran { .. })
    }
}

pub trait GarbageCollector {
    fn name(&self) -> String;

    fn should_run(&self, nand: &Nand, force: bool) -> bool;

    fn block_qualifies(&self, nand: &Nand, block: BlockId, force: bool) -> bool;

    /// Reclaim the dirty pages of `block`, keeping its live data in place.
    fn compact(&mut self, nand: &mut Nand, block: BlockId) -> Result<bool>;
}

/// One collection pass. `run_once` only selects the dirtiest block.
pub fn run(gc: &mut dyn GarbageCollector, nand: &mut Nand, force: bool, run_once: bool) -> Result<GcReport> {
    if run_once {
        let block = nand.flash().dirtiest_block();
        debug!("gc {} selected block {}", gc.name(), block);
        return Ok(GcReport::Selected(block));
    }

    if !gc.should_run(nand, force) {
        return Ok(GcReport::NotRun);
    }

    let mut compacted = 0;
    for block in 0..nand.flash().total_blocks() {
        if gc.block_qualifies(nand, block, force) && gc.compact(nand, block)? {
            compacted += 1;
        }
    }

    if compacted == 0 {
        return Ok(GcReport::NotRun);
    }
    debug!("gc {} compacted {} blocks (forced: {})", gc.name(), compacted, force);
    Ok(GcReport::Ran { compacted })
}

/// Baseline: never collects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGc;

impl GarbageCollector for NoGc {
    fn name(&self) -> String {
        "none".to_string()
    }

    fn should_run(&self, _: &Nand, _: bool) -> bool {
        false
    }

    fn block_qualifies(&self, _: &Nand, _: BlockId, _: bool) -> bool {
        false
    }

    fn compact(&mut self, _: &mut Nand, _: BlockId) -> Result<bool> {
        Ok(false)
    }
}

/// Compacts every block at or above a dirty-page ratio, at most once per
/// `min_interval_us` of simulated time unless forced.
#[derive(Debug, Clone)]
pub struct SimpleGc {
    min_interval_us: Micros,
    dirty_threshold: Fixed,
    last_run: Micros,
}

impl SimpleGc {
    pub fn new(min_interval_us: Micros, dirty_threshold: Fixed) -> Self {
        SimpleGc {
            min_interval_us,
            dirty_threshold,
            last_run: 0,
        }
    }

    pub fn last_run(&self) -> Micros {
        self.last_run
    }
}

impl GarbageCollector for SimpleGc {
    fn name(&self) -> String {
        format!("simple ({}, {})", self.min_interval_us, self.dirty_threshold)
    }

    fn should_run(&self, nand: &Nand, force: bool) -> bool {
        force || nand.stats().elapsed_time.saturating_sub(self.last_run) >= self.min_interval_us
    }

    fn block_qualifies(&self, nand: &Nand, block: BlockId, force: bool) -> bool {
        let Ok(blk) = nand.flash().block(block) else {
            return false;
        };
        if force && blk.dirty_count() > 0 {
            return true;
        }
        self.dirty_threshold
            .is_reached_by(blk.dirty_count() as u128, blk.page_count() as u128)
    }

    fn compact(&mut self, nand: &mut Nand, block: BlockId) -> Result<bool> {
        let pages_per_block = nand.flash().pages_per_block();

        let mut live = Vec::with_capacity(pages_per_block);
        for page in 0..pages_per_block {
            if nand.read(block, page)?.is_success() {
                live.push((page, nand.flash().block(block)?.death_time(page)));
            }
        }

        nand.erase(block)?;

        for (page, death_time) in live {
            nand.program(block, page, death_time)?;
        }

        self.last_run = nand.stats().elapsed_time;
        Ok(true)
    }
}
