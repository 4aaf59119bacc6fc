use log::debug;

use crate::config::{BlockId, DeathTime, PageId};
use crate::error::Result;
use crate::flash::{Block, PageStatus};
use crate::nand::Nand;

/// Result of relocating an update that targets a block with no empty page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relocation {
    /// Data placed; the policy already charged the statistics.
    Done,
    NoRoom,
}

/// Where a host write should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Use the requested page through the normal host write path.
    Requested,
    /// Fresh write redirected to the given empty page.
    Fresh(BlockId, PageId),
    /// Update of existing data; handled by the normal path with single-block GC selection.
    Update,
}

pub trait WritePolicy {
    fn name(&self) -> String;

    /// Called only when an update targets `block` and it has no empty page left.
    fn full_block_relocate(
        &mut self,
        nand: &mut Nand,
        block: BlockId,
        page: PageId,
        death_time: DeathTime,
    ) -> Result<Relocation>;

    fn place(&self, _nand: &Nand, _block: BlockId, _page: PageId, _death_time: DeathTime) -> Result<Placement> {
        Ok(Placement::Requested)
    }
}

/// No alternate placement; a full block sends the host down the forced GC retry.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPolicy;

impl WritePolicy for DefaultPolicy {
    fn name(&self) -> String {
        "Default".to_string()
    }

    fn full_block_relocate(&mut self, _: &mut Nand, _: BlockId, _: PageId, _: DeathTime) -> Result<Relocation> {
        Ok(Relocation::NoRoom)
    }
}

/// Rewrites the full block in place: read the other live pages, erase, write
/// them back at their own index together with the new data.
#[derive(Debug, Default, Clone, Copy)]
pub struct InPlacePolicy;

impl WritePolicy for InPlacePolicy {
    fn name(&self) -> String {
        "in place".to_string()
    }

    fn full_block_relocate(
        &mut self,
        nand: &mut Nand,
        block: BlockId,
        page: PageId,
        death_time: DeathTime,
    ) -> Result<Relocation> {
        rewrite_block(nand, block, page, death_time, true)
    }
}

/// Same as [`InPlacePolicy`] on a device that rewrites without paying for the erase.
#[derive(Debug, Default, Clone, Copy)]
pub struct InPlaceNoErasePolicy;

impl WritePolicy for InPlaceNoErasePolicy {
    fn name(&self) -> String {
        "in place (no erase)".to_string()
    }

    fn full_block_relocate(
        &mut self,
        nand: &mut Nand,
        block: BlockId,
        page: PageId,
        death_time: DeathTime,
    ) -> Result<Relocation> {
        rewrite_block(nand, block, page, death_time, false)
    }
}

fn rewrite_block(
    nand: &mut Nand,
    block: BlockId,
    page: PageId,
    death_time: DeathTime,
    charge_erase: bool,
) -> Result<Relocation> {
    let live: Vec<_> = nand
        .flash()
        .block(block)?
        .live_pages()
        .into_iter()
        .filter(|(p, _)| *p != page)
        .collect();

    for (p, _) in &live {
        nand.read(block, *p)?;
    }

    if charge_erase {
        nand.erase(block)?;
    } else {
        nand.reset_block(block)?;
    }

    for (p, dt) in live {
        nand.program(block, p, dt)?;
    }
    nand.program(block, page, death_time)?;

    debug!("rewrote block {} in place for page {}", block, page);
    Ok(Relocation::Done)
}

/// Places fresh writes into the block whose pages die closest to the new
/// page's death time. Full-block updates get no alternate placement.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeathTimePolicy;

impl DeathTimePolicy {
    /// Mean squared distance between `death_time` and the annotations of the
    /// block's non-empty pages. A block with none falls back to its empty
    /// page count.
    pub fn score(block: &Block, death_time: u64) -> f64 {
        let mut sum = 0.0;
        let mut n = 0u32;
        for (p, status) in block.pages().iter().enumerate() {
            if *status == PageStatus::Empty {
                continue;
            }
            if let Some(dt) = block.death_time(p) {
                let diff = dt as f64 - death_time as f64;
                sum += diff * diff;
                n += 1;
            }
        }

        if n == 0 {
            block.empty_count() as f64
        } else {
            sum / f64::from(n)
        }
    }

    /// Block with free space and the lowest score; ties keep the lowest index.
    pub fn best_block(nand: &Nand, death_time: u64) -> Option<BlockId> {
        let mut best: Option<(BlockId, f64)> = None;
        for (b, block) in nand.flash().blocks().enumerate() {
            if block.empty_count() == 0 {
                continue;
            }
            let score = Self::score(block, death_time);
            if best.map_or(true, |(_, s)| score < s) {
                best = Some((b, score));
            }
        }
        best.map(|(b, _)| b)
    }
}

impl WritePolicy for DeathTimePolicy {
    fn name(&self) -> String {
        "death time".to_string()
    }

    fn full_block_relocate(&mut self, _: &mut Nand, _: BlockId, _: PageId, _: DeathTime) -> Result<Relocation> {
        Ok(Relocation::NoRoom)
    }

    fn place(&self, nand: &Nand, block: BlockId, page: PageId, death_time: DeathTime) -> Result<Placement> {
        if nand.flash().status(block, page)? != PageStatus::Empty {
            return Ok(Placement::Update);
        }

        let Some(dt) = death_time else {
            return Ok(Placement::Fresh(block, page));
        };

        let target = match Self::best_block(nand, dt) {
            Some(b) => nand.first_empty_page(b)?.map(|p| (b, p)),
            None => None,
        };
        let (b, p) = target.unwrap_or((block, page));
        debug!("death time {} placed ({}, {}) -> ({}, {})", dt, block, page, b, p);
        Ok(Placement::Fresh(b, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiskConfig;
    use crate::nand::Outcome;

    fn nand(blocks: usize, pages: usize) -> Nand {
        Nand::new(DiskConfig::with_geometry(blocks, pages)).unwrap()
    }

    /// One full block: page 0 dirty, pages 1..=3 in use.
    fn full_block() -> Nand {
        let mut n = nand(1, 4);
        n.write(0, 0, None, &mut DefaultPolicy).unwrap();
        n.write(0, 0, None, &mut DefaultPolicy).unwrap();
        n.write(0, 2, Some(20), &mut DefaultPolicy).unwrap();
        n.write(0, 3, Some(30), &mut DefaultPolicy).unwrap();
        assert_eq!(n.flash().block(0).unwrap().empty_count(), 0);
        n
    }

    #[test]
    fn default_policy_reports_no_room() {
        let mut n = full_block();
        assert_eq!(n.write(0, 1, None, &mut DefaultPolicy).unwrap(), Outcome::DiskFull);
    }

    #[test]
    fn in_place_rewrites_block_and_pays_erase() {
        let mut n = full_block();
        let cfg = n.config().clone();
        let before = n.stats().clone();

        assert_eq!(n.write(0, 1, Some(11), &mut InPlacePolicy).unwrap(), Outcome::Success);

        let block = n.flash().block(0).unwrap();
        assert_eq!(block.status(0), PageStatus::Empty);
        for p in 1..4 {
            assert_eq!(block.status(p), PageStatus::InUse);
        }
        assert_eq!(block.dirty_count(), 0);
        assert_eq!(block.empty_count(), 1);
        assert_eq!(block.death_time(1), Some(11));
        assert_eq!(block.death_time(3), Some(30));

        let stats = n.stats();
        assert_eq!(stats.pages_written, before.pages_written + 3);
        assert_eq!(stats.pages_read, before.pages_read + 2);
        assert_eq!(stats.blocks_erased, 1);
        assert_eq!(
            stats.elapsed_time,
            before.elapsed_time + 3 * cfg.write_page_time + 2 * cfg.read_page_time + cfg.erase_block_time
        );
        assert_eq!(stats.pages_write_failed, 0);
    }

    #[test]
    fn in_place_no_erase_skips_erase_cost() {
        let mut n = full_block();
        let cfg = n.config().clone();
        let before = n.stats().clone();

        assert_eq!(n.write(0, 2, None, &mut InPlaceNoErasePolicy).unwrap(), Outcome::Success);

        let block = n.flash().block(0).unwrap();
        assert_eq!(block.in_use_count(), 3);
        assert_eq!(block.dirty_count(), 0);
        assert_eq!(n.stats().blocks_erased, 0);
        assert_eq!(
            n.stats().elapsed_time,
            before.elapsed_time + 3 * cfg.write_page_time + 2 * cfg.read_page_time
        );
    }

    #[test]
    fn death_time_score() {
        let mut n = nand(1, 4);
        assert_eq!(DeathTimePolicy::score(n.flash().block(0).unwrap(), 100), 4.0);

        n.write(0, 0, Some(10), &mut DefaultPolicy).unwrap();
        n.write(0, 1, Some(20), &mut DefaultPolicy).unwrap();
        n.write(0, 2, None, &mut DefaultPolicy).unwrap();
        // (5^2 + 5^2) / 2
        assert_eq!(DeathTimePolicy::score(n.flash().block(0).unwrap(), 15), 25.0);
    }

    #[test]
    fn death_time_places_near_similar_pages() {
        let mut n = nand(3, 4);
        n.write(0, 0, Some(1000), &mut DefaultPolicy).unwrap();
        n.write(1, 0, Some(10), &mut DefaultPolicy).unwrap();
        n.write(2, 0, Some(500), &mut DefaultPolicy).unwrap();

        let policy = DeathTimePolicy;
        assert_eq!(policy.place(&n, 0, 3, Some(12)).unwrap(), Placement::Fresh(1, 1));
        assert_eq!(policy.place(&n, 1, 3, Some(990)).unwrap(), Placement::Fresh(0, 1));
    }

    #[test]
    fn death_time_ties_keep_lowest_block() {
        let mut n = nand(3, 4);
        n.write(1, 0, Some(10), &mut DefaultPolicy).unwrap();
        n.write(2, 0, Some(10), &mut DefaultPolicy).unwrap();
        // block 0 is empty, its fallback score (4) loses to distance 0
        assert_eq!(DeathTimePolicy::best_block(&n, 10), Some(1));
    }

    #[test]
    fn death_time_skips_full_blocks() {
        let mut n = nand(2, 1);
        n.write(0, 0, Some(7), &mut DefaultPolicy).unwrap();
        assert_eq!(DeathTimePolicy::best_block(&n, 7), Some(1));
    }

    #[test]
    fn death_time_unset_or_update() {
        let mut n = nand(2, 4);
        let policy = DeathTimePolicy;
        assert_eq!(policy.place(&n, 1, 2, None).unwrap(), Placement::Fresh(1, 2));

        n.write(1, 2, Some(3), &mut DefaultPolicy).unwrap();
        assert_eq!(policy.place(&n, 1, 2, Some(3)).unwrap(), Placement::Update);
        assert!(policy.place(&n, 9, 0, Some(3)).is_err());
    }

    #[test]
    fn default_placement_is_requested() {
        let n = nand(1, 4);
        assert_eq!(DefaultPolicy.place(&n, 0, 0, Some(1)).unwrap(), Placement::Requested);
        assert_eq!(InPlacePolicy.place(&n, 0, 0, None).unwrap(), Placement::Requested);
    }
}
