use std::fmt;

use crate::config::{BaseType, BlockId, DeathTime, PageId};
use crate::error::{Error, Result};

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum PageStatus {
    Empty,
    InUse,
    Dirty,
}

/// Smallest erasable unit. `empty` and `dirty` always match the page table.
#[derive(Clone)]
pub struct Block {
    pages: Vec<PageStatus>,
    death_times: Vec<DeathTime>,
    empty: BaseType,
    dirty: BaseType,
}

impl Block {
    pub fn new(pages_per_block: BaseType) -> Self {
        Block {
            pages: vec![PageStatus::Empty; pages_per_block],
            death_times: vec![None; pages_per_block],
            empty: pages_per_block,
            dirty: 0,
        }
    }

    pub fn page_count(&self) -> BaseType {
        self.pages.len()
    }

    pub fn is_erased(&self) -> bool {
        self.empty == self.pages.len()
    }

    pub fn status(&self, page: PageId) -> PageStatus {
        self.pages[page]
    }

    pub fn death_time(&self, page: PageId) -> DeathTime {
        self.death_times[page]
    }

    pub fn pages(&self) -> &[PageStatus] {
        &self.pages
    }

    pub fn empty_count(&self) -> BaseType {
        self.empty
    }

    pub fn dirty_count(&self) -> BaseType {
        self.dirty
    }

    pub fn in_use_count(&self) -> BaseType {
        self.pages.len() - self.empty - self.dirty
    }

    /// Lowest-indexed empty page. The ascending scan order is part of the
    /// placement contract.
    pub fn first_empty_page(&self) -> Option<PageId> {
        if self.empty == 0 {
            return None;
        }
        self.pages.iter().position(|s| *s == PageStatus::Empty)
    }

    /// Live pages with their death-time annotation, in page order.
    pub fn live_pages(&self) -> Vec<(PageId, DeathTime)> {
        self.pages
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == PageStatus::InUse)
            .map(|(p, _)| (p, self.death_times[p]))
            .collect()
    }

    /// Empty -> InUse.
    pub(crate) fn fill(&mut self, page: PageId, death_time: DeathTime) {
        debug_assert_eq!(self.pages[page], PageStatus::Empty, "filling a used page");

        self.pages[page] = PageStatus::InUse;
        self.death_times[page] = death_time;
        self.empty -= 1;
    }

    /// InUse -> Dirty.
    pub(crate) fn invalidate(&mut self, page: PageId) {
        debug_assert_eq!(self.pages[page], PageStatus::InUse, "invalidating a page not in use");

        self.pages[page] = PageStatus::Dirty;
        self.dirty += 1;
    }

    /// Every page back to Empty. Death-time annotations are kept until rewritten.
    pub(crate) fn erase(&mut self) {
        self.pages.fill(PageStatus::Empty);
        self.empty = self.pages.len();
        self.dirty = 0;
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block(empty={}, dirty={}) [", self.empty, self.dirty)?;
        for status in &self.pages {
            let symbol = match status {
                PageStatus::InUse => "U",
                PageStatus::Dirty => "D",
                PageStatus::Empty => ".",
            };
            write!(f, "{}", symbol)?;
        }
        write!(f, "]")
    }
}

/// Page status table of the whole device. Geometry is fixed at construction.
#[derive(Clone, Debug)]
pub struct FlashStore {
    blocks: Vec<Block>,
    pages_per_block: BaseType,
}

impl FlashStore {
    pub fn new(total_blocks: BaseType, pages_per_block: BaseType) -> Self {
        FlashStore {
            blocks: vec![Block::new(pages_per_block); total_blocks],
            pages_per_block,
        }
    }

    pub fn total_blocks(&self) -> BaseType {
        self.blocks.len()
    }

    pub fn pages_per_block(&self) -> BaseType {
        self.pages_per_block
    }

    pub fn total_pages(&self) -> BaseType {
        self.blocks.len() * self.pages_per_block
    }

    pub fn check_block(&self, block: BlockId) -> Result<()> {
        if block < self.blocks.len() {
            Ok(())
        } else {
            Err(Error::BlockOutOfRange(block))
        }
    }

    pub fn check_page(&self, block: BlockId, page: PageId) -> Result<()> {
        if block < self.blocks.len() && page < self.pages_per_block {
            Ok(())
        } else {
            Err(Error::OutOfRange { block, page })
        }
    }

    pub fn block(&self, block: BlockId) -> Result<&Block> {
        self.blocks.get(block).ok_or(Error::BlockOutOfRange(block))
    }

    pub(crate) fn block_mut(&mut self, block: BlockId) -> Result<&mut Block> {
        self.blocks.get_mut(block).ok_or(Error::BlockOutOfRange(block))
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn status(&self, block: BlockId, page: PageId) -> Result<PageStatus> {
        self.check_page(block, page)?;
        Ok(self.blocks[block].status(page))
    }

    pub fn number_of_empty_pages(&self) -> BaseType {
        self.blocks.iter().map(Block::empty_count).sum()
    }

    pub fn number_of_dirty_pages(&self) -> BaseType {
        self.blocks.iter().map(Block::dirty_count).sum()
    }

    pub fn number_of_in_use_pages(&self) -> BaseType {
        self.total_pages() - self.number_of_empty_pages() - self.number_of_dirty_pages()
    }

    /// First block with every page empty.
    pub fn empty_block(&self) -> Option<BlockId> {
        self.blocks.iter().position(Block::is_erased)
    }

    /// Block with the strictly greatest number of dirty pages; ties keep the
    /// lowest index and a clean device yields block 0.
    pub fn dirtiest_block(&self) -> BlockId {
        let mut best = 0;
        let mut max_dirty = 0;
        for (b, block) in self.blocks.iter().enumerate() {
            if block.dirty_count() > max_dirty {
                max_dirty = block.dirty_count();
                best = b;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_counts_consistent(store: &FlashStore) {
        for block in store.blocks() {
            let empty = block.pages().iter().filter(|s| **s == PageStatus::Empty).count();
            let dirty = block.pages().iter().filter(|s| **s == PageStatus::Dirty).count();
            assert_eq!(block.empty_count(), empty);
            assert_eq!(block.dirty_count(), dirty);
            assert_eq!(block.empty_count() + block.dirty_count() + block.in_use_count(), block.page_count());
        }
    }

    #[test]
    fn new_store_is_empty() {
        let store = FlashStore::new(3, 8);
        assert_eq!(store.total_pages(), 24);
        assert_eq!(store.number_of_empty_pages(), 24);
        assert_eq!(store.number_of_dirty_pages(), 0);
        assert_eq!(store.number_of_in_use_pages(), 0);
        assert_eq!(store.empty_block(), Some(0));
        assert_counts_consistent(&store);
    }

    #[test]
    fn fill_invalidate_erase_cycle() {
        let mut block = Block::new(4);
        block.fill(0, Some(7));
        block.fill(2, None);
        assert_eq!(block.first_empty_page(), Some(1));
        block.invalidate(0);
        assert_eq!(block.empty_count(), 2);
        assert_eq!(block.dirty_count(), 1);
        assert_eq!(block.in_use_count(), 1);
        assert_eq!(block.live_pages(), vec![(2, None)]);

        block.erase();
        assert!(block.is_erased());
        assert_eq!(block.dirty_count(), 0);
        assert_eq!(block.first_empty_page(), Some(0));
    }

    #[test]
    fn first_empty_page_none_when_full() {
        let mut block = Block::new(2);
        block.fill(0, None);
        block.fill(1, None);
        assert_eq!(block.first_empty_page(), None);
    }

    #[test]
    fn range_checks() {
        let store = FlashStore::new(2, 4);
        assert!(store.check_page(1, 3).is_ok());
        assert!(matches!(store.check_page(2, 0), Err(Error::OutOfRange { block: 2, page: 0 })));
        assert!(matches!(store.check_page(0, 4), Err(Error::OutOfRange { .. })));
        assert!(matches!(store.check_block(5), Err(Error::BlockOutOfRange(5))));
        assert!(store.status(0, 9).is_err());
    }

    #[test]
    fn dirtiest_block_keeps_first_on_tie() {
        let mut store = FlashStore::new(3, 4);
        assert_eq!(store.dirtiest_block(), 0);

        for b in [1, 2] {
            let block = store.block_mut(b).unwrap();
            block.fill(0, None);
            block.invalidate(0);
        }
        assert_eq!(store.dirtiest_block(), 1);
        assert_eq!(store.empty_block(), Some(0));
        assert_counts_consistent(&store);
    }
}
