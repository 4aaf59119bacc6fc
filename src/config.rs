use crate::error::{Error, Result};

pub type BaseType = usize;

pub type BlockId = BaseType;
pub type PageId = BaseType;
pub type Counter = u64;

/// Simulated time, in microseconds.
pub type Micros = u64;

/// Expected invalidation time attached to a written page. `None` means unset.
pub type DeathTime = Option<u64>;

pub const DEFAULT_TOTAL_BLOCKS: BaseType = 256;
pub const DEFAULT_PAGES_PER_BLOCK: BaseType = 128;
pub const DEFAULT_PAGE_SIZE: BaseType = 4096;

pub const DEFAULT_WRITE_PAGE_TIME: Micros = 40;
pub const DEFAULT_READ_PAGE_TIME: Micros = 20;
pub const DEFAULT_ERASE_BLOCK_TIME: Micros = 1500;

pub const DEFAULT_METRIC_SCALE: u32 = 3;
pub const MAX_METRIC_SCALE: u32 = 18;

pub const MICROS_PER_SECOND: u128 = 1_000_000;
pub const BYTES_PER_MIB: u128 = 1 << 20;

/// Physical characteristics of a simulated NAND device. Immutable once a disk is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskConfig {
    pub total_blocks: BaseType,
    pub pages_per_block: BaseType,
    /// Bytes.
    pub page_size: BaseType,
    pub write_page_time: Micros,
    pub read_page_time: Micros,
    pub erase_block_time: Micros,
    /// Fractional digits kept by derived metrics.
    pub metric_scale: u32,
}

impl Default for DiskConfig {
    fn default() -> Self {
        DiskConfig {
            total_blocks: DEFAULT_TOTAL_BLOCKS,
            pages_per_block: DEFAULT_PAGES_PER_BLOCK,
            page_size: DEFAULT_PAGE_SIZE,
            write_page_time: DEFAULT_WRITE_PAGE_TIME,
            read_page_time: DEFAULT_READ_PAGE_TIME,
            erase_block_time: DEFAULT_ERASE_BLOCK_TIME,
            metric_scale: DEFAULT_METRIC_SCALE,
        }
    }
}

impl DiskConfig {
    pub fn with_geometry(total_blocks: BaseType, pages_per_block: BaseType) -> Self {
        DiskConfig {
            total_blocks,
            pages_per_block,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.total_blocks == 0, "total_blocks must be greater than zero"),
            (self.pages_per_block == 0, "pages_per_block must be greater than zero"),
            (self.page_size == 0, "page_size must be greater than zero"),
            (self.write_page_time == 0, "write_page_time must be greater than zero"),
            (self.read_page_time == 0, "read_page_time must be greater than zero"),
            (self.erase_block_time == 0, "erase_block_time must be greater than zero"),
            (self.metric_scale > MAX_METRIC_SCALE, "metric_scale must be at most 18"),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, reason)) => Err(Error::InvalidConfig(reason.to_string())),
            None => Ok(()),
        }
    }

    pub fn total_pages(&self) -> BaseType {
        self.total_blocks * self.pages_per_block
    }

    /// Bytes.
    pub fn block_size(&self) -> BaseType {
        self.page_size * self.pages_per_block
    }

    /// Bytes.
    pub fn total_disk_size(&self) -> BaseType {
        self.total_pages() * self.page_size
    }
}
