use thiserror::Error;

use crate::config::{BlockId, PageId};

/// Simulator specialized Result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Invalid input or configuration. Dirty reads, discarded writes and a full
/// disk are simulation outcomes, see [`crate::nand::Outcome`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("page address out of range: block {block}, page {page}")]
    OutOfRange { block: BlockId, page: PageId },

    #[error("block {0} out of range")]
    BlockOutOfRange(BlockId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid write policy: {0:?}")]
    UnknownWritePolicy(String),

    #[error("invalid garbage collector: {0:?}")]
    UnknownGarbageCollector(String),

    #[error("invalid sampling type: {0:?}")]
    UnknownSampling(String),

    #[error("invalid decimal: {0:?}")]
    InvalidDecimal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
