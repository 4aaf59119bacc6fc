//! NAND flash write-amplification simulator.
//!
//! A [`Disk`] tracks the status of every page, charges a fixed cost per
//! physical operation, and delegates full-block updates to a pluggable
//! [`WritePolicy`] and reclamation to a pluggable [`GarbageCollector`].

pub mod config;
pub mod disk;
pub mod error;
pub mod factory;
pub mod fixed;
pub mod flash;
pub mod gc;
pub mod nand;
pub mod policy;
pub mod simulation;
pub mod stats;

pub use config::{BlockId, DeathTime, DiskConfig, PageId};
pub use disk::Disk;
pub use error::{Error, Result};
pub use factory::{assemble, assemble_from_tokens, GcKind, GcParams, WritePolicyKind};
pub use fixed::Fixed;
pub use gc::{GarbageCollector, GcReport};
pub use nand::Outcome;
pub use policy::WritePolicy;
pub use stats::{Stats, StatsSnapshot};
