use std::fmt;
use std::str::FromStr;

use crate::config::{DiskConfig, Micros};
use crate::disk::Disk;
use crate::error::{Error, Result};
use crate::fixed::Fixed;
use crate::gc::{GarbageCollector, NoGc, SimpleGc};
use crate::policy::{DeathTimePolicy, DefaultPolicy, InPlaceNoErasePolicy, InPlacePolicy, WritePolicy};

pub const DEFAULT_GC_MIN_INTERVAL: Micros = 500_000;
pub const DEFAULT_GC_DIRTY_THRESHOLD: &str = "0.4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicyKind {
    Default,
    InPlace,
    InPlaceNoErase,
    ByDeathTime,
}

impl FromStr for WritePolicyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DEFAULT" | "WP_DEFAULT" => Ok(WritePolicyKind::Default),
            "IN_PLACE" | "WP_IP" => Ok(WritePolicyKind::InPlace),
            "IN_PLACE_NO_ERASE" | "WP_IP_NE" => Ok(WritePolicyKind::InPlaceNoErase),
            "BY_DEATH_TIME" | "WP_DT" => Ok(WritePolicyKind::ByDeathTime),
            other => Err(Error::UnknownWritePolicy(other.to_string())),
        }
    }
}

impl fmt::Display for WritePolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            WritePolicyKind::Default => "DEFAULT",
            WritePolicyKind::InPlace => "IN_PLACE",
            WritePolicyKind::InPlaceNoErase => "IN_PLACE_NO_ERASE",
            WritePolicyKind::ByDeathTime => "BY_DEATH_TIME",
        };
        f.write_str(token)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcKind {
    None,
    Simple,
}

impl FromStr for GcKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NONE" | "GC_NONE" => Ok(GcKind::None),
            "SIMPLE" | "GC_SIMPLE" => Ok(GcKind::Simple),
            other => Err(Error::UnknownGarbageCollector(other.to_string())),
        }
    }
}

impl fmt::Display for GcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GcKind::None => "NONE",
            GcKind::Simple => "SIMPLE",
        })
    }
}

/// Parameters of the simple collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcParams {
    pub min_interval_us: Micros,
    /// Dirty-page fraction in (0, 1].
    pub dirty_threshold: Fixed,
}

impl Default for GcParams {
    fn default() -> Self {
        GcParams {
            min_interval_us: DEFAULT_GC_MIN_INTERVAL,
            dirty_threshold: Fixed::ratio(2, 5, 1),
        }
    }
}

impl GcParams {
    pub fn new(min_interval_us: Micros, dirty_threshold: &str) -> Result<Self> {
        let params = GcParams {
            min_interval_us,
            dirty_threshold: dirty_threshold.parse()?,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dirty_threshold.is_zero() || self.dirty_threshold > Fixed::from_int(1, 0) {
            return Err(Error::InvalidConfig(format!(
                "dirty threshold {} not in (0, 1]",
                self.dirty_threshold
            )));
        }
        Ok(())
    }
}

pub fn write_policy(kind: WritePolicyKind) -> Box<dyn WritePolicy> {
    match kind {
        WritePolicyKind::Default => Box::new(DefaultPolicy),
        WritePolicyKind::InPlace => Box::new(InPlacePolicy),
        WritePolicyKind::InPlaceNoErase => Box::new(InPlaceNoErasePolicy),
        WritePolicyKind::ByDeathTime => Box::new(DeathTimePolicy),
    }
}

pub fn garbage_collector(kind: GcKind, params: &GcParams) -> Result<Box<dyn GarbageCollector>> {
    Ok(match kind {
        GcKind::None => Box::new(NoGc),
        GcKind::Simple => {
            params.validate()?;
            Box::new(SimpleGc::new(params.min_interval_us, params.dirty_threshold))
        }
    })
}

/// One disk from one write policy and one garbage collector.
pub fn assemble(config: DiskConfig, policy: WritePolicyKind, gc: GcKind, params: &GcParams) -> Result<Disk> {
    Disk::new(config, write_policy(policy), garbage_collector(gc, params)?)
}

/// [`assemble`] from selector tokens; unknown tokens fail.
pub fn assemble_from_tokens(config: DiskConfig, policy: &str, gc: &str, params: &GcParams) -> Result<Disk> {
    assemble(config, policy.parse()?, gc.parse()?, params)
}
