//! Random-workload driver: runs named disks over the same seeded page
//! workload, samples their statistics and exports them.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::Micros;
use crate::disk::Disk;
use crate::error::{Error, Result};
use crate::nand::Outcome;
use crate::stats::StatsSnapshot;

pub const DEFAULT_DRIFT_ATTEMPTS: usize = 3;

/// When statistics are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingKind {
    /// Every N workload steps, whatever each disk actually did.
    HostWrites,
    /// Every N µs of each disk's own simulated time.
    ElapsedTime,
}

impl FromStr for SamplingKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HOST_WRITE" | "SIM_SAMPLING_HOSTWRITE" => Ok(SamplingKind::HostWrites),
            "TIME" | "SIM_SAMPLING_TIME" => Ok(SamplingKind::ElapsedTime),
            other => Err(Error::UnknownSampling(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub name: String,
    /// Workload steps.
    pub sample_size: usize,
    /// Sampling period; steps or µs depending on `sampling_kind`.
    pub sampling: Option<u64>,
    pub sampling_kind: SamplingKind,
    /// Fresh samples tried per step while writes hit dirty pages.
    pub drift_attempts: usize,
    pub seed: u64,
    /// Tag writes with a death time drawn uniformly from `0..horizon`.
    pub death_time_horizon: Option<u64>,
}

impl SimulationConfig {
    pub fn new(name: impl Into<String>, sample_size: usize) -> Self {
        SimulationConfig {
            name: name.into(),
            sample_size,
            sampling: None,
            sampling_kind: SamplingKind::HostWrites,
            drift_attempts: DEFAULT_DRIFT_ATTEMPTS,
            seed: 7,
            death_time_horizon: None,
        }
    }

    /// Explicit period, or 10% of the sample size (at least 1).
    pub fn sampling_interval(&self) -> u64 {
        self.sampling
            .unwrap_or_else(|| (self.sample_size as u64 / 10).max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.drift_attempts == 0 {
            return Err(Error::InvalidConfig("drift_attempts must be greater than zero".into()));
        }
        if self.sampling == Some(0) {
            return Err(Error::InvalidConfig("sampling must be greater than zero".into()));
        }
        if self.death_time_horizon == Some(0) {
            return Err(Error::InvalidConfig("death time horizon must be greater than zero".into()));
        }
        Ok(())
    }
}

struct DiskRun {
    name: String,
    disk: Disk,
    rng: SmallRng,
    drift: usize,
    samples: Vec<StatsSnapshot>,
    last_sample_time: Micros,
}

pub struct Simulation {
    config: SimulationConfig,
    runs: Vec<DiskRun>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Simulation {
            config,
            runs: Vec::new(),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Every disk starts with an all-zero sample row.
    pub fn add_disk(&mut self, name: impl Into<String>, disk: Disk) {
        let initial = disk.snapshot();
        self.runs.push(DiskRun {
            name: name.into(),
            disk,
            rng: SmallRng::seed_from_u64(self.config.seed),
            drift: 0,
            samples: vec![initial],
            last_sample_time: 0,
        });
    }

    pub fn disk(&self, name: &str) -> Option<&Disk> {
        self.find(name).map(|r| &r.disk)
    }

    pub fn samples(&self, name: &str) -> Option<&[StatsSnapshot]> {
        self.find(name).map(|r| r.samples.as_slice())
    }

    /// Workload samples consumed by a disk, retries included.
    pub fn drift(&self, name: &str) -> Option<usize> {
        self.find(name).map(|r| r.drift)
    }

    fn find(&self, name: &str) -> Option<&DiskRun> {
        self.runs.iter().find(|r| r.name == name)
    }

    pub fn run(&mut self) -> Result<()> {
        let total = self.config.sample_size;
        let quantum = (total / 10).max(1);
        info!("simulation {:?}: {} steps on {} disks", self.config.name, total, self.runs.len());

        let start = Instant::now();
        for i in 0..total {
            if i % quantum == 0 {
                info!("running ... {}% (wall {:?})", i * 100 / total, start.elapsed());
            }
            self.step()?;
            self.sample(i);
        }
        self.sample(total);

        info!("simulation {:?} done in {:?}", self.config.name, start.elapsed());
        for run in &self.runs {
            debug!("{}: drift {}", run.name, run.drift);
        }
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        let attempts = self.config.drift_attempts;
        let horizon = self.config.death_time_horizon;

        for run in &mut self.runs {
            let total_blocks = run.disk.config().total_blocks;
            let pages_per_block = run.disk.config().pages_per_block;

            for _ in 0..attempts {
                let block = run.rng.gen_range(0..total_blocks);
                let page = run.rng.gen_range(0..pages_per_block);
                let death_time = horizon.map(|h| run.rng.gen_range(0..h));

                let outcome = run.disk.write(block, page, death_time)?;
                run.drift += 1;
                if outcome != Outcome::FailedDirty {
                    break;
                }
            }
        }
        Ok(())
    }

    fn sample(&mut self, index: usize) {
        let total = self.config.sample_size;
        let interval = self.config.sampling_interval();

        match self.config.sampling_kind {
            SamplingKind::HostWrites => {
                let i = index as u64;
                if index >= total || (i > 0 && i % interval == 0) {
                    for run in &mut self.runs {
                        run.samples.push(run.disk.snapshot());
                    }
                }
            }
            SamplingKind::ElapsedTime => {
                for run in &mut self.runs {
                    let now = run.disk.elapsed_time();
                    let since = now - run.last_sample_time;
                    if (index >= total && since > 0) || since >= interval {
                        run.samples.push(run.disk.snapshot());
                        run.last_sample_time = now;
                    }
                }
            }
        }
    }

    /// One `raw_data_<disk>.csv` per disk.
    pub fn write_stats(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;

        let mut written = Vec::with_capacity(self.runs.len());
        for run in &self.runs {
            let path = dir.join(format!("raw_data_{}.csv", run.name));
            let mut out = BufWriter::new(File::create(&path)?);
            writeln!(out, "{}", StatsSnapshot::CSV_HEADER)?;
            for sample in &run.samples {
                writeln!(out, "{}", sample.to_csv_row())?;
            }
            out.flush()?;

            info!("Updated file '{}'", path.display());
            written.push(path);
        }
        Ok(written)
    }

    /// Human-readable summary of every disk into `disks<suffix>.txt`.
    pub fn write_disks(&self, dir: &Path, suffix: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let path = dir.join(format!("disks{}.txt", suffix));
        let mut out = BufWriter::new(File::create(&path)?);
        for run in &self.runs {
            write!(out, "Disk name: {}\n{}\n\n", run.name, run.disk)?;
        }
        out.flush()?;

        info!("Updated file '{}'", path.display());
        Ok(path)
    }
}
