use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use log::info;
use simplelog::*;
use time::macros::format_description;

use nand_waf_sim::config::{self, DiskConfig};
use nand_waf_sim::factory::{assemble_from_tokens, GcParams, DEFAULT_GC_DIRTY_THRESHOLD, DEFAULT_GC_MIN_INTERVAL};
use nand_waf_sim::simulation::{SamplingKind, Simulation, SimulationConfig};

/// Random uniform page-write simulation over one or more disks.
#[derive(Parser)]
struct Cli {
    /// Disk as NAME:WRITE_POLICY:GC, repeatable.
    #[arg(long = "disk", default_values = ["base:DEFAULT:NONE", "basegc:DEFAULT:SIMPLE"])]
    disks: Vec<String>,

    #[arg(long, default_value_t = config::DEFAULT_TOTAL_BLOCKS)]
    blocks: usize,
    #[arg(long, default_value_t = config::DEFAULT_PAGES_PER_BLOCK)]
    pages_per_block: usize,
    #[arg(long, default_value_t = config::DEFAULT_PAGE_SIZE)]
    page_size: usize,

    #[arg(long, default_value_t = DEFAULT_GC_MIN_INTERVAL)]
    gc_min_interval: u64,
    #[arg(long, default_value = DEFAULT_GC_DIRTY_THRESHOLD)]
    gc_dirty_threshold: String,

    #[arg(long, default_value = "demo")]
    name: String,
    #[arg(long, default_value_t = 20_000)]
    samples: usize,
    /// Sampling period; defaults to 10% of the samples.
    #[arg(long)]
    sampling: Option<u64>,
    /// HOST_WRITE or TIME.
    #[arg(long, default_value = "HOST_WRITE")]
    sampling_type: String,
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Tag writes with random death times below this horizon.
    #[arg(long)]
    death_time_horizon: Option<u64>,

    #[arg(long, default_value = "./simulations/RESULTS")]
    output: PathBuf,
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_cfg = ConfigBuilder::new()
        .set_time_format_custom(format_description!("[hour]:[minute]:[second].[subsecond]"))
        .build();
    SimpleLogger::init(cli.log_level, log_cfg)?;

    let disk_cfg = DiskConfig {
        total_blocks: cli.blocks,
        pages_per_block: cli.pages_per_block,
        page_size: cli.page_size,
        ..Default::default()
    };
    let gc_params = GcParams::new(cli.gc_min_interval, &cli.gc_dirty_threshold)?;

    let mut sim_cfg = SimulationConfig::new(cli.name.clone(), cli.samples);
    sim_cfg.sampling = cli.sampling;
    sim_cfg.sampling_kind = cli.sampling_type.parse::<SamplingKind>()?;
    sim_cfg.seed = cli.seed;
    sim_cfg.death_time_horizon = cli.death_time_horizon;

    let mut sim = Simulation::new(sim_cfg)?;
    for spec in &cli.disks {
        let mut parts = spec.splitn(3, ':');
        let (Some(name), Some(policy), Some(gc)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(anyhow!("disk {:?} is not NAME:WRITE_POLICY:GC", spec));
        };
        let disk = assemble_from_tokens(disk_cfg.clone(), policy, gc, &gc_params)
            .with_context(|| format!("disk {:?}", name))?;
        sim.add_disk(name, disk);
    }

    let out_dir = cli.output.join(&cli.name);
    sim.write_disks(&out_dir, "_setup")?;
    sim.run()?;
    sim.write_stats(&out_dir)?;
    sim.write_disks(&out_dir, "_results")?;

    for spec in &cli.disks {
        let name = spec.split(':').next().unwrap_or_default();
        if let Some(disk) = sim.disk(name) {
            info!(
                "{}: WA {}, IOPS {}, failures {} %",
                name,
                disk.write_amplification(),
                disk.iops(),
                disk.failure_rate()
            );
        }
    }

    Ok(())
}
