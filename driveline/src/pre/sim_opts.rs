use clap::Parser;
use helpers::general::InputValueError;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "driveline",
    about = "A waypoint-following AI race simulator written in Rust"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug printing (only for non-live mode)
    #[clap(short, long)]
    pub debug: bool,

    /// Run the race in real time and print telemetry events as they happen
    #[clap(short, long)]
    pub live: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs (only for non-live mode, ignored in live mode)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the simulation parameter file
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set real-time factor (only relevant in live mode)
    #[clap(short, long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Set simulation timestep size in seconds, must be in the range [0.001, 1.0]
    #[clap(short, long, default_value = "0.0166667")]
    pub timestep_size: f64,

    /// Override the jitter seed from the parameter file
    #[clap(short, long)]
    pub seed: Option<u64>,
}

/// check_sim_opts verifies that the simulation options fulfill the posed requirements.
pub fn check_sim_opts(sim_opts: &SimOpts) -> Result<(), InputValueError> {
    if !(0.001..=1.0).contains(&sim_opts.timestep_size) {
        return Err(InputValueError);
    }

    if sim_opts.realtime_factor <= 0.0 {
        return Err(InputValueError);
    }

    if sim_opts.no_sim_runs == 0 {
        return Err(InputValueError);
    }

    Ok(())
}
