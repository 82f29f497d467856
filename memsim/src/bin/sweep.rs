use memsim::{
    alloc::MemParameters,
    logging,
    sim::{SimStats, Simulator},
    *,
};
use rayon::prelude::*;

/// Runs many random workloads under both placement strategies and
/// compares them
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// First seed of the sweep (must be non-zero)
    #[arg(short, long, default_value_t = 1)]
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    first_seed: u64,

    /// How many seeds to try
    #[arg(short = 'r', long, default_value_t = 64)]
    #[arg(value_parser = clap::value_parser!(u64))]
    runs:       u64,

    /// Processes per workload (0 lets the generator pick)
    #[arg(short = 'n', long, default_value_t = MAX_PROCESSES)]
    #[arg(value_parser = clap::value_parser!(usize))]
    processes:  usize,

    /// Allocation chunk, in bytes (decimal or 0x-prefixed hex)
    #[arg(short, long, default_value = "0x100", value_parser = parse_size)]
    chunk:      Bytes,

    /// Total main memory, in bytes
    #[arg(short, long, default_value = "0x4000", value_parser = parse_size)]
    memory:     Bytes,

    /// Kernel reservation at the bottom of memory, in bytes
    #[arg(short, long, default_value = "0x1000", value_parser = parse_size)]
    kernel:     Bytes,

    /// Log filter directive (default: RUST_LOG, then `warn`)
    #[arg(long)]
    log:        Option<String>,
}

/// Runs one workload to completion.
fn run_one(params: MemParameters, processes: usize, seed: u64) -> SimResult<SimStats> {
    let mut sim = Simulator::new(params);
    sim.random_fill(processes, seed)?;
    sim.run(0)?;

    Ok(sim.stats())
}

#[derive(Default)]
struct Totals {
    runs:       usize,
    waited:     usize,
    discarded:  usize,
    mean_wait:  f64,
    makespan:   Time,
}

impl Totals {
    fn add(mut self, s: &SimStats) -> Self {
        self.runs += 1;
        self.waited += s.waited;
        self.discarded += s.discarded;
        self.mean_wait += s.mean_wait;
        self.makespan += s.makespan;
        self
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Args::parse();
    logging::init(cli.log.as_deref())?;

    let last_seed = cli.first_seed.saturating_add(cli.runs);
    println!("Sweeping seeds {}..{} with {} processes each.", cli.first_seed, last_seed, cli.processes);
    for policy in [Policy::FirstFit, Policy::Buddy] {
        let params = MemParameters::new(cli.memory, cli.kernel, cli.chunk, policy)?;
        // Every run owns its simulator, nothing is shared.
        let stats = (cli.first_seed..last_seed)
            .into_par_iter()
            .map(|seed| run_one(params, cli.processes, seed))
            .collect::<SimResult<Vec<SimStats>>>()?;

        let totals = stats.iter().fold(Totals::default(), Totals::add);
        let runs = totals.runs.max(1) as f64;
        println!(
            "{policy}:\twaited {:.2}/run\tdiscarded {:.2}/run\tmean wait {:.2}\tmakespan {:.1}",
            totals.waited as f64 / runs,
            totals.discarded as f64 / runs,
            totals.mean_wait / runs,
            totals.makespan as f64 / runs,
        );
    }

    Ok(())
}
