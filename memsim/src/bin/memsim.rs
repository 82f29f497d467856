use memsim::{
    alloc::MemParameters,
    logging,
    report,
    sim::Simulator,
    *,
};
use std::fs::File;
use anyhow::Context;

/// Scheduler and main memory simulator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Workload file (`pid;arrival;lifetime;size,...` per line)
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    #[arg(conflicts_with = "random")]
    input:      Option<PathBuf>,

    /// Generate a random workload of this many processes (0 lets the generator pick)
    #[arg(short = 'n', long)]
    #[arg(value_parser = clap::value_parser!(usize))]
    random:     Option<usize>,

    /// Seed of the random workload (0 seeds from the process id)
    #[arg(short, long, default_value_t = 0)]
    #[arg(value_parser = clap::value_parser!(u64))]
    seed:       u64,

    /// Where the tables go (default: standard output)
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    output:     Option<PathBuf>,

    /// Placement strategy
    #[arg(short = 'f', long, value_enum, default_value_t = Policy::FirstFit)]
    policy:     Policy,

    /// Allocation chunk, in bytes (decimal or 0x-prefixed hex)
    #[arg(short, long, default_value = "0x100", value_parser = parse_size)]
    chunk:      Bytes,

    /// Total main memory, in bytes
    #[arg(short, long, default_value = "0x100000", value_parser = parse_size)]
    memory:     Bytes,

    /// Kernel reservation at the bottom of memory, in bytes
    #[arg(short, long, default_value = "0x10000", value_parser = parse_size)]
    kernel:     Bytes,

    /// Number of steps to run (0 runs to completion)
    #[arg(long, default_value_t = 0)]
    #[arg(value_parser = clap::value_parser!(u64))]
    steps:      u64,

    /// Print every table after every step
    #[arg(short, long)]
    verbose:    bool,

    /// Log filter directive, e.g. `memsim=debug` (default: RUST_LOG, then `warn`)
    #[arg(long)]
    log:        Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Args::parse();
    logging::init(cli.log.as_deref())?;

    let params = MemParameters::new(cli.memory, cli.kernel, cli.chunk, cli.policy)?;
    let mut sim = Simulator::new(params);
    match (&cli.input, cli.random) {
        (Some(path), _)     => {
            sim.load(path).with_context(|| format!("loading {}", path.display()))?;
        },
        (None, Some(n))     => { sim.random_fill(n, cli.seed)?; },
        (None, None)        => {
            anyhow::bail!("no workload: pass --input FILE or --random N");
        }
    }

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path)  => Box::new(std::io::BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?
        )),
        None        => Box::new(std::io::stdout().lock()),
    };

    report::write_all(&mut out, &sim)?;
    if cli.verbose {
        while cli.steps == 0 || sim.step_count() < cli.steps {
            if !sim.step()? {
                break;
            }
            report::write_all(&mut out, &sim)?;
        }
    } else {
        sim.run(cli.steps)?;
        report::write_all(&mut out, &sim)?;
    }
    report::write_stats(&mut out, &sim.stats())?;
    out.flush()?;

    Ok(())
}
