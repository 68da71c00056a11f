//! CLI for fairdraw: verifiable draws from mixed weak entropy.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fairdraw")]
#[command(about = "fairdraw: verifiable draws from mixed weak entropy")]
#[command(version = fairdraw_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP job server. HOST, PORT, THREAD_POOL_WORKERS, JOB_TTL_SECS,
    /// STREAM_POLL_MS and EVICTION_INTERVAL_SECS are read from the environment.
    Serve {
        /// Bind address (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one draw in-process and print the result as JSON
    Draw {
        /// Comma-separated source names
        #[arg(long, default_value = "os,time")]
        sources: String,

        /// Whitened bits to collect
        #[arg(long, default_value = "4096")]
        bits: usize,

        /// How many numbers to draw
        #[arg(long, default_value = "6")]
        numbers: usize,

        /// Largest number that can be drawn
        #[arg(long, default_value = "49")]
        max_number: u64,

        /// Also write the whitened bits to this file, for `fairdraw verify`
        #[arg(long)]
        bits_out: Option<String>,

        /// Include the full stage log in the output
        #[arg(long)]
        stages: bool,
    },

    /// Run the quick battery (and optionally NIST SP 800-22) over a file of
    /// bits. Characters other than '0' and '1' are ignored.
    Audit {
        /// File containing the bit sequence
        file: String,

        /// Run the full NIST SP 800-22 battery as well
        #[arg(long)]
        nist: bool,
    },

    /// Recompute a draw's fingerprint from its published bits
    Verify {
        /// File containing the whitened bits
        bits_file: String,

        /// Published fingerprint (hex)
        fingerprint: String,

        /// Also recompute the draw: how many numbers
        #[arg(long, requires = "max_number")]
        numbers: Option<usize>,

        /// Also recompute the draw: largest number
        #[arg(long, requires = "numbers")]
        max_number: Option<u64>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => commands::serve::run(host, port),
        Commands::Draw {
            sources,
            bits,
            numbers,
            max_number,
            bits_out,
            stages,
        } => commands::draw::run(commands::draw::DrawCommandConfig {
            sources: &sources,
            bits,
            numbers,
            max_number,
            bits_out: bits_out.as_deref(),
            include_stages: stages,
        }),
        Commands::Audit { file, nist } => commands::audit::run(&file, nist),
        Commands::Verify {
            bits_file,
            fingerprint,
            numbers,
            max_number,
        } => commands::verify::run(&bits_file, &fingerprint, numbers.zip(max_number)),
    }
}
