//! The zone-rebind program
//!
//! Reads the given zone files, rebinds one owner name to a new address and
//! writes the files back.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use zone_rebind::{Database, ParseConfig, config::DEFAULT_TTL};

/// Rebind an A/AAAA record across DNS zone files.
///
/// Every record owned by NAME whose address differs from ADDRESS is
/// rewritten in place, and the SOA serial of each changed authority is
/// incremented once. Everything else in the files is left as is.
#[derive(Debug, Parser)]
#[command(name = "zone-rebind", version)]
struct Opts {
    /// Owner name to rebind, fully qualified (e.g. `www.example.com.`)
    name: String,

    /// New address; IPv4 updates A records, IPv6 updates AAAA records
    address: String,

    /// Zone files to process
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Origin for relative names appearing before any $ORIGIN
    #[arg(long)]
    origin: Option<String>,

    /// TTL for records with neither an explicit TTL nor a $TTL
    #[arg(long, default_value_t = DEFAULT_TTL)]
    default_ttl: u32,

    /// Print the rewritten files to stdout instead of replacing them
    #[arg(long)]
    dry_run: bool,

    /// Enable debug + info + warning + error logging
    #[arg(long)]
    debug: bool,

    /// Enable info + warning + error logging
    #[arg(long)]
    info: bool,

    /// Enable warning + error logging
    #[arg(long)]
    warn: bool,

    /// Enable error logging
    #[arg(long)]
    error: bool,
}

impl Opts {
    const fn log_level(&self) -> Level {
        if self.debug {
            Level::DEBUG
        } else if self.info {
            Level::INFO
        } else if self.warn || !self.error {
            Level::WARN
        } else {
            Level::ERROR
        }
    }

    fn parse_config(&self) -> ParseConfig {
        let config = ParseConfig::new().with_default_ttl(self.default_ttl);
        match &self.origin {
            Some(origin) => config.with_origin(origin.clone()),
            None => config,
        }
    }
}

fn logger(level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().compact().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn run(opts: &Opts) -> zone_rebind::Result<()> {
    let mut db = Database::with_config(opts.parse_config());
    db.process(&opts.files)?;

    let changed = db.update_ip(&opts.name, &opts.address);
    tracing::info!(name = %opts.name, address = %opts.address, changed, "Update applied");

    if opts.dry_run {
        let mut out = io::stdout().lock();
        db.render(&mut out)?;
        out.flush()?;
        return Ok(());
    }

    db.write()
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    logger(opts.log_level());

    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "zone-rebind failed");
            eprintln!("zone-rebind: {e}");
            ExitCode::FAILURE
        }
    }
}
