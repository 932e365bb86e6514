use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use ferrous_emit::{
    AlignmentRecord, PairedOrder, RecordOrder, RecordReader, SingleEndOrder, StreamFlags,
};

#[derive(Parser)]
#[command(name = "ferrous-emit")]
#[command(about = "Inspect and check intermediate alignment record streams", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose level: 1=error, 2=warning, 3=message, 4=debug, 5+=trace
    #[arg(short = 'v', long, value_name = "INT", default_value = "3", global = true)]
    verbosity: i32,

    #[command(subcommand)]
    command: Commands,
}

/// Optional field groups a stream was written with
#[derive(clap::Args, Clone, Copy)]
struct LayoutArgs {
    /// Records carry mate position, template length and combined score
    #[arg(long)]
    paired: bool,

    /// Records carry an MD string
    #[arg(long)]
    md: bool,

    /// Records carry CG read bases, super-CIGAR and read delta
    #[arg(long)]
    cg: bool,

    /// Records carry the unfiltered-mated tag
    #[arg(long)]
    unfiltered: bool,
}

impl LayoutArgs {
    fn flags(&self) -> StreamFlags {
        StreamFlags {
            paired: self.paired,
            legacy_md: self.md,
            platform_cg: self.cg,
            unfiltered: self.unfiltered,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderArg {
    /// Reference, position, read id, strand, score
    Single,
    /// Reference, position, read id, mate position, strands, pairing, combined score
    Paired,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a stream and print one tab-separated line per record
    View {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Check that streams are complete and strictly ordered
    Validate {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        layout: LayoutArgs,

        /// Record order the streams must follow
        #[arg(long, value_enum, default_value = "single")]
        order: OrderArg,

        /// Number of threads (default: all available cores)
        #[arg(short = 't', long, value_name = "INT")]
        threads: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Map verbosity (1=error, 2=warning, 3=message, 4=debug, 5+=trace) to log levels
    let log_level = match cli.verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    let result = match cli.command {
        Commands::View { file, layout } => view(&file, layout.flags()),
        Commands::Validate {
            files,
            layout,
            order,
            threads,
        } => validate(&files, layout.flags(), order, threads),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn view(path: &Path, flags: StreamFlags) -> anyhow::Result<()> {
    let reader = RecordReader::open(path, flags)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for record in reader {
        let record = record.with_context(|| format!("Failed to decode {}", path.display()))?;
        write_tsv(&mut out, &record, flags)?;
    }
    out.flush()?;
    Ok(())
}

fn write_tsv<W: Write>(out: &mut W, record: &AlignmentRecord, flags: StreamFlags) -> io::Result<()> {
    write!(
        out,
        "{}\t{}\t{}\t{}\t0x{:02x}\t{}\t{}\t{}",
        record.reference_id,
        record.start_position,
        record.read_id,
        record.strand(),
        record.flags,
        record.score,
        record.mismatches,
        String::from_utf8_lossy(&record.cigar),
    )?;
    if flags.legacy_md {
        write!(out, "\t{}", String::from_utf8_lossy(&record.md))?;
    }
    if flags.paired {
        write!(
            out,
            "\t{}\t{}\t{}",
            record.mate_position, record.template_length, record.combo_score
        )?;
    }
    if flags.platform_cg {
        write!(
            out,
            "\t{}\t{}\t{}",
            String::from_utf8_lossy(&record.read),
            String::from_utf8_lossy(&record.super_cigar),
            String::from_utf8_lossy(&record.read_delta),
        )?;
    }
    if flags.unfiltered {
        write!(out, "\t{}", u8::from(record.unfiltered_mated))?;
    }
    writeln!(out)
}

fn validate(
    files: &[PathBuf],
    flags: StreamFlags,
    order: OrderArg,
    threads: Option<usize>,
) -> anyhow::Result<()> {
    let mut num_threads = threads.unwrap_or_else(num_cpus::get);
    if num_threads < 1 {
        log::warn!("Invalid thread count {}, using 1 thread", num_threads);
        num_threads = 1;
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .context("Failed to build thread pool")?;
    log::debug!("Validating {} streams on {} threads", files.len(), num_threads);

    let results: Vec<anyhow::Result<u64>> = pool.install(|| {
        files
            .par_iter()
            .map(|path| match order {
                OrderArg::Single => check_stream::<SingleEndOrder>(path, flags),
                OrderArg::Paired => check_stream::<PairedOrder>(path, flags),
            })
            .collect()
    });

    let mut failed = 0;
    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(records) => log::info!("{}: OK ({} records)", path.display(), records),
            Err(e) => {
                log::error!("{}: {:#}", path.display(), e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} streams failed validation", failed, files.len());
    }
    Ok(())
}

/// Decode a whole stream, requiring the end-of-stream record and strictly
/// increasing order. Returns the record count.
fn check_stream<O: RecordOrder>(path: &Path, flags: StreamFlags) -> anyhow::Result<u64> {
    let mut reader = RecordReader::open(path, flags).context("open failed")?;
    let mut previous: Option<AlignmentRecord> = None;
    while let Some(record) = reader.read_record()? {
        if let Some(prev) = &previous {
            match O::compare(prev, &record) {
                Ordering::Less => {}
                Ordering::Equal => bail!("duplicate record {}", record),
                Ordering::Greater => bail!("record {} follows {}", record, prev),
            }
        }
        previous = Some(record);
    }
    Ok(reader.records())
}
