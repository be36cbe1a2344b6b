use anyhow::{bail, Context, Result};
use bzip2::read::BzDecoder;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wiktionary_etymology::expand::ExpansionTable;
use wiktionary_etymology::parallel::{process_batch_parallel, process_channel_pipeline, scan_entries, ParallelConfig};
use wiktionary_etymology::registry::WordIds;
use wiktionary_etymology::{Extractor, FailureKind, LanguageTable, ReportWriter, Stats, StopReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Single-threaded, one entry at a time
    Sequential,
    /// Batches of entries spread over threads
    BatchParallel,
    /// Reader, worker pool and ordered writer connected by channels
    ChannelPipeline,
}

#[derive(Parser)]
#[command(name = "wiktionary-etymology")]
#[command(about = "Extract etymology connections from Wiktionary entry JSONL - outputs one word pair per line")]
struct Args {
    /// Input JSONL file (.jsonl or .jsonl.bz2)
    input: PathBuf,

    /// Output JSONL file
    output: PathBuf,

    /// Processing strategy
    #[arg(short, long, value_enum, default_value_t = Strategy::ChannelPipeline)]
    strategy: Strategy,

    /// Number of threads (4 = default, 0 = auto-detect)
    #[arg(short, long, default_value_t = 4)]
    threads: usize,

    /// Batch size for batch-parallel strategy
    #[arg(long, default_value_t = 1000)]
    batch_size: usize,

    /// Channel buffer size for channel-pipeline strategy
    #[arg(long, default_value_t = 10000)]
    channel_buffer: usize,

    /// Stop after this many connections (sequential strategy only)
    #[arg(long)]
    limit: Option<usize>,

    /// Path to language YAML file (default: schema/languages.yaml relative to project root)
    #[arg(long)]
    languages: Option<PathBuf>,

    /// JSON table of rendered text for non-connection fragments
    #[arg(long)]
    expansions: Option<PathBuf>,

    /// Write dropped pairs, missed entries and unsupported stops here as JSONL
    #[arg(long)]
    failures: Option<PathBuf>,

    /// Word table JSONL; output rows carry ids instead of words
    #[arg(long)]
    ids: Option<PathBuf>,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Debug logging for every fragment decision
    #[arg(short, long)]
    verbose: bool,
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader: Box<dyn BufRead + Send> = if path.to_string_lossy().ends_with(".bz2") {
        Box::new(BufReader::with_capacity(256 * 1024, BzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(256 * 1024, file))
    };
    Ok(reader)
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::with_capacity(256 * 1024, file))
}

/// `<dir>/<stem>.unmatched.jsonl` next to the word table.
fn unmatched_path(ids_path: &Path) -> PathBuf {
    let stem = ids_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "words".to_string());
    ids_path.with_file_name(format!("{}.unmatched.jsonl", stem))
}

fn write_unmatched(ids: &WordIds, path: &Path) -> Result<()> {
    let mut out = create_output(path)?;
    for record in ids.unmatched() {
        writeln!(out, "{}", serde_json::to_string(record)?)?;
    }
    out.flush()?;
    Ok(())
}

fn run_sequential<W: Write>(
    reader: impl BufRead,
    extractor: &Extractor,
    writer: &mut ReportWriter<W>,
    quiet: bool,
) -> std::io::Result<Stats> {
    let start_time = Instant::now();
    let mut stats = Stats::default();
    let mut write_error = None;
    let mut limit_reached = false;

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap()
        );
        pb
    };

    scan_entries(reader, |index, line| {
        let report = extractor.process_line(index, &line);
        match writer.write(report, &mut stats) {
            Ok(true) => {
                limit_reached = true;
                return false;
            }
            Ok(false) => {}
            Err(e) => {
                write_error = Some(e);
                return false;
            }
        }

        if !quiet && stats.entries_read % 1000 == 0 {
            let elapsed = start_time.elapsed().as_secs_f64();
            let rate = stats.entries_read as f64 / elapsed;
            pb.set_message(format!(
                "Entries: {} | Edges: {} | Connections: {} | Rate: {:.0} entries/s",
                stats.entries_read, stats.edges, stats.connections_written, rate
            ));
        }
        true
    })?;

    if let Some(e) = write_error {
        return Err(e);
    }

    if limit_reached {
        pb.finish_with_message(format!("Reached limit of {} connections", stats.connections_written));
    } else {
        pb.finish_and_clear();
    }

    stats.elapsed = start_time.elapsed();
    Ok(stats)
}

fn print_stats(stats: &Stats, strategy_name: &str) {
    println!();
    println!("============================================================");
    println!("Strategy: {}", strategy_name);
    println!("Entries read: {}", stats.entries_read);
    println!("Entries processed: {}", stats.entries_processed);
    println!("Empty etymologies: {}", stats.skipped_empty);
    println!("Malformed lines: {}", stats.malformed);
    if stats.panicked > 0 || stats.lost > 0 {
        println!("Panicked entries: {}", stats.panicked);
        println!("Lost entries: {}", stats.lost);
    }
    println!("Edges: {}", stats.edges);
    println!("Connections written: {}", stats.connections_written);
    println!("------------------------------------------------------------");
    println!("Dropped pairs: {}", stats.dropped_total());
    for kind in FailureKind::ALL {
        if let Some(count) = stats.dropped.get(&kind) {
            println!("  {}: {}", kind, count);
        }
    }
    println!("Missed entries: {}", stats.missed);
    println!("------------------------------------------------------------");
    println!("Scan stops:");
    for reason in StopReason::ALL {
        if let Some(count) = stats.stops.get(&reason) {
            println!("  {}: {}", reason, count);
        }
    }
    println!("------------------------------------------------------------");
    println!("Time: {}m {}s", stats.elapsed.as_secs() / 60, stats.elapsed.as_secs() % 60);
    println!("Rate: {:.0} entries/sec", stats.entries_read as f64 / stats.elapsed.as_secs_f64());
    println!("============================================================");
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(std::io::stderr)
        .init();

    // Validate: --limit requires sequential mode for early termination
    if args.limit.is_some() && args.strategy != Strategy::Sequential {
        bail!(
            "--limit requires --strategy sequential.\n\
             Parallel strategies reorder results after processing,\n\
             so they cannot stop early when the limit is reached."
        );
    }

    let languages = LanguageTable::load_or_default(args.languages.as_deref())
        .context("loading language table")?;
    let mut extractor = Extractor::new(languages);
    if let Some(path) = &args.expansions {
        let table = ExpansionTable::load(path).context("loading expansion table")?;
        info!(fragments = table.len(), "using expansion table");
        extractor = extractor.with_expansions(table);
    }
    let extractor = Arc::new(extractor);

    // Build parallel config
    let mut config = ParallelConfig::default();
    if args.threads > 0 {
        config.num_threads = args.threads;
        config.num_workers = args.threads.saturating_sub(1).max(1);
    }
    config.batch_size = args.batch_size.max(1);
    config.channel_buffer = args.channel_buffer;

    if !args.quiet {
        println!("Parsing: {}", args.input.display());
        println!("Output: {}", args.output.display());
        println!("Strategy: {:?}", args.strategy);
        if args.strategy != Strategy::Sequential {
            println!("Threads: {}", config.num_threads);
        }
        if let Some(limit) = args.limit {
            println!("Limit: {} connections", limit);
        }
        println!();
    }

    let mut writer = ReportWriter::new(create_output(&args.output)?).with_limit(args.limit);
    if let Some(path) = &args.failures {
        writer = writer.with_failures(Box::new(create_output(path)?));
    }
    if let Some(path) = &args.ids {
        let ids = if path.exists() {
            WordIds::load(path).context("loading word table")?
        } else {
            WordIds::new()
        };
        info!(words = ids.len(), next_id = ids.next_id(), "word table ready");
        writer = writer.with_ids(ids);
    }

    let reader = open_input(&args.input)?;

    // Run the selected strategy
    let stats = match args.strategy {
        Strategy::Sequential => run_sequential(reader, &extractor, &mut writer, args.quiet)?,
        Strategy::BatchParallel => process_batch_parallel(reader, Arc::clone(&extractor), &mut writer, &config)?,
        Strategy::ChannelPipeline => process_channel_pipeline(reader, Arc::clone(&extractor), &mut writer, &config)?,
    };

    if let Some(ids) = writer.finish()? {
        if let Some(path) = &args.ids {
            let unmatched = unmatched_path(path);
            write_unmatched(&ids, &unmatched)?;
            info!(words = ids.unmatched().len(), path = %unmatched.display(), "wrote unmatched words");
        }
    }

    info!(
        entries = stats.entries_read,
        connections = stats.connections_written,
        dropped = stats.dropped_total(),
        missed = stats.missed,
        panicked = stats.panicked,
        lost = stats.lost,
        "run complete"
    );

    if !args.quiet {
        print_stats(&stats, &format!("{:?}", args.strategy));
    }

    Ok(())
}
