//! Parallel processing strategies over JSONL entries.
//!
//! - Batch-parallel (std::thread on batches of lines)
//! - Channel-pipeline (reader, worker pool, in-order writer over mpsc channels)
//!
//! Entries are independent, so workers share nothing but a read-only
//! [`Extractor`]. Output order always matches input order.

use crate::pipeline::{panic_message, EntryReport, Extractor, ReportWriter, Stats};

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, warn};

/// Configuration for parallel processing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of threads to use
    pub num_threads: usize,
    /// Batch size for batch-parallel processing
    pub batch_size: usize,
    /// Channel buffer size for pipeline processing
    pub channel_buffer: usize,
    /// Number of worker threads for pipeline
    pub num_workers: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        let cpus = thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4);
        Self {
            num_threads: cpus,
            batch_size: 1000,
            channel_buffer: 10000,
            num_workers: cpus.saturating_sub(1).max(1),
        }
    }
}

/// Feed every non-blank line to `callback` with its index among non-blank
/// lines. Stops early when the callback returns `false`.
pub fn scan_entries(reader: impl BufRead, mut callback: impl FnMut(usize, String) -> bool) -> std::io::Result<()> {
    let mut index = 0;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if !callback(index, line) {
            break;
        }
        index += 1;
    }
    Ok(())
}

/// Strategy 1: Batch-Parallel Processing using std::thread
/// Collects lines into batches, then processes each batch on a set of threads
pub fn process_batch_parallel<W: Write>(
    reader: impl BufRead,
    extractor: Arc<Extractor>,
    writer: &mut ReportWriter<W>,
    config: &ParallelConfig,
) -> std::io::Result<Stats> {
    let start_time = Instant::now();
    let mut stats = Stats::default();
    let mut batch: Vec<(usize, String)> = Vec::with_capacity(config.batch_size);
    let mut write_error: Option<std::io::Error> = None;
    let mut limit_reached = false;

    let mut flush_batch = |batch: &mut Vec<(usize, String)>, stats: &mut Stats| -> std::io::Result<bool> {
        let (results, lost) = process_batch_threaded(std::mem::take(batch), &extractor, config.num_threads);
        stats.lost += lost;
        for report in results {
            if writer.write(report, stats)? {
                return Ok(true);
            }
        }
        Ok(false)
    };

    scan_entries(reader, |index, line| {
        batch.push((index, line));
        if batch.len() < config.batch_size {
            return true;
        }
        match flush_batch(&mut batch, &mut stats) {
            Ok(done) => {
                limit_reached = done;
                !done
            }
            Err(e) => {
                write_error = Some(e);
                false
            }
        }
    })?;

    if let Some(e) = write_error {
        return Err(e);
    }

    // Process remaining batch
    if !limit_reached && !batch.is_empty() {
        flush_batch(&mut batch, &mut stats)?;
    }

    stats.elapsed = start_time.elapsed();
    Ok(stats)
}

/// Process a batch of lines using multiple threads, results in input order.
/// Also returns how many entries were lost to a chunk thread that died.
fn process_batch_threaded(
    batch: Vec<(usize, String)>,
    extractor: &Arc<Extractor>,
    num_threads: usize,
) -> (Vec<EntryReport>, usize) {
    if batch.is_empty() {
        return (vec![], 0);
    }

    let total = batch.len();
    let num_threads = num_threads.min(total).max(1);
    let chunk_size = (total + num_threads - 1) / num_threads;

    let mut chunks: Vec<Vec<(usize, String)>> = Vec::with_capacity(num_threads);
    let mut lines = batch.into_iter().peekable();
    while lines.peek().is_some() {
        chunks.push(lines.by_ref().take(chunk_size).collect());
    }

    let handles: Vec<(usize, JoinHandle<Vec<EntryReport>>)> = chunks
        .into_iter()
        .map(|chunk| {
            let extractor = Arc::clone(extractor);
            let len = chunk.len();
            let handle = thread::spawn(move || {
                chunk
                    .into_iter()
                    .map(|(index, line)| extractor.process_line(index, &line))
                    .collect()
            });
            (len, handle)
        })
        .collect();

    collect_chunks(handles)
}

/// Join chunk threads in order. A chunk whose thread panicked counts all of
/// its entries as lost.
fn collect_chunks(handles: Vec<(usize, JoinHandle<Vec<EntryReport>>)>) -> (Vec<EntryReport>, usize) {
    let mut results = Vec::new();
    let mut lost = 0;
    for (len, handle) in handles {
        match handle.join() {
            Ok(chunk_results) => results.extend(chunk_results),
            Err(payload) => {
                warn!(entries = len, error = %panic_message(payload.as_ref()), "batch thread panicked");
                lost += len;
            }
        }
    }
    (results, lost)
}

/// Strategy 2: Channel-Pipeline Processing using std::sync::mpsc
/// Reader thread sends lines, worker threads process entries, the calling
/// thread writes results back in input order
pub fn process_channel_pipeline<W: Write>(
    reader: impl BufRead + Send + 'static,
    extractor: Arc<Extractor>,
    writer: &mut ReportWriter<W>,
    config: &ParallelConfig,
) -> std::io::Result<Stats> {
    let (line_tx, line_rx): (SyncSender<(usize, String)>, Receiver<(usize, String)>) =
        sync_channel(config.channel_buffer);
    let (result_tx, result_rx): (SyncSender<EntryReport>, Receiver<EntryReport>) =
        sync_channel(config.channel_buffer);

    let limit_reached = Arc::new(AtomicBool::new(false));
    let start_time = Instant::now();

    // Spawn reader thread
    let reader_limit_flag = Arc::clone(&limit_reached);
    let reader_handle = thread::spawn(move || read_entries_to_channel(reader, line_tx, &reader_limit_flag));

    // Spawn worker threads
    let line_rx = Arc::new(Mutex::new(line_rx));
    let worker_handles: Vec<JoinHandle<()>> = (0..config.num_workers)
        .map(|_| {
            let rx = Arc::clone(&line_rx);
            let tx = result_tx.clone();
            let extractor = Arc::clone(&extractor);
            let limit_flag = Arc::clone(&limit_reached);
            thread::spawn(move || process_entries_worker(rx, tx, &extractor, &limit_flag))
        })
        .collect();

    // Drop extra sender so channel closes when workers finish
    drop(result_tx);

    let mut stats = write_results_sorted(result_rx, writer, &limit_reached)?;

    // Unblock workers still sending after an early stop
    drop(line_rx);

    let sent = match reader_handle.join() {
        Ok(Ok(count)) => {
            debug!(entries = count, "reader finished");
            Some(count)
        }
        Ok(Err(e)) => return Err(e),
        Err(payload) => {
            warn!(error = %panic_message(payload.as_ref()), "reader thread panicked");
            None
        }
    };
    for handle in worker_handles {
        if let Err(payload) = handle.join() {
            warn!(error = %panic_message(payload.as_ref()), "worker thread panicked");
        }
    }

    // Entries handed to workers but never written
    if let Some(sent) = sent {
        if !limit_reached.load(Ordering::SeqCst) && sent > stats.entries_read {
            stats.lost = sent - stats.entries_read;
            warn!(entries = stats.lost, "entries lost in the worker pool");
        }
    }

    stats.elapsed = start_time.elapsed();
    Ok(stats)
}

fn read_entries_to_channel(
    reader: impl BufRead,
    tx: SyncSender<(usize, String)>,
    limit_reached: &AtomicBool,
) -> std::io::Result<usize> {
    let mut count = 0;
    scan_entries(reader, |index, line| {
        if limit_reached.load(Ordering::Relaxed) || tx.send((index, line)).is_err() {
            return false;
        }
        count += 1;
        true
    })?;
    Ok(count)
}

fn process_entries_worker(
    rx: Arc<Mutex<Receiver<(usize, String)>>>,
    tx: SyncSender<EntryReport>,
    extractor: &Extractor,
    limit_reached: &AtomicBool,
) {
    loop {
        if limit_reached.load(Ordering::Relaxed) {
            break;
        }

        // Try to get next line from shared receiver
        let item = {
            let lock = rx.lock().ok();
            lock.and_then(|guard| guard.recv().ok())
        };

        match item {
            Some((index, line)) => {
                if tx.send(extractor.process_line(index, &line)).is_err() {
                    break;
                }
            }
            None => break,
        }
    }
}

/// Write results in deterministic order using a streaming reorder buffer.
///
/// Out-of-order results wait in a BTreeMap until every earlier index has
/// been written.
fn write_results_sorted<W: Write>(
    rx: Receiver<EntryReport>,
    writer: &mut ReportWriter<W>,
    limit_reached: &AtomicBool,
) -> std::io::Result<Stats> {
    let mut stats = Stats::default();

    // Reorder buffer: holds results that arrived before their turn
    let mut pending: BTreeMap<usize, EntryReport> = BTreeMap::new();
    let mut next_expected: usize = 0;

    for report in rx {
        if report.index != next_expected {
            pending.insert(report.index, report);
            continue;
        }

        if writer.write(report, &mut stats)? {
            limit_reached.store(true, Ordering::SeqCst);
            return Ok(stats);
        }
        next_expected += 1;

        // Drain any buffered results that are now ready
        while let Some(buffered) = pending.remove(&next_expected) {
            if writer.write(buffered, &mut stats)? {
                limit_reached.store(true, Ordering::SeqCst);
                return Ok(stats);
            }
            next_expected += 1;
        }
    }

    // Anything left means a gap; write the rest in index order
    while let Some((_, report)) = pending.pop_first() {
        if writer.write(report, &mut stats)? {
            limit_reached.store(true, Ordering::SeqCst);
            return Ok(stats);
        }
    }

    Ok(stats)
}
