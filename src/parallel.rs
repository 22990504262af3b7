//! Parallel execution strategies for dump processing.
//!
//! Two shapes, both record-exact:
//! - Partitioned: one worker thread per boundary-aligned partition, no
//!   shared mutable state, per-worker JSONL fragment files, single-threaded
//!   merge after a full join barrier.
//! - Page pipeline: a reader thread feeds `<page>` records into a bounded
//!   channel, worker threads extract entries, and the calling thread
//!   streams the JSON array while assigning ids.

use indicatif::ProgressBar;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::sync_channel;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::RunError;
use crate::extract::{DictionaryEntry, Extractor};
use crate::language::LanguageProfile;
use crate::partition::Partition;
use crate::scanner::{RawPage, Scanner};

/// Configuration for parallel processing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of worker threads
    pub num_workers: usize,
    /// Channel buffer size for the page pipeline
    pub channel_buffer: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        let cpus = thread::available_parallelism().map(|p| p.get()).unwrap_or(4);
        Self {
            num_workers: cpus,
            channel_buffer: 10_000,
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Default)]
pub struct Stats {
    /// Pages scanned (page-pipeline strategy only)
    pub pages_scanned: usize,
    /// Term blocks the scan pattern matched
    pub blocks_matched: usize,
    /// Entries present in the output file
    pub entries_written: usize,
    /// Candidate records dropped (language mismatch, no title, no defs)
    pub dropped: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct WorkerReport {
    blocks_matched: usize,
    entries_written: usize,
    dropped: usize,
}

impl Stats {
    fn absorb(&mut self, report: &WorkerReport) {
        self.blocks_matched += report.blocks_matched;
        self.entries_written += report.entries_written;
        self.dropped += report.dropped;
    }
}

/// Run one scanner+extractor per partition, then merge the per-worker
/// fragments into a single JSON array. Entry ids are partition-local.
pub fn process_partitioned(
    partitions: &[Partition],
    profile: &'static LanguageProfile,
    output: &Path,
    limit: Option<usize>,
    progress: &ProgressBar,
) -> Result<Stats, RunError> {
    let start = Instant::now();
    let tick = Arc::new(AtomicUsize::new(0));

    let mut fragments: Vec<PathBuf> = Vec::with_capacity(partitions.len());
    let mut handles: Vec<JoinHandle<Result<WorkerReport, RunError>>> =
        Vec::with_capacity(partitions.len());

    for partition in partitions {
        let fragment = fragment_path(output, partition.index);
        fragments.push(fragment.clone());
        let partition_path = partition.path.clone();
        let tick = Arc::clone(&tick);
        handles.push(thread::spawn(move || {
            process_partition(&partition_path, profile, &fragment, &tick)
        }));
    }

    // Advisory progress only; the barrier below is what matters
    while !handles.iter().all(|handle| handle.is_finished()) {
        progress.set_position(tick.load(Ordering::Relaxed) as u64);
        thread::sleep(Duration::from_millis(100));
    }
    progress.set_position(tick.load(Ordering::Relaxed) as u64);

    let mut stats = Stats::default();
    for handle in handles {
        let report = handle.join().map_err(|_| RunError::WorkerPanic)??;
        stats.absorb(&report);
    }

    stats.entries_written = merge_fragments(output, &fragments, limit)?;
    for fragment in &fragments {
        fs::remove_file(fragment).ok();
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}

fn process_partition(
    partition: &Path,
    profile: &LanguageProfile,
    fragment: &Path,
    tick: &AtomicUsize,
) -> Result<WorkerReport, RunError> {
    let scanner = Scanner::open(partition, profile)?;
    let extractor = Extractor::new(profile);
    let mut writer = BufWriter::with_capacity(256 * 1024, File::create(fragment)?);
    let mut report = WorkerReport::default();

    for (local_id, block) in scanner.term_blocks().enumerate() {
        report.blocks_matched += 1;
        tick.fetch_add(1, Ordering::Relaxed);
        match extractor.entry_from_block(&block, local_id) {
            Some(entry) => {
                serde_json::to_writer(&mut writer, &entry)?;
                writer.write_all(b"\n")?;
                report.entries_written += 1;
            }
            None => report.dropped += 1,
        }
    }
    writer.flush()?;
    Ok(report)
}

/// Concatenate JSONL fragments into one JSON array, in fragment index
/// order. Valid for zero, one, and many entries: no dangling separators.
pub(crate) fn merge_fragments(
    output: &Path,
    fragments: &[PathBuf],
    limit: Option<usize>,
) -> Result<usize, RunError> {
    let mut writer = BufWriter::with_capacity(256 * 1024, File::create(output)?);
    writer.write_all(b"[")?;
    let mut written = 0usize;
    'merge: for fragment in fragments {
        let reader = BufReader::with_capacity(256 * 1024, File::open(fragment)?);
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            if written > 0 {
                writer.write_all(b",")?;
            }
            writer.write_all(line.as_bytes())?;
            written += 1;
            if limit.is_some_and(|limit| written >= limit) {
                break 'merge;
            }
        }
    }
    writer.write_all(b"]")?;
    writer.flush()?;
    Ok(written)
}

fn fragment_path(output: &Path, index: usize) -> PathBuf {
    output.with_extension(format!("frag{:03}.jsonl", index))
}

/// Reader thread scans pages into a bounded channel, workers extract,
/// the calling thread writes the array and assigns monotonic ids.
pub fn process_page_pipeline(
    input: &Path,
    profile: &'static LanguageProfile,
    output: &Path,
    config: &ParallelConfig,
    limit: Option<usize>,
    progress: &ProgressBar,
) -> Result<Stats, RunError> {
    let start = Instant::now();
    let (page_tx, page_rx) = sync_channel::<RawPage>(config.channel_buffer);
    let (result_tx, result_rx) = sync_channel::<Vec<DictionaryEntry>>(config.channel_buffer);
    let stop = Arc::new(AtomicBool::new(false));

    let reader_stop = Arc::clone(&stop);
    let reader_input = input.to_path_buf();
    let reader: JoinHandle<Result<usize, RunError>> = thread::spawn(move || {
        let scanner = Scanner::open(&reader_input, profile)?;
        let mut sent = 0usize;
        for page in scanner.pages() {
            if reader_stop.load(Ordering::Relaxed) {
                break;
            }
            if page_tx.send(page).is_err() {
                break;
            }
            sent += 1;
        }
        Ok(sent)
    });

    let page_rx = Arc::new(Mutex::new(page_rx));
    let workers: Vec<JoinHandle<()>> = (0..config.num_workers.max(1))
        .map(|_| {
            let rx = Arc::clone(&page_rx);
            let tx = result_tx.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let extractor = Extractor::new(profile);
                loop {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let page = { rx.lock().ok().and_then(|guard| guard.recv().ok()) };
                    match page {
                        Some(page) => {
                            if tx.send(extractor.entries_from_page(&page)).is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            })
        })
        .collect();
    // Channel closes once the last worker drops its sender
    drop(result_tx);

    let mut writer = BufWriter::with_capacity(256 * 1024, File::create(output)?);
    writer.write_all(b"[")?;
    let mut stats = Stats::default();
    let mut next_id = 0usize;

    while let Ok(entries) = result_rx.recv() {
        stats.pages_scanned += 1;
        progress.inc(1);
        if entries.is_empty() {
            stats.dropped += 1;
            continue;
        }
        stats.blocks_matched += entries.len();
        for mut entry in entries {
            entry.id = next_id;
            if next_id > 0 {
                writer.write_all(b",")?;
            }
            serde_json::to_writer(&mut writer, &entry)?;
            next_id += 1;
        }
        if limit.is_some_and(|limit| next_id >= limit) {
            stop.store(true, Ordering::SeqCst);
            break;
        }
    }
    // Unblocks any worker parked on a full result channel
    drop(result_rx);

    writer.write_all(b"]")?;
    writer.flush()?;
    stats.entries_written = next_id;

    for worker in workers {
        worker.join().map_err(|_| RunError::WorkerPanic)?;
    }
    match reader.join().map_err(|_| RunError::WorkerPanic)? {
        Ok(_) => {}
        // A reader error after an early stop is expected teardown noise
        Err(err) if !stop.load(Ordering::Relaxed) => return Err(err),
        Err(_) => {}
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}
