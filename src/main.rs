use bzip2::read::BzDecoder;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

mod error;
mod extract;
mod language;
mod parallel;
mod partition;
mod scanner;
mod wikitext;

use error::RunError;
use extract::Extractor;
use language::LanguageProfile;
use parallel::{process_page_pipeline, process_partitioned, ParallelConfig, Stats};
use scanner::Scanner;

/// Processing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Single linear scan of the whole dump
    Sequential,
    /// Boundary-aligned static partitions, one worker thread each
    Partitioned,
    /// Shared scanner feeding a bounded queue of page records
    PagePipeline,
}

#[derive(Parser)]
#[command(name = "wiktionary-dict-rust")]
#[command(about = "Fast Rust-based Wiktionary dump parser - outputs normalized dictionary entries")]
struct Args {
    /// Input dump file (.txt/.xml, or .bz2 archive)
    input: PathBuf,

    /// Output JSON file
    output: PathBuf,

    /// Wiktionary language code of the dump
    #[arg(short = 'l', long)]
    language_code: String,

    /// Language code of the terms to extract (defaults to the dump language)
    #[arg(short = 't', long)]
    target_language: Option<String>,

    /// Processing strategy
    #[arg(short, long, value_enum, default_value_t = Strategy::Sequential)]
    strategy: Strategy,

    /// Number of worker threads (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    workers: usize,

    /// Channel buffer size for the page-pipeline strategy
    #[arg(long, default_value_t = 10000)]
    channel_buffer: usize,

    /// Skip the counting pre-pass. Faster, but the progress bar has no ETA
    #[arg(short = 'n', long)]
    no_progress_bar: bool,

    /// Keep partition files and re-use them on the next run
    #[arg(long)]
    keep_partitions: bool,

    /// Directory for partition files (default: alongside the input)
    #[arg(long)]
    partition_dir: Option<PathBuf>,

    /// Limit number of entries to extract (for testing)
    #[arg(long)]
    limit: Option<usize>,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(&args) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), RunError> {
    // Configuration must resolve before any I/O starts
    let target = args.target_language.as_deref().unwrap_or(&args.language_code);
    let profile = language::profile_for(&args.language_code, target).ok_or_else(|| {
        RunError::UnknownLanguagePair {
            src_lang: args.language_code.clone(),
            target: target.to_string(),
            known: language::known_pairs(),
        }
    })?;

    if !args.input.is_file() {
        return Err(RunError::InputNotFound(args.input.clone()));
    }
    let input = maybe_decompress(&args.input, args.quiet)?;

    if !args.quiet {
        println!("Parsing: {}", input.display());
        println!("Output: {}", args.output.display());
        println!("Language pair: {}-{}", profile.source_code, profile.target_code);
        println!();
    }

    let total = if args.no_progress_bar || args.quiet {
        None
    } else {
        println!("Counting records. This can take a few minutes on a full dump...");
        let scanner = Scanner::open(&input, profile)?;
        let total = match args.strategy {
            Strategy::PagePipeline => scanner.count_pages(),
            _ => scanner.count_terms(),
        };
        println!("Done counting. Total records: {}", total);
        Some(total)
    };

    let progress = make_progress(total, args.quiet);
    let workers = if args.workers == 0 {
        ParallelConfig::default().num_workers
    } else {
        args.workers
    };

    let stats = match args.strategy {
        Strategy::Sequential => {
            process_sequential(&input, profile, &args.output, args.limit, &progress)?
        }
        Strategy::Partitioned => {
            let dir = args.partition_dir.clone().unwrap_or_else(|| {
                input
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."))
            });
            let partitions =
                partition::partition_dump(&input, &dir, workers, args.keep_partitions)?;
            let stats =
                process_partitioned(&partitions, profile, &args.output, args.limit, &progress)?;
            if !args.keep_partitions {
                partition::remove_partitions(&partitions);
            }
            stats
        }
        Strategy::PagePipeline => {
            let config = ParallelConfig {
                num_workers: workers,
                channel_buffer: args.channel_buffer,
            };
            process_page_pipeline(&input, profile, &args.output, &config, args.limit, &progress)?
        }
    };

    progress.finish_and_clear();
    if !args.quiet {
        print_stats(&stats, args.strategy);
    }
    Ok(())
}

/// Single-threaded linear pass: entries stream into the output array as the
/// scan advances, ids monotonic over the whole dump.
fn process_sequential(
    input: &Path,
    profile: &LanguageProfile,
    output: &Path,
    limit: Option<usize>,
    progress: &ProgressBar,
) -> Result<Stats, RunError> {
    let start = Instant::now();
    let scanner = Scanner::open(input, profile)?;
    let extractor = Extractor::new(profile);
    let mut writer = BufWriter::with_capacity(256 * 1024, File::create(output)?);
    let mut stats = Stats::default();

    writer.write_all(b"[")?;
    for (id, block) in scanner.term_blocks().enumerate() {
        stats.blocks_matched += 1;
        progress.inc(1);
        if stats.blocks_matched % 1000 == 0 {
            progress.set_message(format!(
                "Blocks: {} | Entries: {}",
                stats.blocks_matched, stats.entries_written
            ));
        }
        match extractor.entry_from_block(&block, id) {
            Some(entry) => {
                if stats.entries_written > 0 {
                    writer.write_all(b",")?;
                }
                serde_json::to_writer(&mut writer, &entry)?;
                stats.entries_written += 1;
                if limit.is_some_and(|limit| stats.entries_written >= limit) {
                    break;
                }
            }
            None => stats.dropped += 1,
        }
    }
    writer.write_all(b"]")?;
    writer.flush()?;

    stats.elapsed = start.elapsed();
    Ok(stats)
}

/// Dumps ship as .bz2 archives; scanning needs a seekable plain-text file,
/// so stream-decompress once into a working copy next to the input.
fn maybe_decompress(input: &Path, quiet: bool) -> Result<PathBuf, RunError> {
    if input.extension().and_then(|e| e.to_str()) != Some("bz2") {
        return Ok(input.to_path_buf());
    }
    let working = input.with_extension("");
    if working.is_file() {
        if !quiet {
            println!("Using existing decompressed copy: {}", working.display());
        }
        return Ok(working);
    }
    if !quiet {
        println!("Decompressing {} ...", input.display());
    }
    let mut decoder = BzDecoder::new(File::open(input)?);
    let mut writer = BufWriter::with_capacity(256 * 1024, File::create(&working)?);
    std::io::copy(&mut decoder, &mut writer)?;
    writer.flush()?;
    Ok(working)
}

fn make_progress(total: Option<usize>, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    match total {
        Some(total) => {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{wide_bar} {pos}/{len} ({eta})")
                    .unwrap(),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}").unwrap());
            pb
        }
    }
}

fn print_stats(stats: &Stats, strategy: Strategy) {
    let elapsed = stats.elapsed;
    println!();
    println!("============================================================");
    if stats.pages_scanned > 0 {
        println!("Pages scanned: {}", stats.pages_scanned);
    }
    println!("Term blocks matched: {}", stats.blocks_matched);
    println!("Entries written: {}", stats.entries_written);
    println!("Candidates dropped: {}", stats.dropped);
    println!("Time: {}m {}s", elapsed.as_secs() / 60, elapsed.as_secs() % 60);
    if elapsed.as_secs_f64() > 0.0 {
        println!(
            "Rate: {:.0} blocks/sec",
            stats.blocks_matched as f64 / elapsed.as_secs_f64()
        );
    }
    println!("Strategy: {:?}", strategy);
    println!("============================================================");
}
