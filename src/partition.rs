//! Boundary-aligned partitioning of a dump file.
//!
//! Records in the dump are runs of consecutive non-blank lines separated by
//! blank lines, so a partition boundary may only fall on a blank line:
//! concatenating the partitions in index order reproduces the input
//! byte-for-byte and no record is ever split between two workers. A
//! pathological record with no blank line in reach extends the current
//! partition past its target size instead of being bisected.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::RunError;

/// One contiguous, boundary-aligned slice of the dump.
#[derive(Debug, Clone)]
pub struct Partition {
    pub index: usize,
    pub path: PathBuf,
}

/// Split `input` into `count` partition files inside `dir`.
///
/// With `reuse` set and every expected partition file already present, the
/// existing files are trusted as-is and the split is skipped entirely.
pub fn partition_dump(
    input: &Path,
    dir: &Path,
    count: usize,
    reuse: bool,
) -> Result<Vec<Partition>, RunError> {
    let count = count.max(1);
    let paths: Vec<PathBuf> = (0..count).map(|i| partition_path(input, dir, i)).collect();

    if reuse && paths.iter().all(|p| p.is_file()) {
        return Ok(collect(paths));
    }

    let total_lines = count_lines(input)?;
    let target = (total_lines + count - 1) / count;

    let mut reader = BufReader::with_capacity(256 * 1024, File::open(input)?);
    let mut writer = BufWriter::with_capacity(256 * 1024, File::create(&paths[0])?);
    let mut index = 0usize;
    let mut written = 0usize;
    let mut line: Vec<u8> = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        writer.write_all(&line)?;
        written += 1;
        // Only cross into the next file on a blank line, even when that
        // leaves the current partition larger than its target.
        if written >= target && index + 1 < count && is_blank(&line) {
            writer.flush()?;
            index += 1;
            written = 0;
            writer = BufWriter::with_capacity(256 * 1024, File::create(&paths[index])?);
        }
    }
    writer.flush()?;

    // A dump smaller than expected leaves the trailing partitions empty
    for path in &paths[index + 1..] {
        File::create(path)?;
    }

    Ok(collect(paths))
}

/// Best-effort cleanup after a successful merge.
pub fn remove_partitions(partitions: &[Partition]) {
    for partition in partitions {
        fs::remove_file(&partition.path).ok();
    }
}

fn collect(paths: Vec<PathBuf>) -> Vec<Partition> {
    paths
        .into_iter()
        .enumerate()
        .map(|(index, path)| Partition { index, path })
        .collect()
}

fn partition_path(input: &Path, dir: &Path, index: usize) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("dump");
    dir.join(format!("{}.part{:03}", stem, index))
}

/// Count line terminators in one streaming pass; the file is never held in
/// memory.
fn count_lines(path: &Path) -> std::io::Result<usize> {
    let mut reader = BufReader::with_capacity(256 * 1024, File::open(path)?);
    let mut chunk = vec![0u8; 1024 * 1024];
    let mut lines = 0usize;
    let mut last = b'\n';
    loop {
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        lines += chunk[..read].iter().filter(|&&b| b == b'\n').count();
        last = chunk[read - 1];
    }
    // An unterminated final line still counts
    if last != b'\n' {
        lines += 1;
    }
    Ok(lines)
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_dump(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("dump.txt");
        fs::write(&path, content).unwrap();
        path
    }

    fn read_concat(partitions: &[Partition]) -> Vec<u8> {
        let mut all = Vec::new();
        for partition in partitions {
            all.extend(fs::read(&partition.path).unwrap());
        }
        all
    }

    fn record(lines: usize, tag: &str) -> String {
        let mut record = String::new();
        for i in 0..lines {
            record.push_str(&format!("{} line {}\n", tag, i));
        }
        record.push('\n');
        record
    }

    #[test]
    fn concatenation_is_lossless() {
        let dir = TempDir::new().unwrap();
        let mut content = String::new();
        for i in 0..12 {
            content.push_str(&record(4, &format!("record{}", i)));
        }
        let input = write_dump(&dir, &content);
        let partitions = partition_dump(&input, dir.path(), 3, false).unwrap();
        assert_eq!(partitions.len(), 3);
        assert_eq!(read_concat(&partitions), content.as_bytes());
    }

    #[test]
    fn boundaries_fall_on_blank_lines() {
        let dir = TempDir::new().unwrap();
        let mut content = String::new();
        for i in 0..10 {
            content.push_str(&record(5, &format!("record{}", i)));
        }
        let input = write_dump(&dir, &content);
        let partitions = partition_dump(&input, dir.path(), 4, false).unwrap();
        for pair in partitions.windows(2) {
            let next = fs::read(&pair[1].path).unwrap();
            if next.is_empty() {
                continue;
            }
            let current = fs::read(&pair[0].path).unwrap();
            // The last line before every boundary is blank
            assert!(current.ends_with(b"\n\n"), "partition {} does not end on a blank line", pair[0].index);
            // And the next partition starts a fresh record
            assert_ne!(next[0], b'\n');
        }
    }

    #[test]
    fn giant_record_extends_partition_instead_of_splitting() {
        let dir = TempDir::new().unwrap();
        let mut content = record(40, "giant");
        content.push_str(&record(2, "tail0"));
        content.push_str(&record(2, "tail1"));
        let input = write_dump(&dir, &content);
        let partitions = partition_dump(&input, dir.path(), 4, false).unwrap();
        assert_eq!(read_concat(&partitions), content.as_bytes());
        // The giant record lands whole in partition 0
        let first = fs::read_to_string(&partitions[0].path).unwrap();
        assert!(first.contains("giant line 0"));
        assert!(first.contains("giant line 39"));
    }

    #[test]
    fn reuse_skips_repartitioning() {
        let dir = TempDir::new().unwrap();
        let content = record(3, "a") + &record(3, "b");
        let input = write_dump(&dir, &content);
        let partitions = partition_dump(&input, dir.path(), 2, false).unwrap();
        fs::write(&partitions[0].path, "sentinel\n").unwrap();

        let reused = partition_dump(&input, dir.path(), 2, true).unwrap();
        assert_eq!(fs::read_to_string(&reused[0].path).unwrap(), "sentinel\n");

        let rebuilt = partition_dump(&input, dir.path(), 2, false).unwrap();
        assert_eq!(read_concat(&rebuilt), content.as_bytes());
    }

    #[test]
    fn empty_input_yields_empty_partitions() {
        let dir = TempDir::new().unwrap();
        let input = write_dump(&dir, "");
        let partitions = partition_dump(&input, dir.path(), 3, false).unwrap();
        assert_eq!(partitions.len(), 3);
        assert!(read_concat(&partitions).is_empty());
    }

    #[test]
    fn unterminated_final_line_is_preserved() {
        let dir = TempDir::new().unwrap();
        let content = format!("{}tail without newline", record(3, "a"));
        let input = write_dump(&dir, &content);
        let partitions = partition_dump(&input, dir.path(), 2, false).unwrap();
        assert_eq!(read_concat(&partitions), content.as_bytes());
    }
}
