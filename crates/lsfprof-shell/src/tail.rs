//! Bounded reads from the end of job log files.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use thiserror::Error;

const BLOCK_SIZE: u64 = 4096;

/// Bytes scanned per requested line before giving up on finding newlines.
const MAX_LINE_BYTES: u64 = 64 * 1024;

#[derive(Error, Debug)]
pub enum TailError {
    #[error("{0} does not exist")]
    NotFound(Utf8PathBuf),
    #[error("Failed to read {path}: {error}")]
    Io { path: Utf8PathBuf, error: io::Error },
}

impl TailError {
    fn from_io(path: &Utf8Path, error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::NotFound {
            TailError::NotFound(path.to_owned())
        } else {
            TailError::Io {
                path: path.to_owned(),
                error,
            }
        }
    }
}

/// Return the last `num_lines` lines of a file, without line terminators.
///
/// The file is read backwards block by block, stopping as soon as enough
/// complete lines have been seen or `num_lines * 64 KiB` have been read. In
/// the latter case the first returned line may be truncated.
pub fn tail_lines(path: &Utf8Path, num_lines: usize) -> Result<Vec<String>, TailError> {
    if num_lines == 0 {
        // still report a missing file
        std::fs::metadata(path).map_err(|e| TailError::from_io(path, e))?;
        return Ok(Vec::new());
    }

    let mut file = File::open(path).map_err(|e| TailError::from_io(path, e))?;
    let len = file
        .seek(SeekFrom::End(0))
        .map_err(|e| TailError::from_io(path, e))?;

    let mut buf: Vec<u8> = Vec::new();
    let mut pos = len;
    let max_bytes = (num_lines as u64).saturating_mul(MAX_LINE_BYTES);

    // A trailing newline terminates the last line rather than starting a new one,
    // so one more newline than requested lines marks a complete window.
    let trailing_newline = usize::from(len > 0 && last_byte(&mut file, len, path)? == b'\n');
    while pos > 0
        && len - pos < max_bytes
        && count_newlines(&buf) < num_lines + trailing_newline
    {
        let read_size = BLOCK_SIZE.min(pos);
        pos -= read_size;
        let mut block = vec![0u8; read_size as usize];
        file.seek(SeekFrom::Start(pos))
            .and_then(|_| file.read_exact(&mut block))
            .map_err(|e| TailError::from_io(path, e))?;
        block.extend_from_slice(&buf);
        buf = block;
    }

    let mut window: &[u8] = &buf;
    if pos > 0 {
        // drop the partial line at the start of the window
        if let Some(first_newline) = window.iter().position(|b| *b == b'\n') {
            window = &window[first_newline + 1..];
        }
    }

    let text = String::from_utf8_lossy(window);
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(num_lines);
    Ok(lines[skip..].iter().map(|l| l.to_string()).collect())
}

fn last_byte(file: &mut File, len: u64, path: &Utf8Path) -> Result<u8, TailError> {
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))
        .and_then(|_| file.read_exact(&mut byte))
        .map_err(|e| TailError::from_io(path, e))?;
    Ok(byte[0])
}

fn count_newlines(buf: &[u8]) -> usize {
    buf.iter().filter(|b| **b == b'\n').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_log(dir: &TempDir, content: &str) -> Utf8PathBuf {
        let path = Utf8Path::from_path(dir.path()).unwrap().join("tail.txt");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_tail_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = write_log(&temp, "");
        assert!(tail_lines(&path, 30).unwrap().is_empty());
    }

    #[test]
    fn test_tail_missing_file() {
        let path = Utf8Path::new("/nonexistent/dir/foo.bar");
        let err = tail_lines(path, 30).unwrap_err();
        assert!(matches!(err, TailError::NotFound(_)));
        assert_eq!(err.to_string(), "/nonexistent/dir/foo.bar does not exist");
    }

    #[test]
    fn test_tail_one_line() {
        let temp = TempDir::new().unwrap();
        let path = write_log(&temp, "one line\n");
        assert_eq!(tail_lines(&path, 30).unwrap(), vec!["one line"]);
    }

    #[test]
    fn test_tail_more_lines_than_requested() {
        let temp = TempDir::new().unwrap();
        let path = write_log(&temp, "one line\nsecond line\nthird line\n");
        assert_eq!(
            tail_lines(&path, 2).unwrap(),
            vec!["second line", "third line"]
        );
    }

    #[test]
    fn test_tail_without_trailing_newline() {
        let temp = TempDir::new().unwrap();
        let path = write_log(&temp, "a\nb\nc");
        assert_eq!(tail_lines(&path, 2).unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn test_tail_spans_multiple_blocks() {
        let temp = TempDir::new().unwrap();
        let content: String = (0..2000).map(|i| format!("line number {}\n", i)).collect();
        let path = write_log(&temp, &content);

        let tail = tail_lines(&path, 30).unwrap();
        assert_eq!(tail.len(), 30);
        assert_eq!(tail[0], "line number 1970");
        assert_eq!(tail[29], "line number 1999");
    }

    #[test]
    fn test_tail_long_last_line() {
        let temp = TempDir::new().unwrap();
        let long = "x".repeat(10_000);
        let path = write_log(&temp, &format!("first\n{}\n", long));
        assert_eq!(tail_lines(&path, 1).unwrap(), vec![long]);
    }

    #[test]
    fn test_tail_without_newlines_is_bounded() {
        let temp = TempDir::new().unwrap();
        let path = write_log(&temp, &"x".repeat(200 * 1024));

        let tail = tail_lines(&path, 1).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].len() as u64, MAX_LINE_BYTES);
    }

    #[test]
    fn test_io_errors_other_than_not_found() {
        let path = Utf8Path::new("logs/job.out");
        let missing = TailError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(missing, TailError::NotFound(_)));

        let denied = TailError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, TailError::Io { .. }));
        assert!(denied.to_string().starts_with("Failed to read logs/job.out"));
    }

    #[test]
    fn test_tail_zero_lines() {
        let temp = TempDir::new().unwrap();
        let path = write_log(&temp, "a\nb\n");
        assert!(tail_lines(&path, 0).unwrap().is_empty());
    }
}
