//! Source record reader
//!
//! Reads `startIP|endIP|region` text, one record per line. Blank lines and
//! lines starting with `#` are skipped. Paths ending in `.gz` are
//! decompressed transparently and `-` reads stdin.
//!
//! ```rust,no_run
//! use ipregion::source;
//!
//! for segment in source::SourceReader::new(source::open("ip.merge.txt.gz")?) {
//!     let segment = segment?;
//!     println!("{}", segment);
//! }
//! # Ok::<(), ipregion::RegionError>(())
//! ```

use crate::error::{RegionError, Result};
use crate::segment::Segment;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{stdin, BufRead, BufReader};
use std::path::Path;

/// Buffer size for source reading
const BUFFER_SIZE: usize = 128 * 1024;

/// Open a source file, decompressing `.gz` and mapping `-` to stdin
pub fn open<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();

    if path.to_str() == Some("-") {
        return Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, stdin())));
    }

    let file = File::open(path)
        .map_err(|e| RegionError::Io(format!("failed to open {}: {}", path.display(), e)))?;

    let is_gzip = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    if is_gzip {
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, file)))
    }
}

/// Parse a comma-separated list of 0-based region field indexes, e.g. `0,2,3,4`
pub fn parse_field_list(text: &str) -> Result<Vec<usize>> {
    let fields = text
        .split(',')
        .map(|part| {
            part.trim().parse::<usize>().map_err(|_| {
                RegionError::malformed(format!("invalid field index '{}' in '{}'", part, text))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut seen = fields.clone();
    seen.sort_unstable();
    seen.dedup();
    if seen.len() != fields.len() {
        return Err(RegionError::malformed(format!("duplicate field index in '{}'", text)));
    }
    Ok(fields)
}

/// Iterator over the segments of a source, with 1-based line numbers on errors
pub struct SourceReader<R> {
    reader: R,
    line_no: usize,
    buf: String,
    field_list: Option<Vec<usize>>,
}

impl<R: BufRead> SourceReader<R> {
    /// Wrap a buffered reader
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
            field_list: None,
        }
    }

    /// Keep only the listed region fields of every record
    pub fn with_field_list(mut self, fields: Vec<usize>) -> Self {
        self.field_list = Some(fields);
        self
    }

    /// Line number of the most recently read line
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    fn parse_line(&self, line: &str) -> Result<Segment> {
        let segment = Segment::parse(line)?;
        match &self.field_list {
            Some(fields) => segment.with_fields(fields),
            None => Ok(segment),
        }
    }
}

impl<R: BufRead> Iterator for SourceReader<R> {
    type Item = Result<Segment>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line_no += 1,
                Err(e) => {
                    return Some(Err(RegionError::Io(format!(
                        "read error after line {}: {}",
                        self.line_no, e
                    ))))
                }
            }

            let line = self.buf.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line_no = self.line_no;
            return Some(self.parse_line(line).map_err(|e| e.at_line(line_no)));
        }
    }
}

/// Read every segment of a source file into memory
pub fn read_segments<P: AsRef<Path>>(path: P, field_list: Option<&[usize]>) -> Result<Vec<Segment>> {
    let mut reader = SourceReader::new(open(path)?);
    if let Some(fields) = field_list {
        reader = reader.with_field_list(fields.to_vec());
    }
    reader.collect()
}
