//! Dataset file I/O.
//!
//! Three on-disk formats are supported:
//!
//! - binary sparse/dense ([`binary`]), distinguished by a one-byte header;
//!   the sparse form is the one the training pipeline is built around
//! - svmlight-like text ([`svmlight`]): `y idx:v idx:v ...`, 1-based
//!   indices on disk
//! - plain ASCII dense text ([`ascii`]): `y v v v ...`
//!
//! [`read_dataset`] sniffs the format from the file's first bytes.

pub mod ascii;
pub mod binary;
pub mod svmlight;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::dataset::Dataset;

/// Errors from the dataset loaders and writers.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unrecognized file header byte {0:#04x}")]
    BadHeader(u8),

    #[error("unexpected end of file in record {record}")]
    Truncated { record: usize },

    #[error("parse error on line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error("label {0} outside the {{-1, +1}} domain")]
    LabelDomain(f64),

    #[error("duplicate feature index {idx} in record {record}")]
    DuplicateIndex { record: usize, idx: usize },

    #[error("{n_examples} examples but {n_labels} labels")]
    ShapeMismatch { n_examples: usize, n_labels: usize },
}

/// The on-disk format of a dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    BinaryDense,
    BinarySparse,
    Svmlight,
    Ascii,
}

/// Sniff the format from the first bytes of `path`.
///
/// Binary files carry a `0x01`/`0x02` header byte; text files are
/// svmlight-like when the first line contains a `:` separator, plain ASCII
/// otherwise.
pub fn detect_format(path: &Path) -> Result<FileFormat, DataError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut head = [0u8; 256];
    let got = read_up_to(&mut reader, &mut head)?;
    let head = &head[..got];
    match head.first() {
        Some(&binary::HEADER_DENSE) => Ok(FileFormat::BinaryDense),
        Some(&binary::HEADER_SPARSE) => Ok(FileFormat::BinarySparse),
        _ => {
            let first_line = head.split(|&b| b == b'\n').next().unwrap_or(head);
            if first_line.contains(&b':') {
                Ok(FileFormat::Svmlight)
            } else {
                Ok(FileFormat::Ascii)
            }
        }
    }
}

/// Read a dataset from `path`, sniffing the format.
pub fn read_dataset(path: &Path) -> Result<Dataset, DataError> {
    let (xs, ys) = match detect_format(path)? {
        FileFormat::BinaryDense | FileFormat::BinarySparse => binary::read_file(path)?,
        FileFormat::Svmlight => svmlight::read_file(path)?,
        FileFormat::Ascii => ascii::read_file(path)?,
    };
    Dataset::new(xs, ys)
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn parse_label(y: f64, line: usize) -> Result<f64, DataError> {
    // 0 is accepted as an alias for the negative class.
    if y == 0.0 || y == -1.0 {
        Ok(-1.0)
    } else if y == 1.0 {
        Ok(1.0)
    } else {
        Err(DataError::Parse {
            line,
            msg: format!("label {y} outside {{0, -1, +1}}"),
        })
    }
}
