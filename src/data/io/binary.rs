//! Binary dense/sparse feature files.
//!
//! Layout (little-endian throughout):
//!
//! ```text
//! sparse: [0x02] ([class i8] [num_features u32] ([idx u32] [value f64])*)*
//! dense:  [0x01] [num_features u32] ([class i8] [value f64]{num_features})*
//! ```
//!
//! Feature indices are 0-based; `class ∈ {-1, +1}` stored as `i8`.
//! Records run until EOF.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::DataError;
use crate::data::vector::FeatureVec;

pub const HEADER_DENSE: u8 = 0x01;
pub const HEADER_SPARSE: u8 = 0x02;

/// Read a binary feature file (either form, selected by the header byte).
pub fn read_file(path: &Path) -> Result<(Vec<FeatureVec>, Vec<f64>), DataError> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = read_u8(&mut reader, 0)?.ok_or(DataError::Truncated { record: 0 })?;
    match header {
        HEADER_SPARSE => read_sparse_records(&mut reader),
        HEADER_DENSE => read_dense_records(&mut reader),
        other => Err(DataError::BadHeader(other)),
    }
}

fn read_sparse_records(reader: &mut impl Read) -> Result<(Vec<FeatureVec>, Vec<f64>), DataError> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    loop {
        let record = xs.len() + 1;
        let Some(class) = read_u8(reader, record)? else {
            break;
        };
        let y = class_to_label(class as i8)?;
        let num_features = read_u32(reader, record)?;
        let mut entries = Vec::with_capacity(num_features as usize);
        for _ in 0..num_features {
            let idx = read_u32(reader, record)? as usize;
            let value = read_f64(reader, record)?;
            entries.push((idx, value));
        }
        entries.sort_unstable_by_key(|&(i, _)| i);
        if let Some(w) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(DataError::DuplicateIndex {
                record,
                idx: w[0].0,
            });
        }
        xs.push(FeatureVec::sparse(entries));
        ys.push(y);
    }
    Ok((xs, ys))
}

fn read_dense_records(reader: &mut impl Read) -> Result<(Vec<FeatureVec>, Vec<f64>), DataError> {
    let num_features = read_u32(reader, 0)? as usize;
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    loop {
        let record = xs.len() + 1;
        let Some(class) = read_u8(reader, record)? else {
            break;
        };
        let y = class_to_label(class as i8)?;
        let mut values = Vec::with_capacity(num_features);
        for _ in 0..num_features {
            values.push(read_f64(reader, record)?);
        }
        xs.push(FeatureVec::dense(values));
        ys.push(y);
    }
    Ok((xs, ys))
}

/// Write examples in the sparse binary form.
pub fn write_sparse_file(
    path: &Path,
    xs: &[FeatureVec],
    ys: &[f64],
) -> Result<(), DataError> {
    check_shape(xs, ys)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&[HEADER_SPARSE])?;
    for (x, &y) in xs.iter().zip(ys) {
        writer.write_all(&[label_to_class(y)? as u8])?;
        writer.write_all(&(x.nnz() as u32).to_le_bytes())?;
        for (idx, value) in x.iter_nonzero() {
            writer.write_all(&(idx as u32).to_le_bytes())?;
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write examples in the dense binary form.
///
/// Every example must be dense with the same length.
pub fn write_dense_file(path: &Path, xs: &[FeatureVec], ys: &[f64]) -> Result<(), DataError> {
    check_shape(xs, ys)?;
    let num_features = xs.first().map_or(0, FeatureVec::dim);
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&[HEADER_DENSE])?;
    writer.write_all(&(num_features as u32).to_le_bytes())?;
    for (x, &y) in xs.iter().zip(ys) {
        let FeatureVec::Dense(values) = x else {
            panic!("dense binary writer needs dense vectors");
        };
        assert_eq!(values.len(), num_features, "ragged dense example");
        writer.write_all(&[label_to_class(y)? as u8])?;
        for value in values {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn check_shape(xs: &[FeatureVec], ys: &[f64]) -> Result<(), DataError> {
    if xs.len() != ys.len() {
        return Err(DataError::ShapeMismatch {
            n_examples: xs.len(),
            n_labels: ys.len(),
        });
    }
    Ok(())
}

fn class_to_label(class: i8) -> Result<f64, DataError> {
    match class {
        -1 | 1 => Ok(class as f64),
        other => Err(DataError::LabelDomain(other as f64)),
    }
}

fn label_to_class(y: f64) -> Result<i8, DataError> {
    if y == -1.0 {
        Ok(-1)
    } else if y == 1.0 {
        Ok(1)
    } else {
        Err(DataError::LabelDomain(y))
    }
}

/// Read one byte, returning `None` on a clean EOF at a record boundary.
fn read_u8(reader: &mut impl Read, record: usize) -> Result<Option<u8>, DataError> {
    let mut buf = [0u8; 1];
    match reader.read(&mut buf)? {
        0 => Ok(None),
        1 => Ok(Some(buf[0])),
        _ => Err(DataError::Truncated { record }),
    }
}

fn read_u32(reader: &mut impl Read, record: usize) -> Result<u32, DataError> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|_| DataError::Truncated { record })?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f64(reader: &mut impl Read, record: usize) -> Result<f64, DataError> {
    let mut buf = [0u8; 8];
    reader
        .read_exact(&mut buf)
        .map_err(|_| DataError::Truncated { record })?;
    Ok(f64::from_le_bytes(buf))
}
