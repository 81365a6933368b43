//! Plain ASCII dense text files.
//!
//! One example per line: `y v1 v2 ... vd`, whitespace-separated, label
//! first. Loads in dense form; lines may have different lengths (missing
//! trailing features are zero).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{parse_label, DataError};
use crate::data::vector::FeatureVec;

/// Read an ASCII dense text file.
pub fn read_file(path: &Path) -> Result<(Vec<FeatureVec>, Vec<f64>), DataError> {
    let reader = BufReader::new(File::open(path)?);
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (line_idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = line_idx + 1;
        let mut tokens = line.split_whitespace();
        let Some(label_tok) = tokens.next() else {
            continue;
        };
        let y: f64 = label_tok.parse().map_err(|_| DataError::Parse {
            line: line_no,
            msg: format!("bad label {label_tok:?}"),
        })?;
        let y = parse_label(y, line_no)?;

        let values = tokens
            .map(|tok| {
                tok.parse().map_err(|_| DataError::Parse {
                    line: line_no,
                    msg: format!("bad feature value {tok:?}"),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        xs.push(FeatureVec::dense(values));
        ys.push(y);
    }
    Ok((xs, ys))
}
