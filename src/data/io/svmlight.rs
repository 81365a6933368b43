//! Svmlight-like text files.
//!
//! One example per line: `y idx1:v1 idx2:v2 ...`. Feature indices are
//! 1-based on disk and become 0-based in memory. Labels `{0, -1, +1}` are
//! accepted, with 0 treated as the negative class.
//!
//! This is not a full svmlight parser: comments, query ids, and per-line
//! cost factors are not supported.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{parse_label, DataError};
use crate::data::vector::FeatureVec;

/// Read an svmlight-like text file in sparse form.
pub fn read_file(path: &Path) -> Result<(Vec<FeatureVec>, Vec<f64>), DataError> {
    let reader = BufReader::new(File::open(path)?);
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (line_idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = line_idx + 1;
        let mut tokens = line.split_whitespace();
        let Some(label_tok) = tokens.next() else {
            continue; // blank line
        };
        let y: f64 = label_tok.parse().map_err(|_| DataError::Parse {
            line: line_no,
            msg: format!("bad label {label_tok:?}"),
        })?;
        let y = parse_label(y, line_no)?;

        let mut entries = Vec::new();
        for token in tokens {
            let (idx_tok, value_tok) = token.split_once(':').ok_or_else(|| DataError::Parse {
                line: line_no,
                msg: format!("expected idx:value, got {token:?}"),
            })?;
            let idx: usize = idx_tok.parse().map_err(|_| DataError::Parse {
                line: line_no,
                msg: format!("bad feature index {idx_tok:?}"),
            })?;
            if idx == 0 {
                return Err(DataError::Parse {
                    line: line_no,
                    msg: "feature indices are 1-based".into(),
                });
            }
            let value: f64 = value_tok.parse().map_err(|_| DataError::Parse {
                line: line_no,
                msg: format!("bad feature value {value_tok:?}"),
            })?;
            entries.push((idx - 1, value));
        }
        entries.sort_unstable_by_key(|&(i, _)| i);
        if let Some(w) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(DataError::DuplicateIndex {
                record: line_no,
                idx: w[0].0,
            });
        }
        xs.push(FeatureVec::sparse(entries));
        ys.push(y);
    }
    Ok((xs, ys))
}
