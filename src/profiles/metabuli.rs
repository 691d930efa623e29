//src/profiles/metabuli.rs

use super::{field, numeric_field, Delimiter, ProfileParser};
use crate::error::Result;
use crate::types::{ClassificationRecord, TaxId};

/// Metabuli per-read classifications:
/// ```text
/// 1	read_1	562	150	0.95	species	562:40
/// ```
/// Older releases omit the trailing match-count column.
pub struct MetabuliReads;

const COLUMNS: &[&str] = &[
    "status",
    "read_id",
    "taxid",
    "read_len",
    "dna_identity",
    "rank",
    "match_count",
];

impl ProfileParser for MetabuliReads {
    fn name(&self) -> &'static str {
        "metabuli reads"
    }

    fn delimiter(&self) -> Delimiter {
        Delimiter::Tab
    }

    fn columns(&self) -> &'static [&'static str] {
        COLUMNS
    }

    fn min_columns(&self) -> usize {
        COLUMNS.len() - 1
    }

    fn parse_line(&self, line: &str, line_num: usize) -> Result<Option<ClassificationRecord>> {
        let fields = self.split_checked(line, line_num)?;

        let status: u8 = numeric_field(&fields, 0, "status", line, line_num)?;
        let read_id = field(&fields, 1, "read_id", line, line_num)?;
        let taxid: TaxId = numeric_field(&fields, 2, "taxid", line, line_num)?;
        let read_len: u64 = numeric_field(&fields, 3, "read_len", line, line_num)?;
        let identity: f64 = numeric_field(&fields, 4, "dna_identity", line, line_num)?;
        let rank = field(&fields, 5, "rank", line, line_num)?;

        let mut record = ClassificationRecord::read(read_id.trim(), taxid);
        record.rank = Some(rank.trim().to_string());
        record.extras.status = Some(status.to_string());
        record.extras.read_len = Some(read_len);
        record.extras.identity = Some(identity);
        record.extras.match_count = fields.get(6).map(|m| m.trim().to_string());
        Ok(Some(record))
    }
}
