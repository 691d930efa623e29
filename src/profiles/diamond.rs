//src/profiles/diamond.rs

use super::{numeric_field, Delimiter, ProfileParser};
use crate::error::Result;
use crate::types::{ClassificationRecord, TaxId};

/// DIAMOND taxonomic classification output (`--outfmt 102`):
/// ```text
/// read_1	562	1.2e-30
/// ```
/// Each line is one read, so abundances are counted per record.
pub struct DiamondHits;

const COLUMNS: &[&str] = &["query_id", "taxid", "e_value"];

impl ProfileParser for DiamondHits {
    fn name(&self) -> &'static str {
        "diamond hits"
    }

    fn delimiter(&self) -> Delimiter {
        Delimiter::Whitespace
    }

    fn columns(&self) -> &'static [&'static str] {
        COLUMNS
    }

    fn parse_line(&self, line: &str, line_num: usize) -> Result<Option<ClassificationRecord>> {
        let fields = self.split_checked(line, line_num)?;
        let taxid: TaxId = numeric_field(&fields, 1, "taxid", line, line_num)?;
        let e_value: f64 = numeric_field(&fields, 2, "e_value", line, line_num)?;

        let mut record = ClassificationRecord::read(fields[0], taxid);
        record.extras.e_value = Some(e_value);
        Ok(Some(record))
    }
}
