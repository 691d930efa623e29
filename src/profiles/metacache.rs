//src/profiles/metacache.rs

use super::{field, numeric_field, Delimiter, ProfileParser};
use crate::error::Result;
use crate::types::{ClassificationRecord, TaxId};

/// MetaCache per-read mapping (`--taxids` layout), `#` lines are comments:
/// ```text
/// read_1 | species | Escherichia coli | 562
/// ```
pub struct MetacacheReads;

/// MetaCache abundance table: two header lines, then
/// ```text
/// species | Escherichia coli | 562 | 550 | 55.0%
/// ```
pub struct MetacacheReport;

const READ_COLUMNS: &[&str] = &["read_id", "rank", "name", "taxid"];

const REPORT_COLUMNS: &[&str] = &["rank", "name", "taxid", "reads", "percent"];

impl ProfileParser for MetacacheReads {
    fn name(&self) -> &'static str {
        "metacache reads"
    }

    fn delimiter(&self) -> Delimiter {
        Delimiter::Pipe
    }

    fn columns(&self) -> &'static [&'static str] {
        READ_COLUMNS
    }

    fn skips_comments(&self) -> bool {
        true
    }

    fn parse_line(&self, line: &str, line_num: usize) -> Result<Option<ClassificationRecord>> {
        let fields = self.split_checked(line, line_num)?;
        let taxid: TaxId = numeric_field(&fields, 3, "taxid", line, line_num)?;

        let mut record = ClassificationRecord::read(field(&fields, 0, "read_id", line, line_num)?, taxid);
        record.rank = Some(fields[1].to_string());
        record.extras.name = Some(fields[2].to_string());
        Ok(Some(record))
    }
}

impl ProfileParser for MetacacheReport {
    fn name(&self) -> &'static str {
        "metacache report"
    }

    fn delimiter(&self) -> Delimiter {
        Delimiter::Pipe
    }

    fn columns(&self) -> &'static [&'static str] {
        REPORT_COLUMNS
    }

    fn header_lines(&self) -> usize {
        2
    }

    fn parse_line(&self, line: &str, line_num: usize) -> Result<Option<ClassificationRecord>> {
        let fields = self.split_checked(line, line_num)?;
        let taxid: TaxId = numeric_field(&fields, 2, "taxid", line, line_num)?;
        let reads: u64 = numeric_field(&fields, 3, "reads", line, line_num)?;

        let mut record = ClassificationRecord::clade(taxid, reads);
        record.rank = Some(fields[0].to_string());
        record.extras.name = Some(fields[1].to_string());
        record.extras.percent = fields[4].trim_end_matches('%').trim().parse().ok();
        Ok(Some(record))
    }
}
