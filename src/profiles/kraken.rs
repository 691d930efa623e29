//src/profiles/kraken.rs

use super::{field, numeric_field, Delimiter, ProfileParser};
use crate::error::{Result, TaxError};
use crate::types::{ClassificationRecord, TaxId};

/// Kraken2 per-read output:
/// ```text
/// C	read_1	562	150	562:12 561:3 |:| 562:20
/// ```
pub struct Kraken2Reads;

/// Kraken-style report, as written by kraken2 and metabuli:
/// ```text
/// 12.50	250	100	S	562	      Escherichia coli
/// ```
/// Kraken2 reports made with `--report-minimizer-data` carry two extra
/// minimizer columns before the rank code; they are recognized by column count.
pub struct KrakenReport;

const READ_COLUMNS: &[&str] = &["status", "read_id", "taxid", "read_len", "lca_mapping"];

const REPORT_COLUMNS: &[&str] = &[
    "percent",
    "clade_reads",
    "taxon_reads",
    "rank_code",
    "taxid",
    "name",
];

/// Accepts a bare taxid or kraken2's `--use-names` form `Name (taxid 562)`.
pub(crate) fn parse_kraken_taxid(raw: &str) -> Option<TaxId> {
    let raw = raw.trim();
    if let Ok(taxid) = raw.parse() {
        return Some(taxid);
    }
    let start = raw.rfind("(taxid ")?;
    raw[start + "(taxid ".len()..]
        .strip_suffix(')')?
        .trim()
        .parse()
        .ok()
}

/// Paired-end lengths are written as `150|148`; they are summed.
fn parse_read_len(raw: &str) -> Option<u64> {
    raw.split('|')
        .map(|part| part.trim().parse::<u64>())
        .sum::<std::result::Result<u64, _>>()
        .ok()
}

impl ProfileParser for Kraken2Reads {
    fn name(&self) -> &'static str {
        "kraken2 reads"
    }

    fn delimiter(&self) -> Delimiter {
        Delimiter::Tab
    }

    fn columns(&self) -> &'static [&'static str] {
        READ_COLUMNS
    }

    fn parse_line(&self, line: &str, line_num: usize) -> Result<Option<ClassificationRecord>> {
        let fields = self.split_checked(line, line_num)?;

        let raw_taxid = field(&fields, 2, "taxid", line, line_num)?;
        let taxid = parse_kraken_taxid(raw_taxid).ok_or_else(|| {
            TaxError::malformed(line_num, line, format!("non-numeric taxid '{raw_taxid}'"))
        })?;
        let read_len = parse_read_len(fields[3]).ok_or_else(|| {
            TaxError::malformed(line_num, line, format!("non-numeric read_len '{}'", fields[3]))
        })?;

        let mut record = ClassificationRecord::read(fields[1].trim(), taxid);
        record.extras.status = Some(fields[0].trim().to_string());
        record.extras.read_len = Some(read_len);
        record.extras.lca_mapping = Some(fields[4].trim().to_string());
        Ok(Some(record))
    }
}

impl ProfileParser for KrakenReport {
    fn name(&self) -> &'static str {
        "kraken-style report"
    }

    fn delimiter(&self) -> Delimiter {
        Delimiter::Tab
    }

    fn columns(&self) -> &'static [&'static str] {
        REPORT_COLUMNS
    }

    fn skips_comments(&self) -> bool {
        true
    }

    fn parse_line(&self, line: &str, line_num: usize) -> Result<Option<ClassificationRecord>> {
        let fields = self.split_checked(line, line_num)?;
        // percent, clade, taxon, [minimizers, distinct minimizers,] rank, taxid, name
        let offset = if fields.len() >= 8 { 2 } else { 0 };

        let percent: f64 = numeric_field(&fields, 0, "percent", line, line_num)?;
        let clade_reads: u64 = numeric_field(&fields, 1, "clade_reads", line, line_num)?;
        let taxon_reads: u64 = numeric_field(&fields, 2, "taxon_reads", line, line_num)?;
        let rank_code = field(&fields, 3 + offset, "rank_code", line, line_num)?;
        let taxid: TaxId = numeric_field(&fields, 4 + offset, "taxid", line, line_num)?;
        let name = field(&fields, 5 + offset, "name", line, line_num)?;

        let mut record = ClassificationRecord::clade(taxid, taxon_reads);
        record.rank = Some(rank_code.trim().to_string());
        record.extras.percent = Some(percent);
        record.extras.clade_reads = Some(clade_reads);
        record.extras.name = Some(name.trim().to_string());
        Ok(Some(record))
    }
}
