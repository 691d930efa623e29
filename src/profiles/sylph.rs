//src/profiles/sylph.rs

use super::{field, numeric_field, Delimiter, ProfileParser};
use crate::error::Result;
use crate::types::{ClassificationRecord, TaxId};

/// NCBI taxid of "other sequences", used for clades that carry no usable taxid.
pub const OTHER_SEQUENCES_TAXID: TaxId = 28384;

/// Separator between rank-prefixed segments of a clade name.
pub const CLADE_SEPARATOR: char = '|';

/// Sylph taxonomic profile (sylph-tax, MetaPhlAn-like layout). Two header
/// lines, then whitespace-separated
/// ```text
/// d__2|p__1224|c__1236|o__91347|f__543|g__561|s__562	55.1	60.2	1200
/// ```
/// Only clades resolved down to a species (`s__`) segment are kept; strain-level
/// and partial clades are dropped.
#[derive(Debug, Clone)]
pub struct SylphProfile {
    /// Taxid assigned when no segment yields a positive taxid.
    pub fallback_taxid: TaxId,
}

impl Default for SylphProfile {
    fn default() -> Self {
        Self {
            fallback_taxid: OTHER_SEQUENCES_TAXID,
        }
    }
}

/// Reads mapped by sylph to a genome taxid: `read_id<TAB>taxid`.
pub struct SylphMappedReads;

const PROFILE_COLUMNS: &[&str] = &["clade_name", "rel_abundance", "seq_abundance", "num_reads"];

const MAPPED_COLUMNS: &[&str] = &["read_id", "taxid"];

/// The most specific segment whose suffix (after the 3-char rank prefix) is a
/// positive integer, or `None` if no segment has one.
pub fn clade_taxid(clade: &str) -> Option<TaxId> {
    clade
        .split(CLADE_SEPARATOR)
        .rev()
        .filter_map(|segment| segment.get(3..)?.trim().parse::<TaxId>().ok())
        .find(|&taxid| taxid > 0)
}

fn is_species_clade(clade: &str) -> bool {
    clade
        .rsplit(CLADE_SEPARATOR)
        .next()
        .map_or(false, |last| last.starts_with("s__"))
}

impl SylphProfile {
    pub fn with_fallback(fallback_taxid: TaxId) -> Self {
        Self { fallback_taxid }
    }
}

impl ProfileParser for SylphProfile {
    fn name(&self) -> &'static str {
        "sylph profile"
    }

    fn delimiter(&self) -> Delimiter {
        Delimiter::Whitespace
    }

    fn columns(&self) -> &'static [&'static str] {
        PROFILE_COLUMNS
    }

    fn header_lines(&self) -> usize {
        2
    }

    fn parse_line(&self, line: &str, line_num: usize) -> Result<Option<ClassificationRecord>> {
        let fields = self.split_checked(line, line_num)?;
        let clade = field(&fields, 0, "clade_name", line, line_num)?;
        if !is_species_clade(clade) {
            return Ok(None);
        }

        let rel_abundance: f64 = numeric_field(&fields, 1, "rel_abundance", line, line_num)?;
        let seq_abundance: f64 = numeric_field(&fields, 2, "seq_abundance", line, line_num)?;
        let num_reads: u64 = numeric_field(&fields, 3, "num_reads", line, line_num)?;

        let taxid = clade_taxid(clade).unwrap_or_else(|| {
            log::debug!("No taxid in clade {clade}, using {}", self.fallback_taxid);
            self.fallback_taxid
        });

        let mut record = ClassificationRecord::clade(taxid, num_reads);
        record.extras.clade_name = Some(clade.to_string());
        record.extras.rel_abundance = Some(rel_abundance);
        record.extras.seq_abundance = Some(seq_abundance);
        Ok(Some(record))
    }
}

impl ProfileParser for SylphMappedReads {
    fn name(&self) -> &'static str {
        "sylph mapped reads"
    }

    fn delimiter(&self) -> Delimiter {
        Delimiter::Tab
    }

    fn columns(&self) -> &'static [&'static str] {
        MAPPED_COLUMNS
    }

    fn parse_line(&self, line: &str, line_num: usize) -> Result<Option<ClassificationRecord>> {
        let fields = self.split_checked(line, line_num)?;
        let taxid: TaxId = numeric_field(&fields, 1, "taxid", line, line_num)?;
        Ok(Some(ClassificationRecord::read(fields[0].trim(), taxid)))
    }
}
