//src/samplesheet.rs

use ahash::AHashSet;
use std::io::BufRead;
use std::path::PathBuf;

use crate::error::{Result, TaxError};
use crate::profiles::Classifier;
use crate::types::TaxId;

/// One sample row of a samplesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleEntry {
    pub sample: String,
    /// Source reads; only present in read samplesheets.
    pub fastq: Option<String>,
    /// Classifier output. `None` when the cell is empty: the sample then has
    /// an empty profile.
    pub profile: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Samplesheet {
    pub entries: Vec<SampleEntry>,
}

fn non_empty_path(cell: Option<&str>) -> Option<PathBuf> {
    cell.map(str::trim)
        .filter(|c| !c.is_empty())
        .map(PathBuf::from)
}

impl Samplesheet {
    /// Parses a two-column TSV (`sample, profile`) with a header row.
    pub fn parse_profiles<R: BufRead>(reader: R) -> Result<Self> {
        let mut sheet = Samplesheet::default();
        for (idx, line_result) in reader.lines().enumerate().skip(1) {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                return Err(TaxError::Samplesheet(format!(
                    "line {} has no profile column: {line:?}",
                    idx + 1
                )));
            }
            sheet.push(SampleEntry {
                sample: fields[0].trim().to_string(),
                fastq: None,
                profile: non_empty_path(Some(fields[1])),
            })?;
        }
        Ok(sheet)
    }

    /// Parses a read samplesheet (`sample, fastq, <one column per classifier>`).
    ///
    /// The classifier column is looked up by header name; if the header does not
    /// name it, the fixed column order `kraken2, diamond, metabuli, metacache,
    /// sylph` is assumed.
    pub fn parse_reads<R: BufRead>(reader: R, classifier: Classifier) -> Result<Self> {
        let mut lines = reader.lines();
        let header = match lines.next() {
            Some(line) => line?,
            None => return Ok(Samplesheet::default()),
        };
        let profile_idx = header
            .split('\t')
            .position(|col| col.trim().eq_ignore_ascii_case(classifier.name()))
            .unwrap_or_else(|| classifier.samplesheet_column());
        log::debug!("Reading {} profiles from samplesheet column {}", classifier, profile_idx);

        let mut sheet = Samplesheet::default();
        for (idx, line_result) in lines.enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                return Err(TaxError::Samplesheet(format!(
                    "line {} has no fastq column: {line:?}",
                    idx + 2
                )));
            }
            sheet.push(SampleEntry {
                sample: fields[0].trim().to_string(),
                fastq: Some(fields[1].trim().to_string()),
                profile: non_empty_path(fields.get(profile_idx).copied()),
            })?;
        }
        Ok(sheet)
    }

    fn push(&mut self, entry: SampleEntry) -> Result<()> {
        if entry.sample.is_empty() {
            return Err(TaxError::Samplesheet("empty sample identifier".to_string()));
        }
        if self.entries.iter().any(|e| e.sample == entry.sample) {
            return Err(TaxError::Samplesheet(format!("duplicate sample '{}'", entry.sample)));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, sample: &str) -> Option<&SampleEntry> {
        self.entries.iter().find(|e| e.sample == sample)
    }

    pub fn samples(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.sample.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads one positive taxid per line; blank lines are skipped and repeats
/// keep their first position.
pub fn parse_expected_taxa<R: BufRead>(reader: R) -> Result<Vec<TaxId>> {
    let mut taxa = Vec::new();
    let mut seen = AHashSet::new();
    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let taxid: TaxId = trimmed
            .parse()
            .ok()
            .filter(|&t: &TaxId| t > 0)
            .ok_or_else(|| TaxError::malformed(idx + 1, &line, "expected a positive taxid"))?;
        if seen.insert(taxid) {
            taxa.push(taxid);
        }
    }
    Ok(taxa)
}
