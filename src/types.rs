//src/types.rs

use std::fmt::{self, Write as FmtWrite};

/// Taxonomic identifier. Signed because classifiers report `0` (and some
/// tools negative values) for unclassified units.
pub type TaxId = i64;

/// The fixed root of an NCBI taxonomy.
pub const ROOT_TAXID: TaxId = 1;

/// Ranks used for lineage strings, domain first.
pub const CANONICAL_RANKS: [&str; 7] = [
    "superkingdom",
    "phylum",
    "class",
    "order",
    "family",
    "genus",
    "species",
];

/// One node of the taxonomy arena.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxonNode {
    pub taxid: TaxId,
    pub parent_taxid: TaxId,
    pub rank: String,
    /// Scientific name with whitespace replaced by `_`.
    pub name: Option<String>,
}

/// Canonical classification record produced by every profile parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationRecord {
    /// Read id (per-read formats) or `None` for clade/report rows.
    pub unit_id: Option<String>,
    pub taxid: TaxId,
    pub count: u64,
    /// Rank reported by the classifier, or the resolved rank after summarization.
    pub rank: Option<String>,
    pub extras: RecordExtras,
}

impl ClassificationRecord {
    /// A single read assigned to `taxid`.
    pub fn read(unit_id: impl Into<String>, taxid: TaxId) -> Self {
        Self {
            unit_id: Some(unit_id.into()),
            taxid,
            count: 1,
            ..Default::default()
        }
    }

    /// An aggregated report row carrying `count` reads.
    pub fn clade(taxid: TaxId, count: u64) -> Self {
        Self {
            unit_id: None,
            taxid,
            count,
            ..Default::default()
        }
    }

    pub fn is_classified(&self) -> bool {
        self.taxid > 0
    }
}

/// Format-specific fields kept alongside the canonical ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordExtras {
    pub status: Option<String>,
    pub name: Option<String>,
    pub read_len: Option<u64>,
    pub lca_mapping: Option<String>,
    pub e_value: Option<f64>,
    pub identity: Option<f64>,
    pub percent: Option<f64>,
    pub clade_reads: Option<u64>,
    pub clade_name: Option<String>,
    pub rel_abundance: Option<f64>,
    pub seq_abundance: Option<f64>,
    pub match_count: Option<String>,
}

/// All records parsed from one sample's classifier output.
#[derive(Debug, Clone, Default)]
pub struct SampleProfile {
    pub sample: String,
    pub records: Vec<ClassificationRecord>,
}

impl SampleProfile {
    pub fn new(sample: impl Into<String>, records: Vec<ClassificationRecord>) -> Self {
        Self {
            sample: sample.into(),
            records,
        }
    }

    pub fn total_count(&self) -> u64 {
        self.records.iter().map(|r| r.count).sum()
    }
}

/// Reads summed for one taxon within one sample (long form).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaxonAbundance {
    pub taxid: TaxId,
    pub sample: String,
    pub num_reads: u64,
}

/// A wide, taxon x sample count matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideTable {
    pub samples: Vec<String>,
    pub rows: Vec<WideRow>,
}

impl WideTable {
    /// Tab-separated text: `taxonomy_id, name, rank, lineage` then one column per sample.
    pub fn to_tsv(&self) -> String {
        let mut output = String::new();
        output.push_str("taxonomy_id\tname\trank\tlineage");
        for sample in &self.samples {
            output.push('\t');
            output.push_str(sample);
        }
        output.push('\n');

        for row in &self.rows {
            let _ = write!(output, "{}\t{}\t{}\t{}", row.taxid, row.name, row.rank, row.lineage);
            for count in &row.counts {
                let _ = write!(output, "\t{}", count);
            }
            output.push('\n');
        }
        output
    }

    /// Column sums, one per sample.
    pub fn sample_totals(&self) -> Vec<u64> {
        let mut totals = vec![0; self.samples.len()];
        for row in &self.rows {
            for (total, count) in totals.iter_mut().zip(&row.counts) {
                *total += count;
            }
        }
        totals
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub taxid: TaxId,
    pub name: String,
    pub rank: String,
    pub lineage: String,
    /// One count per entry of `WideTable::samples`, in the same order.
    pub counts: Vec<u64>,
}

/// One `(sample, expected taxid)` row of a positive-read extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRow {
    pub sample: String,
    pub fastq: String,
    pub taxid: TaxId,
    pub reads: Vec<String>,
}

impl fmt::Display for ExtractionRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.sample,
            self.fastq,
            self.taxid,
            self.reads.join(",")
        )
    }
}
