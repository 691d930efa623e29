//src/aggregate.rs

use ahash::AHashMap;
use std::collections::{BTreeMap, BTreeSet};

use crate::lineage::{ancestor_at_rank, format_lineage, lineage, TaxidRemap};
use crate::samplesheet::Samplesheet;
use crate::taxdb::TaxonomyGraph;
use crate::types::{
    ClassificationRecord, ExtractionRow, SampleProfile, TaxId, TaxonAbundance, WideRow, WideTable,
};

/// Rank attached to taxids that are not in the taxonomy.
pub const UNKNOWN_RANK: &str = "unknown";

/// Drops unclassified records (`taxid <= 0`) and report rows that assign no
/// reads directly to their taxon.
pub fn standardize(records: Vec<ClassificationRecord>) -> Vec<ClassificationRecord> {
    records
        .into_iter()
        .filter(|r| r.is_classified() && r.count > 0)
        .collect()
}

/// Moves every record to its ancestor at `target_rank` and keeps only the
/// records that actually landed on that rank.
///
/// Records whose walk fell back to the original taxid (no ancestor of that
/// rank, or a taxid missing from the taxonomy) fail the rank check and are
/// dropped here.
pub fn summarize_at_rank(
    taxa: &TaxonomyGraph,
    records: Vec<ClassificationRecord>,
    target_rank: &str,
) -> Vec<ClassificationRecord> {
    let mut resolved: AHashMap<TaxId, TaxId> = AHashMap::new();
    records
        .into_iter()
        .filter_map(|mut record| {
            let ancestor = *resolved
                .entry(record.taxid)
                .or_insert_with(|| ancestor_at_rank(taxa, record.taxid, target_rank));
            let rank = taxa.rank_of(ancestor).unwrap_or(UNKNOWN_RANK);
            if rank != target_rank {
                return None;
            }
            record.taxid = ancestor;
            record.rank = Some(rank.to_string());
            Some(record)
        })
        .collect()
}

/// Sums record counts per `(taxid, sample)`, ordered by taxid then sample.
///
/// Report formats carry their read counts; per-read formats carry 1 per record,
/// so their records are effectively counted.
pub fn aggregate_counts(profiles: &[SampleProfile]) -> Vec<TaxonAbundance> {
    let mut sums: BTreeMap<(TaxId, &str), u64> = BTreeMap::new();
    for profile in profiles {
        for record in &profile.records {
            *sums.entry((record.taxid, profile.sample.as_str())).or_insert(0) += record.count;
        }
    }
    sums.into_iter()
        .map(|((taxid, sample), num_reads)| TaxonAbundance {
            taxid,
            sample: sample.to_string(),
            num_reads,
        })
        .collect()
}

/// Re-keys counts through `remap` and sums them again. Taxids without a remap
/// entry cannot be summarized at the remap's rank and are dropped.
pub fn collapse_counts(counts: &[TaxonAbundance], remap: &TaxidRemap) -> Vec<TaxonAbundance> {
    let mut sums: BTreeMap<(TaxId, &str), u64> = BTreeMap::new();
    for row in counts {
        if let Some(&ancestor) = remap.get(&row.taxid) {
            *sums.entry((ancestor, row.sample.as_str())).or_insert(0) += row.num_reads;
        }
    }
    sums.into_iter()
        .map(|((taxid, sample), num_reads)| TaxonAbundance {
            taxid,
            sample: sample.to_string(),
            num_reads,
        })
        .collect()
}

/// Name, rank and `;`-joined lineage shown for a taxid in wide tables.
pub fn annotate_taxon<S: AsRef<str>>(
    taxa: &TaxonomyGraph,
    taxid: TaxId,
    ranks: &[S],
) -> (String, String, String) {
    if taxid == 0 {
        return ("Unclassified".to_string(), "no rank".to_string(), String::new());
    }
    match taxa.get(taxid) {
        Ok(node) => (
            node.name.clone().unwrap_or_default(),
            node.rank.clone(),
            format_lineage(&lineage(taxa, taxid, ranks, false)),
        ),
        Err(e) => {
            log::warn!("{e}. Reporting it without name or lineage");
            (UNKNOWN_RANK.to_string(), UNKNOWN_RANK.to_string(), String::new())
        }
    }
}

/// Pivots long counts into one row per taxon and one column per sample,
/// filling absent combinations with zero. Rows are ordered by taxid, columns
/// by sample name.
pub fn pivot<S: AsRef<str>>(taxa: &TaxonomyGraph, counts: &[TaxonAbundance], ranks: &[S]) -> WideTable {
    let samples: Vec<String> = counts
        .iter()
        .map(|c| c.sample.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();
    let column: AHashMap<&str, usize> = samples
        .iter()
        .enumerate()
        .map(|(idx, s)| (s.as_str(), idx))
        .collect();

    let mut matrix: BTreeMap<TaxId, Vec<u64>> = BTreeMap::new();
    for row in counts {
        let cells = matrix
            .entry(row.taxid)
            .or_insert_with(|| vec![0; samples.len()]);
        cells[column[row.sample.as_str()]] += row.num_reads;
    }

    let rows = matrix
        .into_iter()
        .map(|(taxid, counts)| {
            let (name, rank, lineage) = annotate_taxon(taxa, taxid, ranks);
            WideRow {
                taxid,
                name,
                rank,
                lineage,
                counts,
            }
        })
        .collect();

    WideTable { samples, rows }
}

/// For each sample of `samplesheet` and each expected taxid, lists the reads
/// that summarize to that taxid at `target_rank`.
///
/// Every `(sample, taxid)` pair yields a row, with an empty read list when
/// nothing matched. Samples without a parsed profile count as empty.
pub fn extract_positive_reads(
    taxa: &TaxonomyGraph,
    profiles: &[SampleProfile],
    samplesheet: &Samplesheet,
    expected_taxa: &[TaxId],
    target_rank: &str,
) -> Vec<ExtractionRow> {
    let mut rows = Vec::with_capacity(samplesheet.len() * expected_taxa.len());

    for entry in &samplesheet.entries {
        let records = profiles
            .iter()
            .find(|p| p.sample == entry.sample)
            .map(|p| summarize_at_rank(taxa, standardize(p.records.clone()), target_rank))
            .unwrap_or_default();

        let mut by_taxid: AHashMap<TaxId, Vec<String>> = AHashMap::new();
        for record in records {
            if let Some(unit_id) = record.unit_id {
                by_taxid.entry(record.taxid).or_default().push(unit_id);
            }
        }

        for &taxid in expected_taxa {
            let reads = by_taxid.get(&taxid).cloned().unwrap_or_default();
            log::debug!("{}: {} reads for taxid {}", entry.sample, reads.len(), taxid);
            rows.push(ExtractionRow {
                sample: entry.sample.clone(),
                fastq: entry.fastq.clone().unwrap_or_default(),
                taxid,
                reads,
            });
        }
    }
    rows
}
