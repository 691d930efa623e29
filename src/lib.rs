// src/lib.rs
pub mod aggregate;
pub mod error;
pub mod io;
pub mod lineage;
pub mod profiles;
pub mod samplesheet;
pub mod sylph_taxonomy;
pub mod taxdb;
pub mod types;

use rayon::prelude::*;
use std::fmt::Write as FmtWrite;
use std::io::BufRead;
use std::path::PathBuf;

use crate::aggregate::{aggregate_counts, collapse_counts, extract_positive_reads, pivot, standardize};
use crate::error::Result;
use crate::io::open_text;
use crate::lineage::{ancestor_at_rank, build_rank_remap};
use crate::profiles::{Classifier, ProfileParser};
use crate::samplesheet::{parse_expected_taxa, Samplesheet};
use crate::taxdb::TaxonomyGraph;
use crate::types::{ExtractionRow, SampleProfile, TaxId, WideTable, CANONICAL_RANKS};

/// Settings for aggregating abundance profiles into wide tables.
#[derive(Debug, Clone)]
pub struct SummariseOptions {
    pub taxonomy_dir: PathBuf,
    pub samplesheet: PathBuf,
    pub classifier: Classifier,
    /// Also collapse counts to this rank when set.
    pub summarise_at: Option<String>,
    /// Ranks shown in the lineage column, highest first.
    pub ranks: Vec<String>,
}

/// Settings for extracting reads assigned to expected taxa.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub taxonomy_dir: PathBuf,
    pub samplesheet: PathBuf,
    pub classifier: Classifier,
    pub expected_taxa: PathBuf,
    pub summarise_at: String,
}

pub fn canonical_ranks() -> Vec<String> {
    CANONICAL_RANKS.iter().map(|r| r.to_string()).collect()
}

/// Cross-sample abundance tables. Text is generated on demand.
pub struct SummaryResults {
    /// Standardized per-sample records the tables were built from.
    pub profiles: Vec<SampleProfile>,
    /// Counts at the taxa the classifier reported.
    pub table: WideTable,
    /// Counts collapsed to `summarise_at`, if requested.
    pub summarised: Option<WideTable>,
    pub summarise_at: Option<String>,
}

impl SummaryResults {
    pub fn get_table_tsv(&self) -> String {
        self.table.to_tsv()
    }

    pub fn get_summarised_tsv(&self) -> Option<String> {
        self.summarised.as_ref().map(WideTable::to_tsv)
    }
}

/// Positive-read extraction rows.
pub struct ExtractionResults {
    pub rows: Vec<ExtractionRow>,
}

impl ExtractionResults {
    pub fn get_extraction_tsv(&self) -> String {
        let mut output = String::new();
        output.push_str("sample\tfastq\ttaxid\treads\n");
        for row in &self.rows {
            let _ = writeln!(output, "{}", row);
        }
        output
    }
}

/// Parses every sample's classifier output with `parser`, one sample per
/// rayon task. The first failing sample aborts the whole batch.
pub fn load_profiles(samplesheet: &Samplesheet, parser: &dyn ProfileParser) -> Result<Vec<SampleProfile>> {
    samplesheet
        .entries
        .par_iter()
        .map(|entry| -> Result<SampleProfile> {
            let records = match &entry.profile {
                Some(path) => {
                    let records = parser
                        .parse_file(path)
                        .map_err(|e| e.in_profile(&entry.sample, path))?;
                    log::info!(
                        "{}: {} {} records from {}",
                        entry.sample,
                        records.len(),
                        parser.name(),
                        path.display()
                    );
                    records
                }
                None => {
                    log::warn!("{}: no {} output listed, using an empty profile", entry.sample, parser.name());
                    Vec::new()
                }
            };
            Ok(SampleProfile::new(entry.sample.clone(), records))
        })
        .collect()
}

/// Builds the wide tables from already-parsed profiles.
///
/// Counts go into the main table at the reported taxa. With `summarise_at`,
/// a second table sums them at that rank through a rank remap; taxa with no
/// ancestor of that rank are left out of it.
pub fn summarise_profiles<S: AsRef<str>>(
    taxa: &TaxonomyGraph,
    profiles: Vec<SampleProfile>,
    summarise_at: Option<&str>,
    ranks: &[S],
) -> SummaryResults {
    let profiles: Vec<SampleProfile> = profiles
        .into_iter()
        .map(|p| SampleProfile::new(p.sample, standardize(p.records)))
        .collect();

    let counts = aggregate_counts(&profiles);
    let table = pivot(taxa, &counts, ranks);

    let summarised = summarise_at.map(|rank| {
        let remap = build_rank_remap(taxa, counts.iter().map(|c| c.taxid), rank);
        log::info!(
            "{} of {} taxa can be summarised at rank {}",
            remap.len(),
            table.rows.len(),
            rank
        );
        pivot(taxa, &collapse_counts(&counts, &remap), ranks)
    });

    SummaryResults {
        profiles,
        table,
        summarised,
        summarise_at: summarise_at.map(str::to_string),
    }
}

/// Full profile aggregation: taxonomy, samplesheet, parsing, tables.
pub fn run_summarise(opts: &SummariseOptions) -> Result<SummaryResults> {
    let taxa = TaxonomyGraph::from_dump_dir(&opts.taxonomy_dir)?;
    let samplesheet = Samplesheet::parse_profiles(open_text(&opts.samplesheet)?)?;
    let parser = opts.classifier.profile_parser();
    let profiles = load_profiles(&samplesheet, parser.as_ref())?;

    Ok(summarise_profiles(
        &taxa,
        profiles,
        opts.summarise_at.as_deref().filter(|r| !r.is_empty()),
        opts.ranks.as_slice(),
    ))
}

/// Full positive-read extraction: taxonomy, samplesheet, expected taxa, reads.
pub fn run_extract(opts: &ExtractOptions) -> Result<ExtractionResults> {
    let taxa = TaxonomyGraph::from_dump_dir(&opts.taxonomy_dir)?;
    let samplesheet = Samplesheet::parse_reads(open_text(&opts.samplesheet)?, opts.classifier)?;
    let expected = parse_expected_taxa(open_text(&opts.expected_taxa)?)?;
    let parser = opts.classifier.read_parser();
    let profiles = load_profiles(&samplesheet, parser.as_ref())?;

    let rows = extract_positive_reads(&taxa, &profiles, &samplesheet, &expected, &opts.summarise_at);
    log::info!(
        "Extracted {} reads over {} sample/taxon pairs",
        rows.iter().map(|r| r.reads.len()).sum::<usize>(),
        rows.len()
    );
    Ok(ExtractionResults { rows })
}

/// For each taxid line of `input`, the ancestor at `target_rank`, optionally
/// followed by its name and rank. Lines that are not integers are echoed as-is.
pub fn ancestors_report<R: BufRead>(
    taxa: &TaxonomyGraph,
    input: R,
    target_rank: &str,
    with_name: bool,
    with_rank: bool,
) -> Result<String> {
    let mut output = String::new();
    for line_result in input.lines() {
        let line = line_result?;
        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }
        let Ok(taxid) = raw.parse::<TaxId>() else {
            let _ = writeln!(output, "{}", raw);
            continue;
        };

        let ancestor = ancestor_at_rank(taxa, taxid, target_rank);
        let mut fields = vec![ancestor.to_string()];
        if with_name {
            fields.push(taxa.name_of(ancestor).unwrap_or("unknown").to_string());
        }
        if with_rank {
            fields.push(taxa.rank_of(ancestor).unwrap_or("unknown").to_string());
        }
        let _ = writeln!(output, "{}", fields.join("\t"));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaxError;
    use crate::taxdb::tests::{ecoli_taxonomy, NAMES_DMP, NODES_DMP};
    use crate::types::ClassificationRecord;
    use std::fs;

    #[test]
    fn test_summarise_profiles() {
        let taxa = ecoli_taxonomy();
        let profiles = vec![
            SampleProfile::new(
                "s1",
                vec![
                    ClassificationRecord::clade(0, 100),
                    ClassificationRecord::clade(562, 550),
                    ClassificationRecord::clade(83333, 50),
                    ClassificationRecord::clade(561, 12),
                ],
            ),
            SampleProfile::new("s2", vec![ClassificationRecord::clade(83333, 7)]),
        ];

        let results = summarise_profiles(&taxa, profiles, Some("species"), &CANONICAL_RANKS);
        assert_eq!(results.table.samples, vec!["s1", "s2"]);
        assert_eq!(results.table.rows.len(), 3);
        assert_eq!(results.table.sample_totals(), vec![612, 7]);

        let summarised = results.summarised.as_ref().unwrap();
        assert_eq!(summarised.rows.len(), 1);
        assert_eq!(summarised.rows[0].taxid, 562);
        assert_eq!(summarised.rows[0].counts, vec![600, 7]);
        // the genus-level row cannot be summarised at species
        assert!(summarised.sample_totals().iter().zip(results.table.sample_totals()).all(|(a, b)| *a <= b));

        let tsv = results.get_table_tsv();
        let mut lines = tsv.lines();
        assert_eq!(lines.next(), Some("taxonomy_id\tname\trank\tlineage\ts1\ts2"));
        assert_eq!(
            lines.next(),
            Some("561\tEscherichia\tgenus\tBacteria;Pseudomonadota;Gammaproteobacteria;Enterobacterales;Enterobacteriaceae;Escherichia\t12\t0")
        );
    }

    #[test]
    fn test_ancestors_report() {
        let taxa = ecoli_taxonomy();
        let input = "83333\n\nnot-a-taxid\n10\n";
        let report = ancestors_report(&taxa, input.as_bytes(), "genus", true, true).unwrap();
        assert_eq!(
            report,
            "561\tEscherichia\tgenus\nnot-a-taxid\n10\tExample_species\tspecies\n"
        );
        let report = ancestors_report(&taxa, "83333\n".as_bytes(), "species", false, false).unwrap();
        assert_eq!(report, "562\n");
    }

    fn write_taxdump(dir: &std::path::Path) -> PathBuf {
        let taxdump = dir.join("taxdump");
        fs::create_dir(&taxdump).unwrap();
        fs::write(taxdump.join("nodes.dmp"), NODES_DMP).unwrap();
        fs::write(taxdump.join("names.dmp"), NAMES_DMP).unwrap();
        taxdump
    }

    #[test]
    fn test_run_summarise_kraken_reports() {
        let dir = tempfile::tempdir().unwrap();
        let taxonomy_dir = write_taxdump(dir.path());

        fs::write(
            dir.path().join("s1.report"),
            "10.00\t100\t100\tU\t0\tunclassified\n\
             90.00\t900\t5\tR\t1\troot\n\
             60.00\t600\t550\tS\t562\t  Escherichia coli\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("s2.report"),
            "100.00\t30\t30\tS1\t83333\t    Escherichia coli K-12\n",
        )
        .unwrap();
        let samplesheet = dir.path().join("samples.tsv");
        fs::write(
            &samplesheet,
            format!(
                "sample\tprofile\ns1\t{}\ns2\t{}\n",
                dir.path().join("s1.report").display(),
                dir.path().join("s2.report").display()
            ),
        )
        .unwrap();

        let results = run_summarise(&SummariseOptions {
            taxonomy_dir,
            samplesheet,
            classifier: Classifier::Kraken2,
            summarise_at: Some("species".to_string()),
            ranks: canonical_ranks(),
        })
        .unwrap();

        let taxids: Vec<_> = results.table.rows.iter().map(|r| r.taxid).collect();
        assert_eq!(taxids, vec![1, 562, 83333]);
        assert_eq!(results.table.rows[0].name, "root");
        assert_eq!(results.table.rows[0].lineage, "");
        assert_eq!(results.table.rows[1].counts, vec![550, 0]);
        // the root's 5 direct reads stay in the main table but never reach species
        let summarised = results.summarised.unwrap();
        assert_eq!(summarised.rows.len(), 1);
        assert_eq!(summarised.rows[0].counts, vec![550, 30]);
    }

    #[test]
    fn test_run_extract_diamond() {
        let dir = tempfile::tempdir().unwrap();
        let taxonomy_dir = write_taxdump(dir.path());

        let hits = dir.path().join("s1.dmnd.tsv");
        fs::write(&hits, "r1\t83333\t1e-20\nr2\t0\t0\nr3\t561\t1e-9\nr4\t562\t1e-30\n").unwrap();
        let samplesheet = dir.path().join("samples.tsv");
        fs::write(
            &samplesheet,
            format!(
                "sample\tfastq\tkraken2\tdiamond\ns1\t/reads/s1.fq\t\t{}\ns2\t/reads/s2.fq\t\t\n",
                hits.display()
            ),
        )
        .unwrap();
        let expected = dir.path().join("expected.txt");
        fs::write(&expected, "562\n").unwrap();

        let results = run_extract(&ExtractOptions {
            taxonomy_dir,
            samplesheet,
            classifier: Classifier::Diamond,
            expected_taxa: expected,
            summarise_at: "species".to_string(),
        })
        .unwrap();

        assert_eq!(
            results.get_extraction_tsv(),
            "sample\tfastq\ttaxid\treads\n\
             s1\t/reads/s1.fq\t562\tr1,r4\n\
             s2\t/reads/s2.fq\t562\t\n"
        );
    }

    #[test]
    fn test_malformed_profile_aborts_batch() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.tsv");
        let bad = dir.path().join("bad.tsv");
        fs::write(&good, "r1\t562\n").unwrap();
        fs::write(&bad, "r1\tfive-six-two\n").unwrap();
        let sheet = Samplesheet::parse_profiles(
            format!("sample\tprofile\ngood\t{}\nbad\t{}\n", good.display(), bad.display()).as_bytes(),
        )
        .unwrap();

        let err = load_profiles(&sheet, Classifier::Sylph.read_parser().as_ref()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("five-six-two"));
        assert!(message.contains("sample 'bad'"));
        assert!(message.contains(&bad.display().to_string()));
        match err {
            TaxError::Profile { sample, path, source } => {
                assert_eq!(sample, "bad");
                assert_eq!(path, bad);
                assert!(matches!(*source, TaxError::MalformedRecord { line_num: 1, .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_profile_names_its_sample() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("sampleC_missing.tsv");
        let sheet =
            Samplesheet::parse_profiles(format!("sample\tprofile\nsampleC\t{}\n", missing.display()).as_bytes())
                .unwrap();

        let err = load_profiles(&sheet, Classifier::Kraken2.profile_parser().as_ref()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("sample 'sampleC'"));
        assert!(message.contains("sampleC_missing.tsv"));
        assert!(matches!(err, TaxError::Profile { ref source, .. } if matches!(**source, TaxError::Io(_))));
    }
}
