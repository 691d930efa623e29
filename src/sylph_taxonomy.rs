//src/sylph_taxonomy.rs
//
// Writes the genome -> lineage table sylph-tax needs to turn a sylph profile
// into the clade strings `profiles::sylph` reads back.

use std::fmt::Write as FmtWrite;
use std::io::BufRead;

use crate::error::{Result, TaxError};
use crate::lineage::{format_sylph_lineage, lineage};
use crate::taxdb::TaxonomyGraph;
use crate::types::{TaxId, CANONICAL_RANKS};

/// Genome file markers after which NCBI assembly file names are cut.
const ASSEMBLY_MARKERS: [&str; 2] = ["_ASM", "_genomic"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomeLineage {
    pub genome: String,
    pub taxid: TaxId,
    pub lineage: String,
}

/// File name of `path` cut at the first assembly marker:
/// `refs/GCF_000005845.2_ASM584v2_genomic.fna.gz` -> `GCF_000005845.2`.
pub fn genome_basename(path: &str) -> String {
    let file_name = path.trim().rsplit('/').next().unwrap_or_default();
    let cut = ASSEMBLY_MARKERS
        .iter()
        .filter_map(|marker| file_name.find(marker))
        .min()
        .unwrap_or(file_name.len());
    file_name[..cut].to_string()
}

/// Reads a CSV genome samplesheet (`name,taxid,fasta,...` with a header row)
/// and resolves each genome's `d__...;s__...` lineage, with names or taxids.
pub fn build_sylph_taxonomy<R: BufRead>(
    taxa: &TaxonomyGraph,
    samplesheet: R,
    use_taxids: bool,
) -> Result<Vec<GenomeLineage>> {
    let mut genomes = Vec::new();
    for (idx, line_result) in samplesheet.lines().enumerate().skip(1) {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 3 {
            return Err(TaxError::malformed(idx + 1, &line, "expected name,taxid,fasta columns"));
        }
        let taxid: TaxId = fields[1]
            .trim()
            .parse()
            .map_err(|_| TaxError::malformed(idx + 1, &line, format!("non-numeric taxid '{}'", fields[1])))?;

        genomes.push(GenomeLineage {
            genome: genome_basename(fields[2]),
            taxid,
            lineage: format_sylph_lineage(&lineage(taxa, taxid, &CANONICAL_RANKS, use_taxids)),
        });
    }
    log::info!("Resolved lineages for {} genomes", genomes.len());
    Ok(genomes)
}

/// Tab-separated `genome<TAB>lineage` lines.
pub fn format_sylph_taxonomy(genomes: &[GenomeLineage]) -> String {
    let mut output = String::new();
    for genome in genomes {
        let _ = writeln!(output, "{}\t{}", genome.genome, genome.lineage);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxdb::tests::ecoli_taxonomy;

    #[test]
    fn test_genome_basename() {
        assert_eq!(
            genome_basename("refs/GCF_000005845.2_ASM584v2_genomic.fna.gz"),
            "GCF_000005845.2"
        );
        assert_eq!(genome_basename("refs/my_genome_genomic.fna"), "my_genome");
        assert_eq!(genome_basename("plain.fasta"), "plain.fasta");
        assert_eq!(genome_basename("dir_ASM/x.fa"), "x.fa");
    }

    #[test]
    fn test_build_sylph_taxonomy() {
        let taxa = ecoli_taxonomy();
        let sheet = "\
name,taxid,fasta
ecoli,562,/refs/GCF_000005845.2_ASM584v2_genomic.fna.gz

example,10,/refs/example.fa
";
        let genomes = build_sylph_taxonomy(&taxa, sheet.as_bytes(), false).unwrap();
        assert_eq!(genomes.len(), 2);
        assert_eq!(
            format_sylph_taxonomy(&genomes),
            "GCF_000005845.2\td__Bacteria;p__Pseudomonadota;c__Gammaproteobacteria;o__Enterobacterales;\
f__Enterobacteriaceae;g__Escherichia;s__Escherichia_coli\n\
example.fa\td__Bacteria;p__;c__;o__;f__;g__;s__Example_species\n"
        );

        let genomes = build_sylph_taxonomy(&taxa, sheet.as_bytes(), true).unwrap();
        assert_eq!(genomes[0].lineage, "d__2;p__1224;c__1236;o__91347;f__543;g__561;s__562");
    }

    #[test]
    fn test_build_sylph_taxonomy_rejects_bad_taxid() {
        let taxa = ecoli_taxonomy();
        let sheet = "name,taxid,fasta\necoli,E. coli,ecoli.fa\n";
        let err = build_sylph_taxonomy(&taxa, sheet.as_bytes(), false).unwrap_err();
        assert!(matches!(err, TaxError::MalformedRecord { line_num: 2, .. }));
    }
}
