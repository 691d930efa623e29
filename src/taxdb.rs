//src/taxdb.rs

use ahash::AHashMap;
use std::io::BufRead;
use std::path::Path;

use crate::error::{Result, TaxError};
use crate::io::{dump_path, open_text};
use crate::types::{TaxId, TaxonNode};

/// Name class that populates `TaxonNode::name`; all other classes are ignored.
pub const SCIENTIFIC_NAME: &str = "scientific name";

/// Splits one `.dmp` line (`field\t|\tfield\t|`) into trimmed fields.
pub fn split_dmp_line(line: &str) -> Vec<&str> {
    let mut fields: Vec<&str> = line.split('|').map(str::trim).collect();
    // drop the empty tail left by the terminating `\t|`
    if fields.len() > 1 && fields.last().map_or(false, |f| f.is_empty()) {
        fields.pop();
    }
    fields
}

/// In-memory NCBI taxonomy: an arena of nodes keyed by taxid.
///
/// Built once from `nodes.dmp` and `names.dmp` records and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct TaxonomyGraph {
    nodes: AHashMap<TaxId, TaxonNode>,
}

impl TaxonomyGraph {
    /// Builds the graph from node records (`taxid, parent, rank, ...`) and name
    /// records (`taxid, name_txt, unique_name, name_class, ...`), each already
    /// split into fields.
    ///
    /// Blank or malformed records are skipped. A scientific name for a taxid that
    /// has no node record is a `TaxError::Build`.
    pub fn build<N, M, R, S, F, G>(node_records: N, name_records: M) -> Result<Self>
    where
        N: IntoIterator<Item = R>,
        M: IntoIterator<Item = S>,
        R: AsRef<[F]>,
        S: AsRef<[G]>,
        F: AsRef<str>,
        G: AsRef<str>,
    {
        let mut taxa = TaxonomyGraph::default();
        for record in node_records {
            taxa.insert_node_record(record.as_ref());
        }
        for record in name_records {
            taxa.merge_name_record(record.as_ref())?;
        }
        Ok(taxa)
    }

    /// Reads both dumps line by line.
    pub fn from_readers<R1: BufRead, R2: BufRead>(nodes_dmp: R1, names_dmp: R2) -> Result<Self> {
        let mut taxa = TaxonomyGraph::default();

        for line_result in nodes_dmp.lines() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            taxa.insert_node_record(&split_dmp_line(&line));
        }
        log::debug!("Read {} taxonomy nodes", taxa.len());

        let mut named = 0usize;
        for line_result in names_dmp.lines() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            if taxa.merge_name_record(&split_dmp_line(&line))? {
                named += 1;
            }
        }
        log::debug!("Merged {} scientific names", named);

        Ok(taxa)
    }

    /// Loads `nodes.dmp` and `names.dmp` from explicit paths (plain or `.gz`).
    pub fn from_dump_files<P: AsRef<Path>, Q: AsRef<Path>>(nodes_path: P, names_path: Q) -> Result<Self> {
        let taxa = Self::from_readers(open_text(&nodes_path)?, open_text(&names_path)?)?;
        log::info!(
            "Loaded taxonomy with {} nodes from {}",
            taxa.len(),
            nodes_path.as_ref().display()
        );
        Ok(taxa)
    }

    /// Loads a taxdump directory containing `nodes.dmp` and `names.dmp`.
    pub fn from_dump_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        Self::from_dump_files(dump_path(dir, "nodes.dmp"), dump_path(dir, "names.dmp"))
    }

    fn insert_node_record<F: AsRef<str>>(&mut self, fields: &[F]) -> bool {
        if fields.len() < 3 {
            log::debug!("Skipping node record with {} fields", fields.len());
            return false;
        }
        let (Ok(taxid), Ok(parent_taxid)) = (
            fields[0].as_ref().trim().parse::<TaxId>(),
            fields[1].as_ref().trim().parse::<TaxId>(),
        ) else {
            log::debug!("Skipping node record with non-numeric ids: {}", fields[0].as_ref());
            return false;
        };

        self.nodes.insert(
            taxid,
            TaxonNode {
                taxid,
                parent_taxid,
                rank: fields[2].as_ref().trim().to_string(),
                name: None,
            },
        );
        true
    }

    /// Returns `Ok(true)` if the record set a scientific name.
    fn merge_name_record<F: AsRef<str>>(&mut self, fields: &[F]) -> Result<bool> {
        if fields.len() < 4 || fields[3].as_ref().trim() != SCIENTIFIC_NAME {
            return Ok(false);
        }
        let Ok(taxid) = fields[0].as_ref().trim().parse::<TaxId>() else {
            return Ok(false);
        };

        let node = self.nodes.get_mut(&taxid).ok_or_else(|| {
            TaxError::Build(format!(
                "scientific name '{}' refers to taxid {} missing from nodes",
                fields[1].as_ref().trim(),
                taxid
            ))
        })?;
        node.name = Some(normalize_name(fields[1].as_ref()));
        Ok(true)
    }

    pub fn get(&self, taxid: TaxId) -> Result<&TaxonNode> {
        self.nodes.get(&taxid).ok_or(TaxError::UnknownTaxon(taxid))
    }

    pub fn parent_of(&self, taxid: TaxId) -> Result<TaxId> {
        self.get(taxid).map(|node| node.parent_taxid)
    }

    pub fn rank_of(&self, taxid: TaxId) -> Result<&str> {
        self.get(taxid).map(|node| node.rank.as_str())
    }

    /// Scientific name, or an empty string if the dump had none for this taxid.
    pub fn name_of(&self, taxid: TaxId) -> Result<&str> {
        self.get(taxid).map(|node| node.name.as_deref().unwrap_or(""))
    }

    pub fn contains(&self, taxid: TaxId) -> bool {
        self.nodes.contains_key(&taxid)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Collapses internal whitespace runs into single underscores.
fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join("_")
}
