//src/lineage.rs

use ahash::{AHashMap, AHashSet};
use std::fmt;

use crate::error::{Result, TaxError};
use crate::taxdb::TaxonomyGraph;
use crate::types::{TaxId, ROOT_TAXID};

/// Original taxid -> ancestor taxid at a target rank.
pub type TaxidRemap = AHashMap<TaxId, TaxId>;

/// Value stored in a lineage slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineageValue {
    Name(String),
    TaxId(TaxId),
}

impl fmt::Display for LineageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineageValue::Name(name) => f.write_str(name),
            LineageValue::TaxId(taxid) => write!(f, "{taxid}"),
        }
    }
}

/// Ranks in caller order, each mapped to a value or left unresolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineage {
    slots: Vec<(String, Option<LineageValue>)>,
}

impl Lineage {
    /// A lineage with every wanted rank unresolved.
    pub fn new<S: AsRef<str>>(wanted_ranks: &[S]) -> Self {
        let mut slots: Vec<(String, Option<LineageValue>)> = Vec::with_capacity(wanted_ranks.len());
        for rank in wanted_ranks {
            if !slots.iter().any(|(r, _)| r == rank.as_ref()) {
                slots.push((rank.as_ref().to_string(), None));
            }
        }
        Self { slots }
    }

    pub fn get(&self, rank: &str) -> Option<&LineageValue> {
        self.slots
            .iter()
            .find(|(r, _)| r == rank)
            .and_then(|(_, value)| value.as_ref())
    }

    pub fn contains_rank(&self, rank: &str) -> bool {
        self.slots.iter().any(|(r, _)| r == rank)
    }

    /// Fills `rank` unless it is already set. Returns whether the value was stored.
    fn set_if_empty(&mut self, rank: &str, value: LineageValue) -> bool {
        match self.slots.iter_mut().find(|(r, _)| r == rank) {
            Some((_, slot @ None)) => {
                *slot = Some(value);
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&LineageValue>)> {
        self.slots.iter().map(|(rank, value)| (rank.as_str(), value.as_ref()))
    }

    pub fn ranks(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(rank, _)| rank.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.slots.iter().all(|(_, value)| value.is_some())
    }
}

/// Walks from `taxid` toward the root looking for `target_rank`.
///
/// `Ok(None)` when the root is reached first, `Err` when the walk meets a taxid
/// that is not in the graph.
fn walk_to_rank(taxa: &TaxonomyGraph, first_taxid: TaxId, target_rank: &str) -> Result<Option<TaxId>> {
    let mut taxid = first_taxid;
    // a well-formed taxonomy never needs more steps than it has nodes
    let mut steps = 0usize;
    while taxid > ROOT_TAXID {
        let node = taxa.get(taxid)?;
        if node.rank == target_rank {
            return Ok(Some(taxid));
        }
        steps += 1;
        if steps > taxa.len() {
            return Err(TaxError::ParentCycle(first_taxid));
        }
        taxid = node.parent_taxid;
    }
    Ok(None)
}

/// Returns the closest ancestor of `first_taxid` (itself included) with rank
/// `target_rank`.
///
/// Falls back to `first_taxid` when no ancestor has that rank, or when the walk
/// meets a taxid missing from the graph.
pub fn ancestor_at_rank(taxa: &TaxonomyGraph, first_taxid: TaxId, target_rank: &str) -> TaxId {
    match walk_to_rank(taxa, first_taxid, target_rank) {
        Ok(Some(ancestor)) => ancestor,
        Ok(None) => first_taxid,
        Err(e) => {
            log::warn!("{e}. Unable to get ancestor of {first_taxid} at rank {target_rank}");
            first_taxid
        }
    }
}

/// True if `first_taxid` or one of its ancestors below the root is in `ancestors`.
pub fn is_descendant_of(taxa: &TaxonomyGraph, first_taxid: TaxId, ancestors: &AHashSet<TaxId>) -> bool {
    let mut taxid = first_taxid;
    let mut steps = 0usize;
    while taxid > ROOT_TAXID && steps <= taxa.len() {
        if ancestors.contains(&taxid) {
            return true;
        }
        match taxa.parent_of(taxid) {
            Ok(parent) => taxid = parent,
            Err(e) => {
                log::warn!("{e}. Stopping ancestry check of {first_taxid}");
                return false;
            }
        }
        steps += 1;
    }
    false
}

/// Collects the ancestors of `first_taxid` at `wanted_ranks`, keeping the
/// caller's rank order. Ranks with no ancestor stay unresolved.
///
/// With `use_taxids` the slots hold taxids instead of scientific names.
pub fn lineage<S: AsRef<str>>(
    taxa: &TaxonomyGraph,
    first_taxid: TaxId,
    wanted_ranks: &[S],
    use_taxids: bool,
) -> Lineage {
    let mut lineage = Lineage::new(wanted_ranks);
    let mut taxid = first_taxid;
    let mut steps = 0usize;

    while taxid > ROOT_TAXID && steps <= taxa.len() {
        let node = match taxa.get(taxid) {
            Ok(node) => node,
            Err(e) => {
                log::warn!("{e}. Lineage of {first_taxid} is incomplete");
                break;
            }
        };
        if lineage.contains_rank(&node.rank) {
            // a nameless node leaves its rank unresolved
            let value = if use_taxids {
                Some(LineageValue::TaxId(taxid))
            } else {
                node.name.clone().map(LineageValue::Name)
            };
            if let Some(value) = value {
                lineage.set_if_empty(&node.rank, value);
            }
        }
        taxid = node.parent_taxid;
        steps += 1;
    }
    lineage
}

/// Drops unresolved ranks, keeping the order of the rest.
pub fn prune_empty(lineage: &Lineage) -> Lineage {
    Lineage {
        slots: lineage
            .slots
            .iter()
            .filter(|(_, value)| value.is_some())
            .cloned()
            .collect(),
    }
}

/// Maps each taxid to its ancestor at `target_rank`.
///
/// Unlike [`ancestor_at_rank`], taxids that never reach the rank (or whose walk
/// hits a missing taxid) get no entry: they cannot be summarized at that rank.
pub fn build_rank_remap<I>(taxa: &TaxonomyGraph, taxids: I, target_rank: &str) -> TaxidRemap
where
    I: IntoIterator<Item = TaxId>,
{
    let mut remap = TaxidRemap::new();
    for taxid in taxids {
        if remap.contains_key(&taxid) {
            continue;
        }
        match walk_to_rank(taxa, taxid, target_rank) {
            Ok(Some(ancestor)) => {
                remap.insert(taxid, ancestor);
            }
            Ok(None) => {}
            Err(e) => log::debug!("{e}. Taxid {taxid} left out of the {target_rank} remap"),
        }
    }
    remap
}

/// `;`-joined values of the resolved ranks.
pub fn format_lineage(lineage: &Lineage) -> String {
    prune_empty(lineage)
        .iter()
        .filter_map(|(_, value)| value.map(ToString::to_string))
        .collect::<Vec<_>>()
        .join(";")
}

/// GTDB-style `d__X;p__Y;...` string. Unresolved ranks keep their empty prefix.
pub fn format_sylph_lineage(lineage: &Lineage) -> String {
    lineage
        .iter()
        .map(|(rank, value)| {
            let value = value.map(ToString::to_string).unwrap_or_default();
            format!("{}__{}", rank_prefix(rank), value)
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn rank_prefix(rank: &str) -> char {
    match rank {
        "superkingdom" | "domain" => 'd',
        other => other.chars().next().unwrap_or('x'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxdb::tests::ecoli_taxonomy;
    use crate::types::CANONICAL_RANKS;

    fn tiny_taxonomy() -> TaxonomyGraph {
        let nodes = vec![
            vec!["1", "1", "no rank"],
            vec!["2", "1", "superkingdom"],
            vec!["10", "2", "species"],
        ];
        let names = vec![
            vec!["2", "Bacteria", "", "scientific name"],
            vec!["10", "Example species", "", "scientific name"],
        ];
        TaxonomyGraph::build(nodes, names).unwrap()
    }

    /// 60 (species) -> 50 (genus) -> 40, which has no node.
    fn broken_taxonomy() -> TaxonomyGraph {
        let nodes = vec![
            vec!["1", "1", "no rank"],
            vec!["50", "40", "genus"],
            vec!["60", "50", "species"],
            vec!["70", "50", "species"],
        ];
        let names = vec![
            vec!["50", "G", "", "scientific name"],
            vec!["60", "S", "", "scientific name"],
        ];
        TaxonomyGraph::build(nodes, names).unwrap()
    }

    fn name(value: &str) -> LineageValue {
        LineageValue::Name(value.to_string())
    }

    #[test]
    fn test_lineage_of_tiny_taxonomy() {
        let taxa = tiny_taxonomy();
        let lin = lineage(&taxa, 10, &["superkingdom", "species"], false);
        let entries: Vec<_> = lin.iter().collect();
        assert_eq!(
            entries,
            vec![
                ("superkingdom", Some(&name("Bacteria"))),
                ("species", Some(&name("Example_species"))),
            ]
        );
    }

    #[test]
    fn test_lineage_keeps_caller_order_and_unresolved_ranks() {
        let taxa = ecoli_taxonomy();
        let ranks = ["species", "kingdom", "superkingdom", "genus"];
        let lin = lineage(&taxa, 83333, &ranks, false);

        assert_eq!(lin.ranks().collect::<Vec<_>>(), ranks.to_vec());
        assert_eq!(lin.get("species"), Some(&name("Escherichia_coli")));
        assert_eq!(lin.get("kingdom"), None);
        assert!(lin.contains_rank("kingdom"));
        assert!(!lin.contains_rank("strain"));
        assert!(!lin.is_fully_resolved());
    }

    #[test]
    fn test_lineage_with_taxids() {
        let taxa = ecoli_taxonomy();
        let lin = lineage(&taxa, 562, &CANONICAL_RANKS, true);
        let values: Vec<_> = lin.iter().map(|(_, v)| v.cloned()).collect();
        let expected: Vec<_> = [2, 1224, 1236, 91347, 543, 561, 562]
            .into_iter()
            .map(|t| Some(LineageValue::TaxId(t)))
            .collect();
        assert_eq!(values, expected);
        assert!(lin.is_fully_resolved());
    }

    #[test]
    fn test_lineage_of_missing_or_unclassified_taxid() {
        let taxa = ecoli_taxonomy();
        for taxid in [0, 9606] {
            let lin = lineage(&taxa, taxid, &CANONICAL_RANKS, false);
            assert_eq!(lin.len(), CANONICAL_RANKS.len());
            assert!(prune_empty(&lin).is_empty());
        }
    }

    #[test]
    fn test_prune_empty_is_ordered_sub_mapping() {
        let taxa = ecoli_taxonomy();
        let lin = lineage(&taxa, 10, &CANONICAL_RANKS, false);
        let pruned = prune_empty(&lin);

        assert_eq!(pruned.ranks().collect::<Vec<_>>(), vec!["superkingdom", "species"]);
        for (rank, value) in pruned.iter() {
            assert!(value.is_some());
            assert_eq!(lin.get(rank), value);
        }
    }

    #[test]
    fn test_ancestor_at_rank() {
        let taxa = ecoli_taxonomy();
        assert_eq!(ancestor_at_rank(&taxa, 83333, "species"), 562);
        assert_eq!(ancestor_at_rank(&taxa, 83333, "genus"), 561);
        assert_eq!(ancestor_at_rank(&taxa, 562, "species"), 562);
        assert_eq!(ancestor_at_rank(&taxa, 562, "phylum"), 1224);
    }

    #[test]
    fn test_ancestor_at_rank_falls_back_to_original() {
        let taxa = tiny_taxonomy();
        assert_eq!(ancestor_at_rank(&taxa, 10, "genus"), 10);
        // missing taxids are recovered, not fatal
        assert_eq!(ancestor_at_rank(&taxa, 777, "genus"), 777);
    }

    #[test]
    fn test_ancestor_at_rank_is_idempotent() {
        let taxa = ecoli_taxonomy();
        for taxid in [1, 2, 10, 561, 562, 83333, 28384, 9606] {
            for rank in ["species", "genus", "superkingdom", "kingdom"] {
                let once = ancestor_at_rank(&taxa, taxid, rank);
                assert_eq!(ancestor_at_rank(&taxa, once, rank), once);
            }
        }
    }

    #[test]
    fn test_ancestor_at_rank_survives_parent_cycle() {
        let nodes = vec![
            vec!["1", "1", "no rank"],
            vec!["5", "6", "no rank"],
            vec!["6", "5", "no rank"],
        ];
        let names: Vec<Vec<&str>> = Vec::new();
        let taxa = TaxonomyGraph::build(nodes, names).unwrap();
        assert_eq!(ancestor_at_rank(&taxa, 5, "genus"), 5);
        assert!(build_rank_remap(&taxa, [5], "genus").is_empty());
    }

    #[test]
    fn test_build_rank_remap_drops_unresolved() {
        let taxa = tiny_taxonomy();
        assert!(build_rank_remap(&taxa, [10], "genus").is_empty());

        let taxa = ecoli_taxonomy();
        let remap = build_rank_remap(&taxa, [83333, 562, 561, 10, 9606, 0], "species");
        assert_eq!(remap.len(), 3);
        assert_eq!(remap[&83333], 562);
        assert_eq!(remap[&562], 562);
        assert_eq!(remap[&10], 10);
        assert!(!remap.contains_key(&561));
        assert!(!remap.contains_key(&9606));
    }

    #[test]
    fn test_walk_through_missing_parent() {
        let taxa = broken_taxonomy();
        assert_eq!(ancestor_at_rank(&taxa, 60, "phylum"), 60);
        assert_eq!(ancestor_at_rank(&taxa, 60, "genus"), 50);

        assert!(build_rank_remap(&taxa, [60, 50], "phylum").is_empty());
        let remap = build_rank_remap(&taxa, [60], "genus");
        assert_eq!(remap.len(), 1);
        assert_eq!(remap[&60], 50);

        let lin = lineage(&taxa, 60, &["phylum", "genus", "species"], false);
        assert_eq!(lin.get("phylum"), None);
        assert_eq!(lin.get("genus"), Some(&name("G")));
        assert_eq!(format_lineage(&lin), "G;S");
        assert_eq!(format_sylph_lineage(&lin), "p__;g__G;s__S");

        let expected: AHashSet<TaxId> = [2].into_iter().collect();
        assert!(!is_descendant_of(&taxa, 60, &expected));
    }

    #[test]
    fn test_nameless_node_stays_unresolved() {
        let taxa = broken_taxonomy();
        let lin = lineage(&taxa, 70, &["genus", "species"], false);
        assert_eq!(lin.get("species"), None);
        assert_eq!(format_lineage(&lin), "G");

        let lin = lineage(&taxa, 70, &["genus", "species"], true);
        assert_eq!(lin.get("species"), Some(&LineageValue::TaxId(70)));
    }

    #[test]
    fn test_parent_cycle_is_its_own_error() {
        let nodes = vec![vec!["1", "1", "no rank"], vec!["5", "6", "no rank"], vec!["6", "5", "no rank"]];
        let names: Vec<Vec<&str>> = Vec::new();
        let taxa = TaxonomyGraph::build(nodes, names).unwrap();
        assert!(matches!(walk_to_rank(&taxa, 5, "genus"), Err(TaxError::ParentCycle(5))));
    }

    #[test]
    fn test_is_descendant_of() {
        let taxa = ecoli_taxonomy();
        let expected: AHashSet<TaxId> = [561].into_iter().collect();
        assert!(is_descendant_of(&taxa, 83333, &expected));
        assert!(is_descendant_of(&taxa, 561, &expected));
        assert!(!is_descendant_of(&taxa, 543, &expected));
        assert!(!is_descendant_of(&taxa, 10, &expected));
        assert!(!is_descendant_of(&taxa, 9606, &expected));
    }

    #[test]
    fn test_format_lineage() {
        let taxa = ecoli_taxonomy();
        let lin = lineage(&taxa, 10, &CANONICAL_RANKS, false);
        assert_eq!(format_lineage(&lin), "Bacteria;Example_species");
        assert_eq!(
            format_sylph_lineage(&lin),
            "d__Bacteria;p__;c__;o__;f__;g__;s__Example_species"
        );

        let lin = lineage(&taxa, 562, &CANONICAL_RANKS, true);
        assert_eq!(
            format_sylph_lineage(&lin),
            "d__2;p__1224;c__1236;o__91347;f__543;g__561;s__562"
        );
    }
}
