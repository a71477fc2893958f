//! Region Graph
//!
//! Static adjacency table over named map regions.
//!
//! The table is loaded once and never mutated. Source tables are not
//! guaranteed to be symmetric, so adjacency queries look in both directions.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};

/// Region identifier (stable string key, e.g. `"region-5"`).
pub type RegionId = String;

static NO_NEIGHBORS: BTreeSet<RegionId> = BTreeSet::new();

/// Adjacency table for the game map.
///
/// Uses BTreeMap so iteration (and therefore snapshots and logs) is ordered.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionGraph {
    adjacency: BTreeMap<RegionId, BTreeSet<RegionId>>,
}

impl RegionGraph {
    /// Build a graph from `(region, neighbors)` rows, exactly as listed.
    ///
    /// No symmetry is added: a row `A -> [B]` does not create `B -> [A]`.
    pub fn from_rows<I, R, N, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (R, N)>,
        R: Into<RegionId>,
        N: IntoIterator<Item = S>,
        S: Into<RegionId>,
    {
        let adjacency = rows
            .into_iter()
            .map(|(region, neighbors)| {
                (region.into(), neighbors.into_iter().map(Into::into).collect())
            })
            .collect();
        Self { adjacency }
    }

    /// Parse a JSON adjacency table: `{"region-0": ["region-1", ...], ...}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The 12-region map (3 rows of 4) shipped with the game client.
    pub fn standard() -> Self {
        Self::from_rows([
            ("region-0", vec!["region-1", "region-4"]),
            ("region-1", vec!["region-0", "region-2", "region-5"]),
            ("region-2", vec!["region-1", "region-3", "region-6"]),
            ("region-3", vec!["region-2", "region-7"]),
            ("region-4", vec!["region-0", "region-5", "region-8"]),
            ("region-5", vec!["region-1", "region-4", "region-6", "region-9"]),
            ("region-6", vec!["region-2", "region-5", "region-7", "region-10"]),
            ("region-7", vec!["region-3", "region-6", "region-11"]),
            ("region-8", vec!["region-4", "region-9"]),
            ("region-9", vec!["region-5", "region-8", "region-10"]),
            ("region-10", vec!["region-6", "region-9", "region-11"]),
            ("region-11", vec!["region-7", "region-10"]),
        ])
    }

    /// Neighbors listed for `region`. Unknown regions are isolated (empty set).
    pub fn neighbors(&self, region: &str) -> &BTreeSet<RegionId> {
        self.adjacency.get(region).unwrap_or(&NO_NEIGHBORS)
    }

    /// Whether `region` appears anywhere in the table, as a key or a neighbor.
    pub fn contains(&self, region: &str) -> bool {
        self.adjacency.contains_key(region)
            || self.adjacency.values().any(|n| n.contains(region))
    }

    /// All known regions, in order.
    pub fn regions(&self) -> BTreeSet<&str> {
        self.adjacency
            .iter()
            .flat_map(|(region, neighbors)| {
                std::iter::once(region.as_str()).chain(neighbors.iter().map(String::as_str))
            })
            .collect()
    }

    /// Number of known regions.
    pub fn len(&self) -> usize {
        self.regions().len()
    }

    /// True if the table has no regions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if either region lists the other as a neighbor.
    pub fn is_adjacent(&self, a: &str, b: &str) -> bool {
        self.neighbors(a).contains(b) || self.neighbors(b).contains(a)
    }

    /// True iff any region in `owned` lists `region` as a neighbor, or
    /// `region` lists any member of `owned`.
    pub fn is_adjacent_to_any<'a, I>(&self, region: &str, owned: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        owned.into_iter().any(|o| self.is_adjacent(region, o))
    }

    /// Regions that are listed one way but not the other.
    pub fn asymmetric_edges(&self) -> Vec<(&str, &str)> {
        self.adjacency
            .iter()
            .flat_map(|(region, neighbors)| {
                neighbors
                    .iter()
                    .filter(move |n| !self.neighbors(n).contains(region))
                    .map(move |n| (region.as_str(), n.as_str()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unknown_region_has_no_neighbors() {
        let graph = RegionGraph::standard();
        assert!(graph.neighbors("atlantis").is_empty());
        assert!(!graph.contains("atlantis"));
    }

    #[test]
    fn test_adjacency_checked_both_directions() {
        // B does not list A
        let graph = RegionGraph::from_rows([("A", vec!["B"])]);
        let owned = ["A"];
        assert!(graph.is_adjacent_to_any("B", owned.iter().copied()));

        let owned = ["B"];
        assert!(graph.is_adjacent_to_any("A", owned.iter().copied()));
    }

    #[test]
    fn test_not_adjacent_to_empty_set() {
        let graph = RegionGraph::standard();
        assert!(!graph.is_adjacent_to_any("region-5", std::iter::empty()));
    }

    #[test]
    fn test_standard_map_is_symmetric() {
        let graph = RegionGraph::standard();
        assert_eq!(graph.len(), 12);
        assert!(graph.asymmetric_edges().is_empty());
        assert!(graph.is_adjacent("region-5", "region-9"));
        assert!(!graph.is_adjacent("region-0", "region-5"));
    }

    #[test]
    fn test_from_json() {
        let graph = RegionGraph::from_json(r#"{"north": ["south"], "south": []}"#).unwrap();
        assert!(graph.contains("north"));
        assert!(graph.is_adjacent("south", "north"));
        assert_eq!(graph.asymmetric_edges(), vec![("north", "south")]);
    }

    #[test]
    fn test_neighbor_only_region_is_known() {
        let graph = RegionGraph::from_rows([("A", vec!["B"])]);
        assert!(graph.contains("B"));
        assert!(graph.neighbors("B").is_empty());
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_len_and_is_empty_agree() {
        let empty = RegionGraph::default();
        assert_eq!(empty.len(), 0);
        assert!(empty.is_empty());

        let isolated = RegionGraph::from_rows([("A", Vec::<&str>::new())]);
        assert_eq!(isolated.len(), 1);
        assert!(!isolated.is_empty());

        let standard = RegionGraph::standard();
        assert_eq!(standard.is_empty(), standard.len() == 0);
    }

    proptest! {
        #[test]
        fn prop_adjacency_is_direction_free(
            edges in proptest::collection::vec((0u8..8, 0u8..8), 0..20),
            a in 0u8..8,
            b in 0u8..8,
        ) {
            let mut rows: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for (from, to) in &edges {
                rows.entry(format!("r{from}")).or_default().push(format!("r{to}"));
            }
            let graph = RegionGraph::from_rows(rows);
            let (a, b) = (format!("r{a}"), format!("r{b}"));
            prop_assert_eq!(
                graph.is_adjacent_to_any(&a, [b.as_str()]),
                graph.is_adjacent_to_any(&b, [a.as_str()])
            );
        }
    }
}
