// neighbors.rs — Fixed-radius neighbor lists over a feature set.
//
// Built once per joint tracking call from the positions on entry, then
// read-only while the displacement estimates change. Only valid features
// take part; invalid slots get an empty list and appear in no list.
//
// All-pairs search, O(n²). Lists are in ascending slot order, so anything
// that iterates over them is deterministic.

use crate::feature::FeatureSet;

/// One entry of a neighbor list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Slot index of the neighbor.
    pub index: usize,
    /// Euclidean distance in full-resolution pixels.
    pub distance: f32,
}

/// Per-slot lists of neighbors closer than a radius.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborIndex {
    lists: Vec<Vec<Neighbor>>,
}

impl NeighborIndex {
    /// All pairs of valid features with distance strictly below `radius`.
    pub fn build(features: &FeatureSet, radius: f32) -> Self {
        let mut lists = vec![Vec::new(); features.len()];
        // Pairs are visited in (i, j) order, so every list comes out sorted.
        let valid: Vec<_> = features.valid().collect();
        for (a, &(i, fi)) in valid.iter().enumerate() {
            for &(j, fj) in &valid[a + 1..] {
                let distance = fi.distance(fj);
                if distance < radius {
                    lists[i].push(Neighbor { index: j, distance });
                    lists[j].push(Neighbor { index: i, distance });
                }
            }
        }
        NeighborIndex { lists }
    }

    /// Neighbors of slot `i`.
    pub fn neighbors(&self, i: usize) -> &[Neighbor] {
        &self.lists[i]
    }

    /// Number of unordered neighbor pairs.
    pub fn pair_count(&self) -> usize {
        self.lists.iter().map(Vec::len).sum::<usize>() / 2
    }
}
