// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Common utilities shared by the optimizer and the multilevel driver.

use foldhash::{HashMap, HashMapExt};
use indexmap::IndexSet;
use rand::prelude::*;
use rand_pcg::Pcg64;

// ============================================================================
// RNG Utilities
// ============================================================================

/// RNG used for node shuffling.
pub(crate) type ClusteringRng = Pcg64;

/// Build RNG from optional seed.
///
/// If seed is provided, creates a deterministic RNG seeded with that value.
/// Otherwise, creates an RNG seeded from the operating system's entropy source.
#[inline]
pub(crate) fn build_rng(seed: Option<u64>) -> ClusteringRng {
    match seed {
        Some(s) => Pcg64::seed_from_u64(s),
        None => Pcg64::from_os_rng(),
    }
}

/// Random permutation of `0..n`.
#[inline]
pub(crate) fn shuffled_nodes(rng: &mut ClusteringRng, n: usize) -> Vec<usize> {
    let mut nodes: Vec<usize> = (0..n).collect();
    nodes.shuffle(rng);
    nodes
}

// ============================================================================
// Label Handling
// ============================================================================

/// Renumber labels densely in order of first occurrence.
pub(crate) fn dense_labels(labels: &[usize]) -> Vec<usize> {
    let mut seen: IndexSet<usize> = IndexSet::with_capacity(labels.len());
    labels
        .iter()
        .map(|&label| seen.insert_full(label).0)
        .collect()
}

/// Relabel clusters in decreasing order of size.
///
/// Clusters of equal size are ordered by their smallest node index, so two
/// labelings of the same partition give the same output.
pub fn reindex_clusters(labels: &[usize]) -> Vec<usize> {
    let n_clusters = labels.iter().max().map_or(0, |&max| max + 1);
    let mut counts = vec![0usize; n_clusters];
    let mut first_node = vec![usize::MAX; n_clusters];
    for (node, &label) in labels.iter().enumerate() {
        counts[label] += 1;
        first_node[label] = first_node[label].min(node);
    }

    let mut order: Vec<usize> = (0..n_clusters).collect();
    order.sort_unstable_by_key(|&c| (std::cmp::Reverse(counts[c]), first_node[c]));

    let mut new_id = vec![0usize; n_clusters];
    for (rank, &cluster) in order.iter().enumerate() {
        new_id[cluster] = rank;
    }
    labels.iter().map(|&label| new_id[label]).collect()
}

/// Group nodes by their labels into clusters.
///
/// Takes a vector of labels (where labels[i] is the cluster label for node i)
/// and returns a vector of clusters (each cluster is a vector of node indices).
#[inline]
pub fn group_by_labels(labels: &[usize]) -> Vec<Vec<usize>> {
    let n = labels.len();
    let mut comms: HashMap<usize, Vec<usize>> = HashMap::with_capacity(n);
    for (node, &label) in labels.iter().enumerate() {
        comms.entry(label).or_default().push(node);
    }
    // Sort communities by their minimum node index for deterministic output order.
    let mut result: Vec<Vec<usize>> = comms.into_values().collect();
    result.sort_by_key(|comm| comm.first().copied().unwrap_or(usize::MAX));
    result
}
