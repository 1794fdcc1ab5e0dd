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

use sprs::CsMat;

use super::formats::{entries, from_entries};
use crate::error::{Error, Result};

/// Assignment of every node to exactly one cluster.
///
/// Equivalent to a binary `n_nodes x n_clusters` incidence matrix with a
/// single entry per row. Cluster ids may have gaps (empty clusters).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Membership {
    labels: Vec<usize>,
    n_clusters: usize,
}

impl Membership {
    /// Every node in its own cluster.
    pub fn identity(n_nodes: usize) -> Self {
        Membership {
            labels: (0..n_nodes).collect(),
            n_clusters: n_nodes,
        }
    }

    /// Membership with `max(labels) + 1` clusters.
    pub fn from_labels(labels: Vec<usize>) -> Self {
        let n_clusters = labels.iter().max().map_or(0, |&max| max + 1);
        Membership { labels, n_clusters }
    }

    /// Read a binary incidence matrix.
    ///
    /// Fails with [`Error::InvalidAssignment`] if a row has no positive entry
    /// (unassigned node) or more than one.
    pub fn from_matrix(matrix: &CsMat<f64>) -> Result<Self> {
        let (n_nodes, n_clusters) = matrix.shape();
        let mut labels = vec![usize::MAX; n_nodes];
        for (node, cluster, weight) in entries(matrix) {
            if weight <= 0.0 {
                continue;
            }
            if labels[node] != usize::MAX {
                return Err(Error::InvalidAssignment(format!(
                    "node {node} belongs to more than one cluster"
                )));
            }
            labels[node] = cluster;
        }
        if let Some(node) = labels.iter().position(|&c| c == usize::MAX) {
            return Err(Error::InvalidAssignment(format!(
                "node {node} is not assigned to any cluster"
            )));
        }
        Ok(Membership { labels, n_clusters })
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn into_labels(self) -> Vec<usize> {
        self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Binary `n_nodes x n_clusters` incidence matrix.
    pub fn to_matrix(&self) -> CsMat<f64> {
        from_entries(
            (self.len(), self.n_clusters),
            self.labels.iter().enumerate().map(|(node, &c)| (node, c, 1.0)),
        )
    }

    /// Transposed incidence matrix, `n_clusters x n_nodes`.
    pub fn to_transposed_matrix(&self) -> CsMat<f64> {
        from_entries(
            (self.n_clusters, self.len()),
            self.labels.iter().enumerate().map(|(node, &c)| (c, node, 1.0)),
        )
    }

    /// Compose with the assignment of the clusters themselves: node `i` goes
    /// to `next[self[i]]`.
    pub fn compose(&self, next: &Membership) -> Result<Membership> {
        if next.len() != self.n_clusters {
            return Err(Error::InvalidAssignment(format!(
                "cannot compose a membership with {} clusters with one over {} nodes",
                self.n_clusters,
                next.len()
            )));
        }
        Ok(Membership {
            labels: self.labels.iter().map(|&c| next.labels[c]).collect(),
            n_clusters: next.n_clusters,
        })
    }

    /// Sum `values` over the nodes of each cluster.
    pub(crate) fn group_sum<'a, I>(&self, values: I) -> Vec<f64>
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let mut sums = vec![0.0; self.n_clusters];
        for (&cluster, value) in self.labels.iter().zip(values) {
            sums[cluster] += value;
        }
        sums
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_round_trip() {
        let membership = Membership::from_labels(vec![1, 0, 1]);
        let matrix = membership.to_matrix();
        assert_eq!(matrix.shape(), (3, 2));
        assert_eq!(matrix.nnz(), 3);
        assert_eq!(Membership::from_matrix(&matrix).unwrap(), membership);
        assert_eq!(membership.to_transposed_matrix().shape(), (2, 3));
    }

    #[test]
    fn from_matrix_rejects_unassigned_nodes() {
        let matrix = from_entries((3, 2), vec![(0, 0, 1.0), (2, 1, 1.0)]);
        assert!(matches!(
            Membership::from_matrix(&matrix),
            Err(Error::InvalidAssignment(_))
        ));
        let doubled = from_entries((1, 2), vec![(0, 0, 1.0), (0, 1, 1.0)]);
        assert!(Membership::from_matrix(&doubled).is_err());
    }

    #[test]
    fn compose_is_associative() {
        let a = Membership::from_labels(vec![0, 1, 2, 2, 3]);
        let b = Membership::from_labels(vec![0, 0, 1, 2]);
        let c = Membership::from_labels(vec![1, 0, 0]);
        let left = a.compose(&b).unwrap().compose(&c).unwrap();
        let right = a.compose(&b.compose(&c).unwrap()).unwrap();
        assert_eq!(left, right);
        assert_eq!(left.labels(), &[1, 1, 0, 0, 0]);
        assert!(a.compose(&c).is_err());
    }

    #[test]
    fn identity_is_neutral() {
        let a = Membership::from_labels(vec![2, 0, 1, 0]);
        assert_eq!(Membership::identity(4).compose(&a).unwrap(), a);
        assert_eq!(a.compose(&Membership::identity(3)).unwrap(), a);
    }
}
