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

use ndarray::Array1;
use sprs::CsMat;

use super::formats::{check_format, entries, from_entries, total_weight, transpose};
use super::membership::Membership;
use super::weights::{node_probs, NodeWeights};
use crate::error::{Error, Result};

const MASS_TOLERANCE: f64 = 1e-9;

/// Graph at one level of the multilevel hierarchy; each node is a cluster of
/// the level below.
///
/// The adjacency is normalized to unit total mass. `out_probs` and
/// `in_probs` are the node mass distributions used by the null model; a
/// missing `in_probs` means the out-distribution is used for both sides.
#[derive(Clone, Debug)]
pub struct AggregateGraph {
    n_nodes: usize,
    norm_adjacency: CsMat<f64>,
    out_probs: Array1<f64>,
    in_probs: Option<Array1<f64>>,
}

impl AggregateGraph {
    /// Create an AggregateGraph from a square adjacency matrix
    ///
    /// # Arguments
    /// * `adjacency` - Non-negative weighted adjacency
    /// * `out_weights` - Policy for the out-mass of nodes (row sums for `Degree`)
    /// * `in_weights` - Policy for the in-mass of nodes (column sums for
    ///   `Degree`); `None` leaves the graph in undirected mode
    pub fn new(
        adjacency: &CsMat<f64>,
        out_weights: &NodeWeights,
        in_weights: Option<&NodeWeights>,
    ) -> Result<Self> {
        let adjacency = check_format(adjacency)?;
        let out_probs = node_probs(out_weights, &adjacency)?;
        let in_probs = match in_weights {
            Some(weights) => Some(node_probs(weights, &transpose(&adjacency))?),
            None => None,
        };
        Self::from_probs(&adjacency, out_probs, in_probs)
    }

    /// Create an AggregateGraph from already computed mass distributions.
    pub fn from_probs(
        adjacency: &CsMat<f64>,
        out_probs: Array1<f64>,
        in_probs: Option<Array1<f64>>,
    ) -> Result<Self> {
        let (rows, cols) = adjacency.shape();
        if rows != cols {
            return Err(Error::InvalidInput(format!(
                "expected a square adjacency, got {rows}x{cols}"
            )));
        }
        let total = total_weight(adjacency);
        if !total.is_finite() || total <= 0.0 {
            return Err(Error::InvalidInput(
                "adjacency has no positive edge weight".to_string(),
            ));
        }
        for probs in std::iter::once(&out_probs).chain(in_probs.as_ref()) {
            if probs.len() != rows {
                return Err(Error::InvalidInput(format!(
                    "expected {rows} node masses, got {}",
                    probs.len()
                )));
            }
            if (probs.sum() - 1.0).abs() > MASS_TOLERANCE {
                return Err(Error::InvalidInput(format!(
                    "node masses must sum to 1, got {}",
                    probs.sum()
                )));
            }
        }

        let norm_adjacency = from_entries(
            (rows, cols),
            entries(adjacency)
                .into_iter()
                .map(|(i, j, w)| (i, j, w / total)),
        );
        Ok(AggregateGraph {
            n_nodes: rows,
            norm_adjacency,
            out_probs,
            in_probs,
        })
    }

    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    /// Normalized adjacency (entries sum to 1).
    pub fn norm_adjacency(&self) -> &CsMat<f64> {
        &self.norm_adjacency
    }

    pub fn out_probs(&self) -> &Array1<f64> {
        &self.out_probs
    }

    pub fn in_probs(&self) -> Option<&Array1<f64>> {
        self.in_probs.as_ref()
    }

    /// Aggregates nodes belonging to the same cluster.
    ///
    /// The new adjacency is `Rᵗ · A · C` where `R` is the incidence matrix of
    /// `rows` and `C` that of `cols` (or `rows` when `cols` is `None`). Node
    /// masses are summed per cluster: out-masses by `rows`, in-masses by
    /// `cols` when given. The graph is left untouched if the assignment does
    /// not match its dimensions.
    pub fn aggregate(
        &mut self,
        rows: &Membership,
        cols: Option<&Membership>,
    ) -> Result<&mut Self> {
        let (n_rows, n_cols) = self.norm_adjacency.shape();
        if rows.len() != n_rows {
            return Err(Error::InvalidAssignment(format!(
                "row assignment covers {} nodes, graph has {n_rows}",
                rows.len()
            )));
        }
        if let Some(cols) = cols {
            if cols.len() != n_cols {
                return Err(Error::InvalidAssignment(format!(
                    "column assignment covers {} nodes, graph has {n_cols}",
                    cols.len()
                )));
            }
        }

        let left = rows.to_transposed_matrix();
        let right = cols.unwrap_or(rows).to_matrix();
        let norm_adjacency: CsMat<f64> = &(&left * &self.norm_adjacency) * &right;

        let out_probs = Array1::from_vec(rows.group_sum(&self.out_probs));
        let in_probs = self
            .in_probs
            .as_ref()
            .map(|probs| Array1::from_vec(cols.unwrap_or(rows).group_sum(probs)));

        self.n_nodes = norm_adjacency.rows();
        self.norm_adjacency = norm_adjacency;
        self.out_probs = out_probs;
        self.in_probs = in_probs;
        Ok(self)
    }

    /// Modularity of the partition this level represents:
    /// `Σ_c A_cc − resolution · Σ_c out_c · in_c`.
    pub fn modularity(&self, resolution: f64) -> f64 {
        let internal: f64 = entries(&self.norm_adjacency)
            .into_iter()
            .filter(|(i, j, _)| i == j)
            .map(|(_, _, w)| w)
            .sum();
        let in_probs = self.in_probs.as_ref().unwrap_or(&self.out_probs);
        let expected: f64 = self
            .out_probs
            .iter()
            .zip(in_probs.iter())
            .map(|(p, q)| p * q)
            .sum();
        internal - resolution * expected
    }

    /// Current adjacency rescaled to the given total weight.
    pub(crate) fn scaled_adjacency(&self, total: f64) -> CsMat<f64> {
        from_entries(
            self.norm_adjacency.shape(),
            entries(&self.norm_adjacency)
                .into_iter()
                .map(|(i, j, w)| (i, j, w * total)),
        )
    }
}
