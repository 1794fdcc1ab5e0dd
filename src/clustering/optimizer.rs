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
// https://hal.archives-ouvertes.fr/hal-01231784/document

//! Local moving phase: greedy node-to-cluster reassignment on one level.
//!
//! Moving node `i` out of cluster `A` into cluster `B` changes the directed
//! modularity by `delta(B) - delta_exit(A)` with
//!
//! ```text
//! delta_exit(A) = 2 (w(i, A) - w_ii) - γ p_i (Q_A - q_i) - γ q_i (P_A - p_i)
//! delta(B)      = 2 w(i, B)          - γ p_i  Q_B        - γ q_i  P_B
//! ```
//!
//! where `w` is the symmetrized normalized adjacency, `p`/`q` the out/in node
//! masses and `P`/`Q` their running sums per cluster.

#[cfg(feature = "kernel")]
use fixedbitset::FixedBitSet;
use log::trace;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::aggregate::AggregateGraph;
use super::common::dense_labels;
use super::formats::{entries, symmetrize_scaled};
use crate::error::{Error, Result};

/// Result of one optimizer run on a level.
#[derive(Clone, Debug, PartialEq)]
pub struct Fit {
    /// Cluster of each node, dense and numbered by first occurrence.
    pub labels: Vec<usize>,
    /// Total increase of the objective over all sweeps.
    pub score: f64,
}

/// A strategy that clusters the nodes of one level.
pub trait Optimizer: Send + Sync {
    fn fit(&self, graph: &AggregateGraph) -> Result<Fit>;
}

/// Implementation used to run the sweeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// `Kernel` when compiled in, `Reference` otherwise.
    #[default]
    Default,
    /// Per-node candidate list, sorted and deduplicated.
    Reference,
    /// Dense bucket array with a bitset of touched clusters. Requires the
    /// `kernel` cargo feature.
    Kernel,
}

impl Engine {
    /// Resolve `Default` and check availability.
    pub fn resolve(self) -> Result<Engine> {
        match self {
            Engine::Default if cfg!(feature = "kernel") => Ok(Engine::Kernel),
            Engine::Default => Ok(Engine::Reference),
            Engine::Kernel if !cfg!(feature = "kernel") => Err(Error::UnsupportedEngine("kernel")),
            engine => Ok(engine),
        }
    }
}

/// Greedy modularity optimizer.
#[derive(Clone, Debug)]
pub struct GreedyModularity {
    resolution: f64,
    tolerance: f64,
    engine: Engine,
}

impl GreedyModularity {
    /// # Arguments
    /// * `resolution` - Positive multiplier of the null-model penalty
    /// * `tolerance` - Minimum increase of a sweep to run another sweep
    /// * `engine` - Sweep implementation
    pub fn new(resolution: f64, tolerance: f64, engine: Engine) -> Result<Self> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(Error::InvalidResolution(resolution));
        }
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(Error::InvalidTolerance(tolerance));
        }
        Ok(GreedyModularity {
            resolution,
            tolerance,
            engine: engine.resolve()?,
        })
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }
}

impl Optimizer for GreedyModularity {
    fn fit(&self, graph: &AggregateGraph) -> Result<Fit> {
        let level = Level::new(graph)?;
        let (labels, score) = match self.engine {
            #[cfg(feature = "kernel")]
            Engine::Kernel => kernel_sweeps(&level, self.resolution, self.tolerance),
            _ => reference_sweeps(&level, self.resolution, self.tolerance),
        };
        Ok(Fit {
            labels: dense_labels(&labels),
            score,
        })
    }
}

/// Flattened view of a level: symmetrized CSR arrays plus node masses.
struct Level<'a> {
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
    self_loops: Vec<f64>,
    out_probs: &'a [f64],
    in_probs: &'a [f64],
}

impl<'a> Level<'a> {
    fn new(graph: &'a AggregateGraph) -> Result<Self> {
        let out_probs = graph
            .out_probs()
            .as_slice()
            .ok_or_else(|| Error::InvalidInput("node masses are not contiguous".to_string()))?;
        let in_probs = match graph.in_probs() {
            Some(probs) => probs
                .as_slice()
                .ok_or_else(|| Error::InvalidInput("node masses are not contiguous".to_string()))?,
            None => out_probs,
        };

        let proxy = symmetrize_scaled(graph.norm_adjacency(), 0.5)?;
        let n = proxy.rows();
        let mut indptr = Vec::with_capacity(n + 1);
        let mut indices = Vec::with_capacity(proxy.nnz());
        let mut data = Vec::with_capacity(proxy.nnz());
        let mut self_loops = vec![0.0; n];
        indptr.push(0);
        let mut current_row = 0;
        for (row, col, weight) in entries(&proxy) {
            while current_row < row {
                indptr.push(indices.len());
                current_row += 1;
            }
            if row == col {
                self_loops[row] += weight;
            }
            indices.push(col);
            data.push(weight);
        }
        while indptr.len() <= n {
            indptr.push(indices.len());
        }

        Ok(Level {
            indptr,
            indices,
            data,
            self_loops,
            out_probs,
            in_probs,
        })
    }

    fn n_nodes(&self) -> usize {
        self.self_loops.len()
    }

    fn neighbors(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.indptr[node]..self.indptr[node + 1];
        self.indices[range.clone()]
            .iter()
            .copied()
            .zip(self.data[range].iter().copied())
    }
}

/// Running out/in mass of every cluster during one optimizer run.
struct ClusterMasses {
    out: Vec<f64>,
    inn: Vec<f64>,
}

impl ClusterMasses {
    fn singletons(level: &Level) -> Self {
        ClusterMasses {
            out: level.out_probs.to_vec(),
            inn: level.in_probs.to_vec(),
        }
    }

    fn move_node(&mut self, level: &Level, node: usize, from: usize, to: usize) {
        self.out[from] -= level.out_probs[node];
        self.inn[from] -= level.in_probs[node];
        self.out[to] += level.out_probs[node];
        self.inn[to] += level.in_probs[node];
    }
}

/// Objective terms for one node, shared by both engines.
struct NodeTerms {
    out_ratio: f64,
    in_ratio: f64,
}

impl NodeTerms {
    fn new(level: &Level, node: usize, resolution: f64) -> Self {
        NodeTerms {
            out_ratio: resolution * level.out_probs[node],
            in_ratio: resolution * level.in_probs[node],
        }
    }

    fn exit_delta(
        &self,
        level: &Level,
        masses: &ClusterMasses,
        node: usize,
        cluster: usize,
        weight_to_cluster: f64,
    ) -> f64 {
        2.0 * (weight_to_cluster - level.self_loops[node])
            - self.out_ratio * (masses.inn[cluster] - level.in_probs[node])
            - self.in_ratio * (masses.out[cluster] - level.out_probs[node])
    }

    fn join_delta(&self, masses: &ClusterMasses, cluster: usize, weight_to_cluster: f64) -> f64 {
        2.0 * weight_to_cluster
            - self.out_ratio * masses.inn[cluster]
            - self.in_ratio * masses.out[cluster]
    }
}

/// Sweeps in ascending node order until a sweep gains no more than
/// `tolerance`. Candidate clusters are collected per node, sorted and
/// deduplicated, so ties go to the lowest cluster id.
fn reference_sweeps(level: &Level, resolution: f64, tolerance: f64) -> (Vec<usize>, f64) {
    let n = level.n_nodes();
    let mut labels: Vec<usize> = (0..n).collect();
    let mut masses = ClusterMasses::singletons(level);
    let mut total_increase = 0.0;
    let mut pass = 0;

    loop {
        let mut pass_increase = 0.0;
        let mut moves = 0;

        for node in 0..n {
            let node_cluster = labels[node];
            let mut candidates: SmallVec<[usize; 16]> = level
                .neighbors(node)
                .map(|(neighbor, _)| labels[neighbor])
                .filter(|&cluster| cluster != node_cluster)
                .collect();
            if candidates.is_empty() {
                continue;
            }
            candidates.sort_unstable();
            candidates.dedup();

            // Rescans the neighbors for every candidate, O(deg²) per node; Kernel is the fast path.
            let weight_to = |cluster: usize| -> f64 {
                level
                    .neighbors(node)
                    .filter(|&(neighbor, _)| labels[neighbor] == cluster)
                    .map(|(_, weight)| weight)
                    .sum()
            };

            let terms = NodeTerms::new(level, node, resolution);
            let exit = terms.exit_delta(level, &masses, node, node_cluster, weight_to(node_cluster));

            let mut best_delta = 0.0;
            let mut best_cluster = node_cluster;
            for &cluster in &candidates {
                let delta = terms.join_delta(&masses, cluster, weight_to(cluster)) - exit;
                if delta > best_delta {
                    best_delta = delta;
                    best_cluster = cluster;
                }
            }

            if best_delta > 0.0 {
                pass_increase += best_delta;
                masses.move_node(level, node, node_cluster, best_cluster);
                labels[node] = best_cluster;
                moves += 1;
            }
        }

        pass += 1;
        total_increase += pass_increase;
        trace!("reference sweep {pass}: {moves} moves, increase {pass_increase:.6}");
        if pass_increase <= tolerance {
            break;
        }
    }

    (labels, total_increase)
}

/// Same sweeps as [`reference_sweeps`], accumulating neighbor weights in a
/// dense per-cluster buffer that is reset after each node.
#[cfg(feature = "kernel")]
fn kernel_sweeps(level: &Level, resolution: f64, tolerance: f64) -> (Vec<usize>, f64) {
    let n = level.n_nodes();
    let mut labels: Vec<usize> = (0..n).collect();
    let mut masses = ClusterMasses::singletons(level);
    let mut total_increase = 0.0;
    let mut pass = 0;

    let mut cluster_weights = vec![0.0; n];
    let mut seen = FixedBitSet::with_capacity(n);
    let mut touched: Vec<usize> = Vec::new();

    loop {
        let mut pass_increase = 0.0;
        let mut moves = 0;

        for node in 0..n {
            let node_cluster = labels[node];
            for (neighbor, weight) in level.neighbors(node) {
                let cluster = labels[neighbor];
                cluster_weights[cluster] += weight;
                if !seen.put(cluster) {
                    touched.push(cluster);
                }
            }
            touched.sort_unstable();

            if touched.iter().any(|&cluster| cluster != node_cluster) {
                let terms = NodeTerms::new(level, node, resolution);
                let exit = terms.exit_delta(
                    level,
                    &masses,
                    node,
                    node_cluster,
                    cluster_weights[node_cluster],
                );

                let mut best_delta = 0.0;
                let mut best_cluster = node_cluster;
                for &cluster in &touched {
                    if cluster == node_cluster {
                        continue;
                    }
                    let delta = terms.join_delta(&masses, cluster, cluster_weights[cluster]) - exit;
                    if delta > best_delta {
                        best_delta = delta;
                        best_cluster = cluster;
                    }
                }

                if best_delta > 0.0 {
                    pass_increase += best_delta;
                    masses.move_node(level, node, node_cluster, best_cluster);
                    labels[node] = best_cluster;
                    moves += 1;
                }
            }

            for cluster in touched.drain(..) {
                cluster_weights[cluster] = 0.0;
                seen.set(cluster, false);
            }
        }

        pass += 1;
        total_increase += pass_increase;
        trace!("kernel sweep {pass}: {moves} moves, increase {pass_increase:.6}");
        if pass_increase <= tolerance {
            break;
        }
    }

    (labels, total_increase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::formats::from_entries;
    use crate::clustering::membership::Membership;
    use crate::clustering::weights::NodeWeights;
    use sprs::CsMat;

    fn undirected(n: usize, edges: &[(usize, usize)]) -> CsMat<f64> {
        let mut triplets = Vec::new();
        for &(u, v) in edges {
            triplets.push((u, v, 1.0));
            if u != v {
                triplets.push((v, u, 1.0));
            }
        }
        from_entries((n, n), triplets)
    }

    fn triangle() -> AggregateGraph {
        let adjacency = undirected(3, &[(0, 1), (1, 2), (0, 2)]);
        AggregateGraph::new(&adjacency, &NodeWeights::Degree, Some(&NodeWeights::Degree)).unwrap()
    }

    fn two_triangles() -> AggregateGraph {
        let adjacency = undirected(6, &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5)]);
        AggregateGraph::new(&adjacency, &NodeWeights::Degree, Some(&NodeWeights::Degree)).unwrap()
    }

    fn engines() -> Vec<Engine> {
        let mut engines = vec![Engine::Reference];
        if cfg!(feature = "kernel") {
            engines.push(Engine::Kernel);
        }
        engines
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(matches!(
            GreedyModularity::new(0.0, 1e-3, Engine::Reference),
            Err(Error::InvalidResolution(_))
        ));
        assert!(matches!(
            GreedyModularity::new(1.0, -1.0, Engine::Reference),
            Err(Error::InvalidTolerance(_))
        ));
    }

    #[test]
    fn default_engine_resolves() {
        let engine = Engine::Default.resolve().unwrap();
        if cfg!(feature = "kernel") {
            assert_eq!(engine, Engine::Kernel);
        } else {
            assert_eq!(engine, Engine::Reference);
            assert!(matches!(
                Engine::Kernel.resolve(),
                Err(Error::UnsupportedEngine(_))
            ));
        }
    }

    #[test]
    fn triangle_merges_into_one_cluster() {
        for engine in engines() {
            let optimizer = GreedyModularity::new(1.0, 1e-3, engine).unwrap();
            let fit = optimizer.fit(&triangle()).unwrap();
            assert_eq!(fit.labels, vec![0, 0, 0]);
            // From -1/3 (singletons) to 0 (one cluster).
            assert!((fit.score - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn score_matches_modularity_increase() {
        for engine in engines() {
            let graph = two_triangles();
            let before = graph.modularity(1.0);
            let fit = GreedyModularity::new(1.0, 1e-3, engine)
                .unwrap()
                .fit(&graph)
                .unwrap();
            assert_eq!(fit.labels, vec![0, 0, 0, 1, 1, 1]);

            let mut after = graph.clone();
            after
                .aggregate(&Membership::from_labels(fit.labels.clone()), None)
                .unwrap();
            assert!((fit.score - 2.0 / 3.0).abs() < 1e-12);
            assert!((after.modularity(1.0) - before - fit.score).abs() < 1e-12);
        }
    }

    #[test]
    fn optimal_level_is_a_fixed_point() {
        for engine in engines() {
            let mut graph = two_triangles();
            graph
                .aggregate(&Membership::from_labels(vec![0, 0, 0, 1, 1, 1]), None)
                .unwrap();
            let fit = GreedyModularity::new(1.0, 1e-3, engine)
                .unwrap()
                .fit(&graph)
                .unwrap();
            assert_eq!(fit.labels, vec![0, 1]);
            assert_eq!(fit.score, 0.0);
        }
    }

    #[test]
    fn isolated_self_loops_do_not_move() {
        let adjacency = undirected(3, &[(0, 0), (1, 1), (2, 2)]);
        let graph =
            AggregateGraph::new(&adjacency, &NodeWeights::Degree, Some(&NodeWeights::Degree))
                .unwrap();
        let fit = GreedyModularity::new(1.0, 1e-3, Engine::Reference)
            .unwrap()
            .fit(&graph)
            .unwrap();
        assert_eq!(fit.labels, vec![0, 1, 2]);
        assert_eq!(fit.score, 0.0);
    }

    #[test]
    fn high_resolution_keeps_singletons() {
        let fit = GreedyModularity::new(10.0, 1e-3, Engine::Reference)
            .unwrap()
            .fit(&triangle())
            .unwrap();
        assert_eq!(fit.labels, vec![0, 1, 2]);
        assert_eq!(fit.score, 0.0);
    }

    #[test]
    fn directed_cycles_are_separated() {
        let adjacency = from_entries(
            (6, 6),
            vec![
                (0, 1, 1.0),
                (1, 2, 1.0),
                (2, 0, 1.0),
                (3, 4, 1.0),
                (4, 5, 1.0),
                (5, 3, 1.0),
                (2, 3, 0.1),
            ],
        );
        let graph =
            AggregateGraph::new(&adjacency, &NodeWeights::Degree, Some(&NodeWeights::Degree))
                .unwrap();
        for engine in engines() {
            let fit = GreedyModularity::new(1.0, 1e-3, engine)
                .unwrap()
                .fit(&graph)
                .unwrap();
            assert_eq!(fit.labels[0], fit.labels[1]);
            assert_eq!(fit.labels[1], fit.labels[2]);
            assert_eq!(fit.labels[3], fit.labels[4]);
            assert_eq!(fit.labels[4], fit.labels[5]);
            assert_ne!(fit.labels[0], fit.labels[3]);
            assert!(fit.score > 0.0);
        }
    }

    #[test]
    fn engines_agree() {
        let edges: Vec<(usize, usize)> = (0..12)
            .flat_map(|i| [(i, (i + 1) % 12), (i, (i + 5) % 12)])
            .collect();
        let adjacency = undirected(12, &edges);
        let graph =
            AggregateGraph::new(&adjacency, &NodeWeights::Degree, Some(&NodeWeights::Degree))
                .unwrap();
        let fits: Vec<Fit> = engines()
            .into_iter()
            .map(|engine| {
                GreedyModularity::new(1.0, 1e-3, engine)
                    .unwrap()
                    .fit(&graph)
                    .unwrap()
            })
            .collect();
        for fit in &fits[1..] {
            assert_eq!(fit.labels, fits[0].labels);
            assert!((fit.score - fits[0].score).abs() < 1e-12);
        }
    }
}
