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
// https://arxiv.org/abs/0803.0476

use log::{debug, info, warn};
use ndarray::Array1;
use rayon::prelude::*;
use sprs::CsMat;

use super::aggregate::AggregateGraph;
use super::common::{build_rng, reindex_clusters, shuffled_nodes, ClusteringRng};
use super::config::LouvainConfig;
use super::formats::{
    bipartite_to_directed, bipartite_to_undirected, check_format, directed_to_undirected,
    inverse_permutation, permute, total_weight, transpose,
};
use super::membership::Membership;
use super::optimizer::{GreedyModularity, Optimizer};
use super::weights::{node_probs, NodeWeights};
use crate::error::{Error, Result};

/// Output of a Louvain run.
#[derive(Clone, Debug)]
pub struct LouvainResult {
    /// Cluster of each node (rows of a biadjacency).
    pub labels: Vec<usize>,
    /// Cluster of each column of a biadjacency.
    pub secondary_labels: Option<Vec<usize>>,
    /// Number of optimizer runs.
    pub iteration_count: usize,
    /// Score of every optimizer run, in order.
    pub level_scores: Vec<f64>,
    /// Modularity of the final partition of the preprocessed graph.
    pub modularity: f64,
    /// Adjacency of the final aggregate graph, scaled back to the total
    /// weight of the preprocessed graph.
    pub aggregate_adjacency: CsMat<f64>,
}

impl LouvainResult {
    /// Number of distinct clusters over all nodes.
    pub fn n_clusters(&self) -> usize {
        self.labels
            .iter()
            .chain(self.secondary_labels.iter().flatten())
            .max()
            .map_or(0, |&max| max + 1)
    }
}

/// Graph ready for clustering: square adjacency and resolved node masses.
struct Prepared {
    adjacency: CsMat<f64>,
    out_probs: Array1<f64>,
    in_probs: Array1<f64>,
}

/// Multilevel Louvain clustering.
///
/// Runs the optimizer on the graph, aggregates each cluster into a node and
/// repeats until the optimizer no longer improves the objective by more
/// than `aggregation_tolerance`, the graph collapses to a single node or the
/// iteration cap is reached.
pub struct Louvain {
    config: LouvainConfig,
    optimizer: Box<dyn Optimizer>,
}

impl Louvain {
    /// Louvain with the greedy modularity optimizer.
    pub fn new(config: LouvainConfig) -> Result<Self> {
        config.validate()?;
        let optimizer =
            GreedyModularity::new(config.resolution, config.tolerance, config.engine)?;
        Ok(Louvain {
            config,
            optimizer: Box::new(optimizer),
        })
    }

    /// Louvain with a custom optimization strategy.
    pub fn with_optimizer(config: LouvainConfig, optimizer: Box<dyn Optimizer>) -> Result<Self> {
        config.validate()?;
        Ok(Louvain { config, optimizer })
    }

    pub fn config(&self) -> &LouvainConfig {
        &self.config
    }

    /// Cluster the nodes of an adjacency or biadjacency matrix.
    ///
    /// A rectangular matrix, or any matrix with `force_bipartite`, is read as
    /// a biadjacency: rows get `labels`, columns get `secondary_labels`.
    pub fn fit(&self, adjacency: &CsMat<f64>) -> Result<LouvainResult> {
        let mut rng = build_rng(self.config.seed);
        self.run(adjacency, &mut rng, self.config.shuffle_nodes)
    }

    /// Independent shuffled runs, one per seed, executed in parallel.
    pub fn fit_trials(&self, adjacency: &CsMat<f64>, seeds: &[u64]) -> Result<Vec<LouvainResult>> {
        seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = build_rng(Some(seed));
                self.run(adjacency, &mut rng, true)
            })
            .collect()
    }

    /// The trial with the highest modularity (the first one on ties).
    pub fn fit_best(&self, adjacency: &CsMat<f64>, seeds: &[u64]) -> Result<LouvainResult> {
        self.fit_trials(adjacency, seeds)?
            .into_iter()
            .reduce(|best, trial| {
                if trial.modularity > best.modularity {
                    trial
                } else {
                    best
                }
            })
            .ok_or(Error::InvalidConfiguration {
                name: "seeds",
                message: "at least one seed is required".to_string(),
            })
    }

    fn run(
        &self,
        adjacency: &CsMat<f64>,
        rng: &mut ClusteringRng,
        shuffle: bool,
    ) -> Result<LouvainResult> {
        let adjacency = check_format(adjacency)?;
        let (n1, n2) = adjacency.shape();
        let bipartite = n1 != n2 || self.config.force_bipartite;

        if total_weight(&adjacency) <= 0.0 {
            return Ok(self.singletons(&adjacency, bipartite));
        }

        let prepared = self.prepare(&adjacency, bipartite)?;
        let n = prepared.adjacency.rows();
        let total = total_weight(&prepared.adjacency);

        let nodes: Vec<usize> = if shuffle {
            shuffled_nodes(rng, n)
        } else {
            (0..n).collect()
        };
        let (adjacency, out_probs, in_probs) = if shuffle {
            (
                permute(&prepared.adjacency, &nodes)?,
                nodes.iter().map(|&i| prepared.out_probs[i]).collect(),
                nodes.iter().map(|&i| prepared.in_probs[i]).collect(),
            )
        } else {
            (prepared.adjacency, prepared.out_probs, prepared.in_probs)
        };

        let mut graph = AggregateGraph::from_probs(&adjacency, out_probs, Some(in_probs))?;
        let mut membership = Membership::identity(n);
        let mut iteration_count = 0;
        let mut level_scores = Vec::new();
        let cap = self.config.iteration_cap();

        info!("louvain: starting with {} nodes", graph.n_nodes());
        loop {
            iteration_count += 1;
            let fit = self.optimizer.fit(&graph)?;
            level_scores.push(fit.score);

            if fit.score <= self.config.aggregation_tolerance {
                debug!(
                    "iteration {iteration_count}: increase {:.6} below aggregation tolerance",
                    fit.score
                );
                break;
            }

            let level = Membership::from_labels(fit.labels);
            membership = membership.compose(&level)?;
            graph.aggregate(&level, None)?;
            debug!(
                "iteration {iteration_count} completed with {} clusters and {:.6} increase",
                graph.n_nodes(),
                fit.score
            );

            if graph.n_nodes() == 1 || cap == Some(iteration_count) {
                break;
            }
        }

        let mut labels = membership.into_labels();
        if shuffle {
            let position = inverse_permutation(&nodes)?;
            labels = position.iter().map(|&k| labels[k]).collect();
        }
        if self.config.sort_clusters {
            labels = reindex_clusters(&labels);
        }
        let secondary_labels = bipartite.then(|| labels.split_off(n1));
        let modularity = graph.modularity(self.config.resolution);
        info!(
            "louvain: {} clusters after {iteration_count} iterations, modularity {modularity:.6}",
            graph.n_nodes()
        );

        Ok(LouvainResult {
            labels,
            secondary_labels,
            iteration_count,
            level_scores,
            modularity,
            aggregate_adjacency: graph.scaled_adjacency(total),
        })
    }

    /// Apply the direction and bipartite transforms and resolve node masses.
    fn prepare(&self, adjacency: &CsMat<f64>, bipartite: bool) -> Result<Prepared> {
        let weights = &self.config.node_weighting;

        if !bipartite {
            let adjacency = if self.config.force_undirected {
                directed_to_undirected(adjacency)?
            } else {
                adjacency.clone()
            };
            let out_probs = node_probs(weights, &adjacency)?;
            let in_probs = node_probs(weights, &transpose(&adjacency))?;
            return Ok(Prepared {
                adjacency,
                out_probs,
                in_probs,
            });
        }

        if self.config.force_undirected {
            let adjacency = bipartite_to_undirected(adjacency);
            let probs = node_probs(weights, &adjacency)?;
            return Ok(Prepared {
                adjacency,
                out_probs: probs.clone(),
                in_probs: probs,
            });
        }

        let (n1, n2) = adjacency.shape();
        let secondary_weights = match &self.config.secondary_node_weighting {
            Some(secondary) => secondary.clone(),
            None if weights.is_named() => weights.clone(),
            None => {
                warn!("secondary node weights have been set to 'degree'");
                NodeWeights::Degree
            }
        };
        let primary = node_probs(weights, adjacency)?;
        let secondary = node_probs(&secondary_weights, &transpose(adjacency))?;

        Ok(Prepared {
            adjacency: bipartite_to_directed(adjacency),
            out_probs: primary
                .iter()
                .copied()
                .chain(std::iter::repeat(0.0).take(n2))
                .collect(),
            in_probs: std::iter::repeat(0.0)
                .take(n1)
                .chain(secondary.iter().copied())
                .collect(),
        })
    }

    /// Result for a graph without edge mass: every node is its own cluster.
    fn singletons(&self, adjacency: &CsMat<f64>, bipartite: bool) -> LouvainResult {
        let (n1, n2) = adjacency.shape();
        let n = if bipartite { n1 + n2 } else { n1 };
        let mut labels: Vec<usize> = (0..n).collect();
        let secondary_labels = bipartite.then(|| labels.split_off(n1));
        LouvainResult {
            labels,
            secondary_labels,
            iteration_count: 0,
            level_scores: Vec::new(),
            modularity: 0.0,
            aggregate_adjacency: CsMat::zero((n, n)),
        }
    }
}
