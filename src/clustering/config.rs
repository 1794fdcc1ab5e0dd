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

use serde::{Deserialize, Serialize};

use super::optimizer::Engine;
use super::weights::NodeWeights;
use crate::error::{Error, Result};

/// Options of a [`Louvain`](super::Louvain) run.
///
/// Missing fields take their default value when deserialized, so a JSON
/// document only needs the options it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LouvainConfig {
    /// Resolution parameter. Higher values yield smaller clusters.
    pub resolution: f64,
    /// Minimum increase of a sweep to run another sweep.
    pub tolerance: f64,
    /// Minimum increase of a level to aggregate and run another level.
    pub aggregation_tolerance: f64,
    /// Maximum number of levels; a negative value means no limit.
    pub max_aggregation_iterations: i64,
    /// Randomly permute the nodes before optimization.
    pub shuffle_nodes: bool,
    /// Seed of the shuffle; `None` draws from the OS.
    pub seed: Option<u64>,
    /// Treat the graph as undirected.
    pub force_undirected: bool,
    /// Treat a square matrix as a biadjacency matrix.
    pub force_bipartite: bool,
    /// Weights of nodes (undirected graphs) or out-weights (directed graphs).
    pub node_weighting: NodeWeights,
    /// Weights of secondary nodes (bipartite graphs). `None` reuses
    /// `node_weighting` when it is `Degree` or `Uniform`.
    pub secondary_node_weighting: Option<NodeWeights>,
    /// Relabel clusters in decreasing order of size.
    pub sort_clusters: bool,
    pub engine: Engine,
}

impl Default for LouvainConfig {
    fn default() -> Self {
        LouvainConfig {
            resolution: 1.0,
            tolerance: 1e-3,
            aggregation_tolerance: 1e-3,
            max_aggregation_iterations: -1,
            shuffle_nodes: false,
            seed: None,
            force_undirected: false,
            force_bipartite: false,
            node_weighting: NodeWeights::Degree,
            secondary_node_weighting: None,
            sort_clusters: true,
            engine: Engine::Default,
        }
    }
}

impl LouvainConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LouvainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(Error::InvalidResolution(self.resolution));
        }
        for tolerance in [self.tolerance, self.aggregation_tolerance] {
            if !tolerance.is_finite() || tolerance < 0.0 {
                return Err(Error::InvalidTolerance(tolerance));
            }
        }
        if self.max_aggregation_iterations == 0 {
            return Err(Error::InvalidConfiguration {
                name: "max_aggregation_iterations",
                message: "must be positive, or negative for no limit".to_string(),
            });
        }
        Ok(())
    }

    /// Iteration cap, `None` when unlimited.
    pub(crate) fn iteration_cap(&self) -> Option<usize> {
        usize::try_from(self.max_aggregation_iterations).ok()
    }

    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_shuffle(mut self, seed: Option<u64>) -> Self {
        self.shuffle_nodes = true;
        self.seed = seed;
        self
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config = LouvainConfig::from_json(r#"{"resolution": 2.0, "engine": "reference"}"#).unwrap();
        assert_eq!(config.resolution, 2.0);
        assert_eq!(config.engine, Engine::Reference);
        assert_eq!(config.tolerance, 1e-3);
        assert!(config.sort_clusters);
        assert_eq!(config.iteration_cap(), None);
    }

    #[test]
    fn json_round_trip() {
        let config = LouvainConfig {
            node_weighting: NodeWeights::Custom(vec![1.0, 2.0]),
            max_aggregation_iterations: 3,
            ..LouvainConfig::default()
        }
        .with_shuffle(Some(5));
        let json = serde_json::to_string(&config).unwrap();
        let parsed = LouvainConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.iteration_cap(), Some(3));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            LouvainConfig::default().with_resolution(-1.0).validate(),
            Err(Error::InvalidResolution(_))
        ));
        let config = LouvainConfig {
            aggregation_tolerance: -0.5,
            ..LouvainConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidTolerance(_))));
        let config = LouvainConfig {
            max_aggregation_iterations: 0,
            ..LouvainConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            LouvainConfig::from_json("{\"resolution\": \"high\"}"),
            Err(Error::ConfigParse(_))
        ));
    }
}
