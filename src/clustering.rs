// Licensed under the Apache License, Version 2.0 (the "License"); you may
// not use this file except in compliance with the License. You may obtain
// a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations
// under the License.

//! Multilevel clustering of weighted graphs.
//!
//! [`Louvain`] preprocesses the input (direction and bipartite transforms,
//! node masses, optional shuffling), then alternates an [`Optimizer`] pass
//! on an [`AggregateGraph`] with the aggregation of the clusters it found.

mod aggregate;
mod common;
mod config;
pub mod formats;
mod louvain;
mod membership;
mod modularity;
mod optimizer;
mod weights;

pub use aggregate::AggregateGraph;
pub use common::{group_by_labels, reindex_clusters};
pub use config::LouvainConfig;
pub use louvain::{Louvain, LouvainResult};
pub use membership::Membership;
pub use modularity::modularity;
pub use optimizer::{Engine, Fit, GreedyModularity, Optimizer};
pub use weights::{node_probs, NodeWeights};
