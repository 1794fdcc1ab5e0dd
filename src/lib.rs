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

//! Hierarchical clustering of sparse weighted graphs (undirected, directed
//! or bipartite) by greedy modularity optimization and graph coarsening.
//!
//! ```
//! use multilouvain::{Louvain, LouvainConfig};
//! use sprs::TriMat;
//!
//! let mut tri = TriMat::new((6, 6));
//! for base in [0, 3] {
//!     for (a, b) in [(0, 1), (1, 2), (0, 2)] {
//!         tri.add_triplet(base + a, base + b, 1.0);
//!         tri.add_triplet(base + b, base + a, 1.0);
//!     }
//! }
//! let adjacency: sprs::CsMat<f64> = tri.to_csr();
//!
//! let result = Louvain::new(LouvainConfig::default())?.fit(&adjacency)?;
//! assert_eq!(result.labels, vec![0, 0, 0, 1, 1, 1]);
//! # Ok::<(), multilouvain::Error>(())
//! ```

pub mod clustering;
mod error;
#[cfg(feature = "python")]
mod python;

pub use clustering::{
    modularity, AggregateGraph, Engine, Fit, GreedyModularity, Louvain, LouvainConfig,
    LouvainResult, Membership, NodeWeights, Optimizer,
};
pub use error::{Error, Result};
