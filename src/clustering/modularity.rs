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

use super::aggregate::AggregateGraph;
use super::membership::Membership;
use super::weights::NodeWeights;
use crate::error::{Error, Result};

/// Calculate the modularity of a partition.
///
/// For a directed graph with total weight `w`, out-degrees `d⁺` and
/// in-degrees `d⁻`:
///
/// ```text
/// Q = Σ_ij [ A_ij / w - γ d⁺_i d⁻_j / w² ] δ(c_i, c_j)
/// ```
///
/// which is the Newman-Girvan modularity when the adjacency is symmetric.
///
/// # Arguments
/// * `adjacency` - Square non-negative adjacency with positive total weight
/// * `labels` - Cluster of each node
/// * `resolution` - Resolution parameter γ
pub fn modularity(adjacency: &CsMat<f64>, labels: &[usize], resolution: f64) -> Result<f64> {
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(Error::InvalidResolution(resolution));
    }
    if labels.len() != adjacency.rows() {
        return Err(Error::InvalidAssignment(format!(
            "{} labels for {} nodes",
            labels.len(),
            adjacency.rows()
        )));
    }
    let mut graph = AggregateGraph::new(adjacency, &NodeWeights::Degree, Some(&NodeWeights::Degree))?;
    graph.aggregate(&Membership::from_labels(labels.to_vec()), None)?;
    Ok(graph.modularity(resolution))
}
