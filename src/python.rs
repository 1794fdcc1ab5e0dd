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

use numpy::{IntoPyArray, PyArray1};
use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

use crate::clustering::formats::csr_from_parts;
use crate::clustering::{Engine, Louvain, LouvainConfig, NodeWeights};
use crate::error::Error;

/// Node weighting given from Python: a policy name or explicit weights.
#[derive(FromPyObject)]
enum WeightingArg {
    Named(String),
    Custom(Vec<f64>),
}

impl WeightingArg {
    fn into_weights(self) -> Result<NodeWeights, Error> {
        match self {
            WeightingArg::Named(name) => name.parse(),
            WeightingArg::Custom(weights) => Ok(NodeWeights::Custom(weights)),
        }
    }
}

fn parse_engine(engine: &str) -> Result<Engine, Error> {
    Ok(serde_json::from_value(serde_json::Value::String(
        engine.to_string(),
    ))?)
}

/// Cluster a graph given as CSR arrays with the Louvain method.
///
/// Args:
///     shape: ``(n_rows, n_cols)`` of the adjacency or biadjacency matrix.
///     indptr, indices, data: CSR arrays of the matrix.
///     resolution: Resolution parameter. Higher values yield smaller clusters.
///     tolerance: Minimum increase of a sweep to run another sweep.
///     aggregation_tolerance: Minimum increase of a level to aggregate.
///     max_aggregation_iterations: Maximum number of levels (negative: no limit).
///     shuffle_nodes: Randomly permute the nodes before optimization.
///     seed: Optional random seed for the shuffle.
///     force_undirected: Treat the graph as undirected.
///     force_bipartite: Treat a square matrix as a biadjacency matrix.
///     sort_clusters: Relabel clusters in decreasing order of size.
///     engine: ``"default"``, ``"reference"`` or ``"kernel"``.
///     node_weighting: ``"degree"`` (default), ``"uniform"`` or a list of
///         weights, one per node (per row of a biadjacency).
///     secondary_node_weighting: Same for the columns of a biadjacency;
///         ``None`` reuses a named ``node_weighting``.
///
/// Returns:
///     A tuple ``(labels, secondary_labels, iteration_count)``;
///     ``secondary_labels`` is ``None`` unless the input is bipartite.
///
/// Raises:
///     ValueError: If the input or an option is invalid.
///     RuntimeError: If the requested engine is not available.
#[pyfunction]
#[pyo3(name = "louvain")]
#[pyo3(signature = (
    shape, indptr, indices, data, /, resolution=1.0, tolerance=0.001,
    aggregation_tolerance=0.001, max_aggregation_iterations=-1, shuffle_nodes=false,
    seed=None, force_undirected=false, force_bipartite=false, sort_clusters=true,
    engine="default", node_weighting=None, secondary_node_weighting=None
))]
#[allow(clippy::too_many_arguments)]
fn py_louvain<'py>(
    py: Python<'py>,
    shape: (usize, usize),
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
    resolution: f64,
    tolerance: f64,
    aggregation_tolerance: f64,
    max_aggregation_iterations: i64,
    shuffle_nodes: bool,
    seed: Option<u64>,
    force_undirected: bool,
    force_bipartite: bool,
    sort_clusters: bool,
    engine: &str,
    node_weighting: Option<WeightingArg>,
    secondary_node_weighting: Option<WeightingArg>,
) -> PyResult<(
    Bound<'py, PyArray1<usize>>,
    Option<Bound<'py, PyArray1<usize>>>,
    usize,
)> {
    let adjacency = csr_from_parts(shape, &indptr, &indices, &data)?;
    let config = LouvainConfig {
        resolution,
        tolerance,
        aggregation_tolerance,
        max_aggregation_iterations,
        shuffle_nodes,
        seed,
        force_undirected,
        force_bipartite,
        sort_clusters,
        engine: parse_engine(engine)?,
        node_weighting: match node_weighting {
            Some(weighting) => weighting.into_weights()?,
            None => NodeWeights::Degree,
        },
        secondary_node_weighting: secondary_node_weighting
            .map(WeightingArg::into_weights)
            .transpose()?,
    };
    let model = Louvain::new(config)?;
    let result = py.allow_threads(|| model.fit(&adjacency))?;

    Ok((
        result.labels.into_pyarray(py),
        result.secondary_labels.map(|labels| labels.into_pyarray(py)),
        result.iteration_count,
    ))
}

/// Calculate the modularity of a partition of a graph given as CSR arrays.
#[pyfunction]
#[pyo3(name = "modularity")]
#[pyo3(signature = (shape, indptr, indices, data, labels, /, resolution=1.0))]
fn py_modularity(
    shape: (usize, usize),
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
    labels: Vec<usize>,
    resolution: f64,
) -> PyResult<f64> {
    let adjacency = csr_from_parts(shape, &indptr, &indices, &data)?;
    Ok(crate::clustering::modularity(&adjacency, &labels, resolution)?)
}

#[pymodule]
fn multilouvain(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(py_louvain, m)?)?;
    m.add_function(wrap_pyfunction!(py_modularity, m)?)?;
    Ok(())
}
