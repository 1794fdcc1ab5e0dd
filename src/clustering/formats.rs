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

//! Sparse adjacency helpers: validation, conversion from petgraph graphs and
//! the structural transforms applied before clustering.
//!
//! Every matrix produced here is CSR. Triplet construction goes through
//! [`TriMat`], which sums duplicate entries.

use ndarray::Array1;
use petgraph::graph::{Graph, IndexType};
use petgraph::visit::EdgeRef;
use petgraph::EdgeType;
use sprs::{CsMat, TriMat};

use crate::error::{Error, Result};

/// Weighted adjacency (or biadjacency) matrix in CSR form.
pub type Adjacency = CsMat<f64>;

/// List the stored entries of a matrix as `(row, col, weight)`, whatever its
/// storage order.
pub(crate) fn entries(matrix: &CsMat<f64>) -> Vec<(usize, usize, f64)> {
    let mut out = Vec::with_capacity(matrix.nnz());
    let csr = matrix.is_csr();
    for (outer, vec) in matrix.outer_iterator().enumerate() {
        for (inner, &weight) in vec.iter() {
            if csr {
                out.push((outer, inner, weight));
            } else {
                out.push((inner, outer, weight));
            }
        }
    }
    out
}

pub(crate) fn from_entries<I>(shape: (usize, usize), entries: I) -> CsMat<f64>
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new(shape);
    for (row, col, weight) in entries {
        tri.add_triplet(row, col, weight);
    }
    tri.to_csr()
}

/// Build a CSR matrix from raw compressed-row arrays.
///
/// Column indices within a row need not be sorted; duplicates are summed.
/// Fails with [`Error::InvalidInput`] if the arrays are inconsistent.
pub fn csr_from_parts(
    shape: (usize, usize),
    indptr: &[usize],
    indices: &[usize],
    data: &[f64],
) -> Result<Adjacency> {
    let (rows, cols) = shape;
    if indptr.len() != rows + 1 || indices.len() != data.len() {
        return Err(Error::InvalidInput(format!(
            "inconsistent CSR arrays: {} row pointers for {rows} rows, {} indices, {} weights",
            indptr.len(),
            indices.len(),
            data.len()
        )));
    }
    if indptr[0] != 0 || indptr[rows] != indices.len() || indptr.windows(2).any(|w| w[0] > w[1]) {
        return Err(Error::InvalidInput(
            "row pointers must be non-decreasing from 0 to the number of entries".to_string(),
        ));
    }
    let mut tri = TriMat::with_capacity(shape, data.len());
    for row in 0..rows {
        for k in indptr[row]..indptr[row + 1] {
            if indices[k] >= cols {
                return Err(Error::InvalidInput(format!(
                    "column index {} out of bounds for {cols} columns",
                    indices[k]
                )));
            }
            tri.add_triplet(row, indices[k], data[k]);
        }
    }
    check_format(&tri.to_csr())
}

/// Validate a sparse matrix and return a CSR copy.
///
/// Fails with [`Error::InvalidInput`] on negative or non-finite weights.
pub fn check_format(matrix: &CsMat<f64>) -> Result<Adjacency> {
    if let Some(bad) = matrix.data().iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(Error::InvalidInput(format!(
            "adjacency weights must be finite and non-negative, found {bad}"
        )));
    }
    Ok(from_entries(matrix.shape(), entries(matrix)))
}

/// Sum of all stored weights.
pub fn total_weight(matrix: &CsMat<f64>) -> f64 {
    matrix.data().iter().sum()
}

/// Sum of each row (out-degree for an adjacency matrix).
pub fn row_sums(matrix: &CsMat<f64>) -> Array1<f64> {
    let mut sums = Array1::zeros(matrix.rows());
    for (row, _, weight) in entries(matrix) {
        sums[row] += weight;
    }
    sums
}

pub fn transpose(matrix: &CsMat<f64>) -> Adjacency {
    let (rows, cols) = matrix.shape();
    from_entries(
        (cols, rows),
        entries(matrix).into_iter().map(|(i, j, w)| (j, i, w)),
    )
}

/// `factor * (A + Aᵗ)` for a square matrix.
pub(crate) fn symmetrize_scaled(matrix: &CsMat<f64>, factor: f64) -> Result<Adjacency> {
    let (rows, cols) = matrix.shape();
    if rows != cols {
        return Err(Error::InvalidInput(format!(
            "expected a square adjacency, got {rows}x{cols}"
        )));
    }
    let forward = entries(matrix);
    let mut tri = TriMat::with_capacity((rows, cols), 2 * forward.len());
    for (i, j, w) in forward {
        tri.add_triplet(i, j, factor * w);
        tri.add_triplet(j, i, factor * w);
    }
    Ok(tri.to_csr())
}

/// Symmetrize a directed adjacency: `A + Aᵗ`.
pub fn directed_to_undirected(adjacency: &CsMat<f64>) -> Result<Adjacency> {
    symmetrize_scaled(adjacency, 1.0)
}

/// Adjacency of the undirected graph over rows and columns of a
/// biadjacency: `[[0, B], [Bᵗ, 0]]`.
pub fn bipartite_to_undirected(biadjacency: &CsMat<f64>) -> Adjacency {
    let (n1, n2) = biadjacency.shape();
    let forward = entries(biadjacency);
    let mut tri = TriMat::with_capacity((n1 + n2, n1 + n2), 2 * forward.len());
    for (i, j, w) in forward {
        tri.add_triplet(i, n1 + j, w);
        tri.add_triplet(n1 + j, i, w);
    }
    tri.to_csr()
}

/// Adjacency of the directed graph with row→column edges of a
/// biadjacency: `[[0, B], [0, 0]]`.
pub fn bipartite_to_directed(biadjacency: &CsMat<f64>) -> Adjacency {
    let (n1, n2) = biadjacency.shape();
    from_entries(
        (n1 + n2, n1 + n2),
        entries(biadjacency)
            .into_iter()
            .map(|(i, j, w)| (i, n1 + j, w)),
    )
}

/// Check that `order` is a permutation of `0..n` and return its inverse.
pub(crate) fn inverse_permutation(order: &[usize]) -> Result<Vec<usize>> {
    let n = order.len();
    let mut inverse = vec![usize::MAX; n];
    for (position, &node) in order.iter().enumerate() {
        if node >= n || inverse[node] != usize::MAX {
            return Err(Error::InvalidInput(
                "node order is not a permutation".to_string(),
            ));
        }
        inverse[node] = position;
    }
    Ok(inverse)
}

/// Reorder rows and columns: entry `(k, l)` of the result is
/// `A[order[k], order[l]]`.
pub fn permute(adjacency: &CsMat<f64>, order: &[usize]) -> Result<Adjacency> {
    let (rows, cols) = adjacency.shape();
    if rows != cols || rows != order.len() {
        return Err(Error::InvalidInput(format!(
            "cannot permute a {rows}x{cols} matrix with an order of length {}",
            order.len()
        )));
    }
    let position = inverse_permutation(order)?;
    Ok(from_entries(
        (rows, cols),
        entries(adjacency)
            .into_iter()
            .map(|(i, j, w)| (position[i], position[j], w)),
    ))
}

/// Build the adjacency matrix of a petgraph [`Graph`].
///
/// Undirected edges are stored in both directions, self-loops once. Parallel
/// edges are summed.
///
/// # Arguments
/// * `graph` - The input graph
/// * `weight_fn` - Extracts the weight of an edge payload
///
/// # Returns
/// * The square CSR adjacency, or [`Error::InvalidInput`] if an edge weight
///   is not positive and finite.
pub fn adjacency_from_graph<N, E, Ty, Ix, F>(
    graph: &Graph<N, E, Ty, Ix>,
    mut weight_fn: F,
) -> Result<Adjacency>
where
    Ty: EdgeType,
    Ix: IndexType,
    F: FnMut(&E) -> f64,
{
    let n = graph.node_count();
    let mut tri = TriMat::with_capacity((n, n), 2 * graph.edge_count());
    let directed = graph.is_directed();

    for edge in graph.edge_references() {
        let u = edge.source().index();
        let v = edge.target().index();
        let weight = weight_fn(edge.weight());

        if !weight.is_finite() || weight <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "edge ({u}, {v}) has weight {weight}; weights must be positive"
            )));
        }

        tri.add_triplet(u, v, weight);
        if !directed && u != v {
            tri.add_triplet(v, u, weight);
        }
    }

    Ok(tri.to_csr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::graph::{DiGraph, UnGraph};

    fn dense(matrix: &CsMat<f64>) -> Vec<Vec<f64>> {
        let mut out = vec![vec![0.0; matrix.cols()]; matrix.rows()];
        for (i, j, w) in entries(matrix) {
            out[i][j] += w;
        }
        out
    }

    #[test]
    fn csr_from_parts_accepts_unsorted_rows() {
        let m = csr_from_parts((2, 3), &[0, 2, 3], &[2, 0, 1], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(dense(&m), vec![vec![2.0, 0.0, 1.0], vec![0.0, 3.0, 0.0]]);
        assert!(csr_from_parts((2, 3), &[0, 2], &[2, 0], &[1.0, 2.0]).is_err());
        assert!(csr_from_parts((2, 3), &[0, 1, 2], &[0, 3], &[1.0, 2.0]).is_err());
        assert!(csr_from_parts((2, 3), &[0, 2, 1], &[0, 1], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn check_format_rejects_negative_weights() {
        let m = from_entries((2, 2), vec![(0, 1, 1.0), (1, 0, -2.0)]);
        assert!(matches!(check_format(&m), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn check_format_converts_csc() {
        let m = from_entries((2, 3), vec![(0, 2, 1.0), (1, 0, 3.0)]).to_csc();
        let csr = check_format(&m).unwrap();
        assert!(csr.is_csr());
        assert_eq!(dense(&csr), vec![vec![0.0, 0.0, 1.0], vec![3.0, 0.0, 0.0]]);
    }

    #[test]
    fn directed_to_undirected_sums_both_directions() {
        let m = from_entries((2, 2), vec![(0, 1, 1.0), (1, 0, 2.0), (1, 1, 1.0)]);
        let sym = directed_to_undirected(&m).unwrap();
        assert_eq!(dense(&sym), vec![vec![0.0, 3.0], vec![3.0, 2.0]]);
        let rect = from_entries((2, 3), vec![(0, 1, 1.0)]);
        assert!(directed_to_undirected(&rect).is_err());
    }

    #[test]
    fn bipartite_transforms_have_expected_blocks() {
        let b = from_entries((2, 3), vec![(0, 0, 1.0), (1, 2, 2.0)]);

        let directed = bipartite_to_directed(&b);
        assert_eq!(directed.shape(), (5, 5));
        let d = dense(&directed);
        assert_eq!(d[0][2], 1.0);
        assert_eq!(d[1][4], 2.0);
        assert_eq!(total_weight(&directed), 3.0);

        let undirected = bipartite_to_undirected(&b);
        let u = dense(&undirected);
        assert_eq!(u[0][2], 1.0);
        assert_eq!(u[2][0], 1.0);
        assert_eq!(u[4][1], 2.0);
        assert_eq!(total_weight(&undirected), 6.0);
    }

    #[test]
    fn permute_reorders_rows_and_columns() {
        let m = from_entries((3, 3), vec![(0, 1, 1.0), (2, 2, 5.0)]);
        let p = permute(&m, &[2, 0, 1]).unwrap();
        let d = dense(&p);
        assert_eq!(d[0][0], 5.0);
        assert_eq!(d[1][2], 1.0);
        assert!(permute(&m, &[0, 0, 1]).is_err());
    }

    #[test]
    fn row_sums_and_transpose() {
        let m = from_entries((2, 3), vec![(0, 0, 1.0), (0, 2, 2.0), (1, 1, 4.0)]);
        assert_eq!(row_sums(&m).to_vec(), vec![3.0, 4.0]);
        let t = transpose(&m);
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(row_sums(&t).to_vec(), vec![1.0, 4.0, 2.0]);
    }

    #[test]
    fn adjacency_from_undirected_graph_mirrors_edges() {
        let mut graph = UnGraph::<(), f64>::new_undirected();
        let a = graph.add_node(());
        let b = graph.add_node(());
        graph.add_edge(a, b, 2.0);
        graph.add_edge(b, b, 1.0);
        let adjacency = adjacency_from_graph(&graph, |w| *w).unwrap();
        assert_eq!(dense(&adjacency), vec![vec![0.0, 2.0], vec![2.0, 1.0]]);
    }

    #[test]
    fn adjacency_from_directed_graph_keeps_direction() {
        let mut graph = DiGraph::<(), f64>::new();
        let a = graph.add_node(());
        let b = graph.add_node(());
        graph.add_edge(a, b, 1.5);
        let adjacency = adjacency_from_graph(&graph, |w| *w).unwrap();
        assert_eq!(dense(&adjacency), vec![vec![0.0, 1.5], vec![0.0, 0.0]]);

        graph.add_edge(b, a, 0.0);
        assert!(adjacency_from_graph(&graph, |w| *w).is_err());
    }
}
