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
use serde::{Deserialize, Serialize};
use sprs::CsMat;

use super::formats::row_sums;
use crate::error::{Error, Result};

/// Policy used to attribute probability mass to nodes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeWeights {
    /// Proportional to the row sums of the matrix.
    #[default]
    Degree,
    /// Same mass for every node.
    Uniform,
    /// Explicit non-negative weights, normalized to sum to 1.
    Custom(Vec<f64>),
}

impl NodeWeights {
    /// True for the policies that are derived from the matrix itself.
    pub fn is_named(&self) -> bool {
        !matches!(self, NodeWeights::Custom(_))
    }
}

impl std::str::FromStr for NodeWeights {
    type Err = Error;

    /// Parse a named policy, `"degree"` or `"uniform"`.
    fn from_str(name: &str) -> Result<Self> {
        match name {
            "degree" => Ok(NodeWeights::Degree),
            "uniform" => Ok(NodeWeights::Uniform),
            _ => Err(Error::InvalidConfiguration {
                name: "node_weighting",
                message: format!("unknown policy '{name}', expected 'degree' or 'uniform'"),
            }),
        }
    }
}

/// Distribution of node weights over the rows of `matrix` (sums to 1).
pub fn node_probs(weights: &NodeWeights, matrix: &CsMat<f64>) -> Result<Array1<f64>> {
    let n = matrix.rows();
    match weights {
        NodeWeights::Degree => normalize(row_sums(matrix), "degree"),
        NodeWeights::Uniform => {
            if n == 0 {
                return Ok(Array1::zeros(0));
            }
            Ok(Array1::from_elem(n, 1.0 / n as f64))
        }
        NodeWeights::Custom(values) => {
            if values.len() != n {
                return Err(Error::InvalidInput(format!(
                    "expected {n} node weights, got {}",
                    values.len()
                )));
            }
            if values.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(Error::InvalidInput(
                    "node weights must be finite and non-negative".to_string(),
                ));
            }
            normalize(Array1::from_vec(values.clone()), "custom")
        }
    }
}

fn normalize(values: Array1<f64>, policy: &str) -> Result<Array1<f64>> {
    let total = values.sum();
    if values.is_empty() {
        return Ok(values);
    }
    if total <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "{policy} node weights sum to zero"
        )));
    }
    Ok(values / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::formats::from_entries;

    fn path() -> CsMat<f64> {
        from_entries(
            (3, 3),
            vec![(0, 1, 1.0), (1, 0, 1.0), (1, 2, 1.0), (2, 1, 1.0)],
        )
    }

    #[test]
    fn degree_weights_follow_row_sums() {
        let probs = node_probs(&NodeWeights::Degree, &path()).unwrap();
        assert_eq!(probs.to_vec(), vec![0.25, 0.5, 0.25]);
    }

    #[test]
    fn uniform_weights() {
        let probs = node_probs(&NodeWeights::Uniform, &path()).unwrap();
        assert!(probs.iter().all(|p| (p - 1.0 / 3.0).abs() < 1e-12));
    }

    #[test]
    fn custom_weights_are_normalized_and_checked() {
        let probs = node_probs(&NodeWeights::Custom(vec![1.0, 1.0, 2.0]), &path()).unwrap();
        assert_eq!(probs.to_vec(), vec![0.25, 0.25, 0.5]);

        let short = NodeWeights::Custom(vec![1.0]);
        assert!(matches!(node_probs(&short, &path()), Err(Error::InvalidInput(_))));
        let negative = NodeWeights::Custom(vec![1.0, -1.0, 1.0]);
        assert!(node_probs(&negative, &path()).is_err());
        let zero = NodeWeights::Custom(vec![0.0, 0.0, 0.0]);
        assert!(node_probs(&zero, &path()).is_err());
    }

    #[test]
    fn serde_names() {
        assert_eq!(serde_json::to_string(&NodeWeights::Degree).unwrap(), "\"degree\"");
        let custom: NodeWeights = serde_json::from_str(r#"{"custom":[1.0,2.0]}"#).unwrap();
        assert_eq!(custom, NodeWeights::Custom(vec![1.0, 2.0]));
        assert!(!custom.is_named());
    }

    #[test]
    fn parse_named_policies() {
        assert_eq!("degree".parse::<NodeWeights>().unwrap(), NodeWeights::Degree);
        assert_eq!("uniform".parse::<NodeWeights>().unwrap(), NodeWeights::Uniform);
        assert!(matches!(
            "custom".parse::<NodeWeights>(),
            Err(Error::InvalidConfiguration { .. })
        ));
    }
}
