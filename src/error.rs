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

//! Error types shared by every clustering entry point.

/// Errors raised by graph preprocessing, aggregation and optimization.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or inconsistent sparse structure.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid resolution {0}: must be finite and positive")]
    InvalidResolution(f64),

    #[error("invalid tolerance {0}: must be finite and non-negative")]
    InvalidTolerance(f64),

    /// Any other out-of-range option.
    #[error("invalid configuration '{name}': {message}")]
    InvalidConfiguration { name: &'static str, message: String },

    /// Cluster assignment does not match the graph it is applied to.
    #[error("invalid cluster assignment: {0}")]
    InvalidAssignment(String),

    /// The requested optimizer engine was not compiled into this build.
    #[error("engine '{0}' is not available in this build")]
    UnsupportedEngine(&'static str),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(feature = "python")]
impl From<Error> for pyo3::PyErr {
    fn from(err: Error) -> Self {
        match err {
            Error::UnsupportedEngine(_) => {
                pyo3::exceptions::PyRuntimeError::new_err(err.to_string())
            }
            _ => pyo3::exceptions::PyValueError::new_err(err.to_string()),
        }
    }
}
