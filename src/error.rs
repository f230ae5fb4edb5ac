//! Error types for tetsample.
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur during mesh conversion, sampling and tetrahedralization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// The input has nothing to operate on.
    #[error("mesh is empty")]
    EmptyMesh,

    /// Faces are neither all triangles nor all quads.
    #[error("mesh faces of arity {arity} are not supported (expected 3 or 4)")]
    UnsupportedFacetArity {
        /// Number of vertices per face that was supplied.
        arity: usize,
    },

    /// Cells are not tetrahedra.
    #[error("mesh cells of arity {arity} are not supported (expected 4)")]
    UnsupportedCellArity {
        /// Number of vertices per cell that was supplied.
        arity: usize,
    },

    /// A kernel mesh holds non-simplicial elements where simplices are required.
    #[error("mesh {element} are not all simplices")]
    NotSimplicial {
        /// Which container failed the check ("facets" or "cells").
        element: &'static str,
    },

    /// A face or cell references a vertex that does not exist.
    #[error("{element} {index} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// Kind of element ("face" or "cell").
        element: &'static str,
        /// Row of the offending element.
        index: usize,
        /// The out-of-range vertex index.
        vertex: usize,
    },

    /// Coordinates have the wrong number of columns.
    #[error("expected {expected} coordinate columns, found {found}")]
    DimensionMismatch {
        /// Accepted column count(s).
        expected: &'static str,
        /// Column count that was supplied.
        found: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MeshError::UnsupportedFacetArity { arity: 5 };
        assert_eq!(
            err.to_string(),
            "mesh faces of arity 5 are not supported (expected 3 or 4)"
        );

        let err = MeshError::invalid_param("num_samples", 3, "must be greater than 3");
        assert_eq!(
            err.to_string(),
            "invalid parameter: num_samples = 3 (must be greater than 3)"
        );
    }
}
