//! Mesh validation utilities.
//!
//! `MeshValidator` checks the invariants a captured mesh must satisfy before
//! it is added to a batch: whole position triples, whole uv pairs, streams
//! aligned with the positions, and in-range indices.

use crate::mesh::Mesh;

/// Validator for `Mesh` integrity checks.
pub struct MeshValidator<'a> {
    mesh: &'a Mesh,
}

impl<'a> MeshValidator<'a> {
    /// Create a new validator for the given mesh.
    pub fn new(mesh: &'a Mesh) -> Self {
        Self { mesh }
    }

    /// Number of complete position triples.
    pub fn vertex_count(&self) -> usize {
        self.mesh.positions.len() / 3
    }

    /// Check that the position stream holds whole triples.
    pub fn is_position_stride_valid(&self) -> bool {
        self.mesh.positions.len() % 3 == 0
    }

    /// Check that the normal stream holds whole triples.
    pub fn is_normal_stride_valid(&self) -> bool {
        self.mesh.normals.len() % 3 == 0
    }

    /// Check that the uv stream holds whole pairs.
    pub fn is_uv_stride_valid(&self) -> bool {
        self.mesh.uvs.len() % 2 == 0
    }

    /// Check that every index addresses a position triple.
    pub fn are_indices_in_range(&self) -> bool {
        let max_idx = self.vertex_count() as u32;
        self.mesh.primitive.indices.iter().all(|&i| i < max_idx)
    }

    /// Run all validation checks and return a list of error messages.
    /// An empty list means the mesh is valid.
    pub fn validate_all(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.is_position_stride_valid() {
            errors.push(format!(
                "Position stream length {} is not a multiple of 3",
                self.mesh.positions.len()
            ));
        }

        if !self.is_normal_stride_valid() {
            errors.push(format!(
                "Normal stream length {} is not a multiple of 3",
                self.mesh.normals.len()
            ));
        }

        if !self.is_uv_stride_valid() {
            errors.push(format!(
                "UV stream length {} is not a multiple of 2",
                self.mesh.uvs.len()
            ));
        }

        if !self.are_indices_in_range() {
            let max_idx = self.vertex_count() as u32;
            let out_of_range: Vec<_> = self
                .mesh
                .primitive
                .indices
                .iter()
                .filter(|&&i| i >= max_idx)
                .take(5)
                .collect();
            errors.push(format!(
                "Indices out of range (vertex_count={}): {:?}",
                max_idx, out_of_range
            ));
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate_all().is_empty()
    }
}
