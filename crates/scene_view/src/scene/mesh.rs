//! Triangle mesh geometry
//!
//! Meshes arrive already parsed from an external loader as flat
//! position/normal/index buffers. They are validated once here and then
//! shared between nodes behind an `Arc`.

use super::aabb::Aabb;
use super::MeshError;
use crate::foundation::math::Vec3;

/// Vertex with position and normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in the mesh frame
    pub position: [f32; 3],
    /// Unit normal
    pub normal: [f32; 3],
}

impl Vertex {
    /// Create a new vertex
    pub fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self { position, normal }
    }
}

/// Indexed triangle mesh
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    bounds: Aabb,
}

impl Mesh {
    /// Build a mesh from already-validated vertices and indices
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self, MeshError> {
        if indices.len() % 3 != 0 {
            return Err(MeshError::IndexCount(indices.len()));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(MeshError::IndexOutOfRange { index: bad, vertex_count: vertices.len() });
        }
        if vertices.iter().any(|v| v.position.iter().any(|c| !c.is_finite())) {
            return Err(MeshError::NonFinitePosition);
        }

        let bounds = Aabb::from_points(vertices.iter().map(|v| Vec3::from(v.position)));
        Ok(Self { vertices, indices, bounds })
    }

    /// Build a mesh from flat buffers handed over by a loader
    pub fn from_buffers(positions: &[[f32; 3]], normals: &[[f32; 3]], indices: &[u32]) -> Result<Self, MeshError> {
        if positions.len() != normals.len() {
            return Err(MeshError::AttributeMismatch {
                positions: positions.len(),
                normals: normals.len(),
            });
        }
        let vertices = positions
            .iter()
            .zip(normals)
            .map(|(p, n)| Vertex::new(*p, *n))
            .collect();
        Self::new(vertices, indices.to_vec())
    }

    /// Axis-aligned cube of edge length `size` centered at the origin
    pub fn cube(size: f32) -> Self {
        let h = size * 0.5;
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([1.0, 0.0, 0.0], [[h, -h, -h], [h, h, -h], [h, h, h], [h, -h, h]]),
            ([-1.0, 0.0, 0.0], [[-h, h, -h], [-h, -h, -h], [-h, -h, h], [-h, h, h]]),
            ([0.0, 1.0, 0.0], [[h, h, -h], [-h, h, -h], [-h, h, h], [h, h, h]]),
            ([0.0, -1.0, 0.0], [[-h, -h, -h], [h, -h, -h], [h, -h, h], [-h, -h, h]]),
            ([0.0, 0.0, 1.0], [[-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h]]),
            ([0.0, 0.0, -1.0], [[-h, h, -h], [h, h, -h], [h, -h, -h], [-h, -h, -h]]),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, quad) in faces {
            let base = vertices.len() as u32;
            vertices.extend(quad.iter().map(|p| Vertex::new(*p, normal)));
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        let bounds = Aabb::new(Vec3::repeat(-h), Vec3::repeat(h));
        Self { vertices, indices, bounds }
    }

    /// Rectangle in the z = 0 plane with normal +Z
    pub fn plane(width: f32, depth: f32) -> Self {
        let (hw, hd) = (width * 0.5, depth * 0.5);
        let normal = [0.0, 0.0, 1.0];
        let vertices = vec![
            Vertex::new([-hw, -hd, 0.0], normal),
            Vertex::new([hw, -hd, 0.0], normal),
            Vertex::new([hw, hd, 0.0], normal),
            Vertex::new([-hw, hd, 0.0], normal),
        ];
        let indices = vec![0, 1, 2, 0, 2, 3];
        let bounds = Aabb::new(Vec3::new(-hw, -hd, 0.0), Vec3::new(hw, hd, 0.0));
        Self { vertices, indices, bounds }
    }

    /// Vertex buffer
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Index buffer
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Bounds in the mesh frame
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterate triangles as vertex triples
    pub fn triangles(&self) -> impl Iterator<Item = [&Vertex; 3]> + '_ {
        self.indices.chunks_exact(3).map(move |tri| {
            [
                &self.vertices[tri[0] as usize],
                &self.vertices[tri[1] as usize],
                &self.vertices[tri[2] as usize],
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_layout() {
        let cube = Mesh::cube(2.0);
        assert_eq!(cube.vertices().len(), 24);
        assert_eq!(cube.triangle_count(), 12);
        assert_eq!(cube.bounds(), Aabb::new(Vec3::repeat(-1.0), Vec3::repeat(1.0)));
    }

    #[test]
    fn test_cube_winding_matches_normals() {
        let cube = Mesh::cube(1.0);
        for [a, b, c] in cube.triangles() {
            let (pa, pb, pc) = (Vec3::from(a.position), Vec3::from(b.position), Vec3::from(c.position));
            let face_normal = (pb - pa).cross(&(pc - pa));
            assert!(face_normal.dot(&Vec3::from(a.normal)) > 0.0);
        }
    }

    #[test]
    fn test_plane_bounds() {
        let plane = Mesh::plane(4.0, 2.0);
        assert_eq!(plane.bounds().size(), Vec3::new(4.0, 2.0, 0.0));
        assert_eq!(plane.triangle_count(), 2);
    }

    #[test]
    fn test_from_buffers_validates() {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let normals = [[0.0, 0.0, 1.0]; 3];

        assert!(Mesh::from_buffers(&positions, &normals, &[0, 1, 2]).is_ok());
        assert!(matches!(
            Mesh::from_buffers(&positions, &normals, &[0, 1]),
            Err(MeshError::IndexCount(2))
        ));
        assert!(matches!(
            Mesh::from_buffers(&positions, &normals, &[0, 1, 3]),
            Err(MeshError::IndexOutOfRange { index: 3, vertex_count: 3 })
        ));
        assert!(matches!(
            Mesh::from_buffers(&positions, &normals[..2], &[0, 1, 2]),
            Err(MeshError::AttributeMismatch { .. })
        ));
    }

    #[test]
    fn test_non_finite_position_rejected() {
        let positions = [[f32::NAN, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let normals = [[0.0, 0.0, 1.0]; 3];
        assert!(matches!(
            Mesh::from_buffers(&positions, &normals, &[0, 1, 2]),
            Err(MeshError::NonFinitePosition)
        ));
    }
}
