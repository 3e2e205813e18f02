//! Vertex data structures for voxel meshes.
//!
//! Vertices are plain-old-data so a graphics backend can copy a mesh straight into a
//! vertex buffer with `bytemuck::cast_slice`.

use cgmath::Point3;

/// A vertex of a chunk mesh.
///
/// # Memory Layout
/// - Position: 3x i32 (12 bytes), chunk-local
/// - Texture Index: u32 (4 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
/// - Side: u32 (4 bytes), the [`BlockSide`](crate::engine_state::voxels::block::block_side::BlockSide) the face points at
///
/// Total size: 28 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    x: i32,
    y: i32,
    z: i32,
    texture_index: u32,
    tex_coords: [f32; 2],
    side: u32,
}

impl Vertex {
    /// Creates a vertex.
    ///
    /// `u` and `v` are in whole blocks so textures repeat across merged faces.
    pub fn new(pos: Point3<i32>, texture_index: u32, u: u8, v: u8, side: u32) -> Self {
        Vertex {
            x: pos.x,
            y: pos.y,
            z: pos.z,
            texture_index,
            tex_coords: [u as f32, v as f32],
            side,
        }
    }

    /// Chunk-local position.
    pub fn position(&self) -> Point3<i32> {
        Point3::new(self.x, self.y, self.z)
    }

    /// Texture layer.
    pub fn texture_index(&self) -> u32 {
        self.texture_index
    }

    /// Texture coordinates.
    pub fn tex_coords(&self) -> [f32; 2] {
        self.tex_coords
    }

    /// Face direction as a `BlockSide` discriminant.
    pub fn side(&self) -> u32 {
        self.side
    }
}
