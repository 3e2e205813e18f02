//! # Block Side Module
//!
//! The six faces of a voxel block. The four horizontal faces double as the four
//! axis-aligned chunk neighbors used by the remesh cascade.

use cgmath::Vector3;

/// Represents the six possible faces of a voxel block.
///
/// The order is: [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// The front face (facing negative X, the west neighbor)
    FRONT = 0,

    /// The back face (facing positive X, the east neighbor)
    BACK = 1,

    /// The bottom face (facing negative Y)
    BOTTOM = 2,

    /// The top face (facing positive Y)
    TOP = 3,

    /// The left face (facing negative Z, the north neighbor)
    LEFT = 4,

    /// The right face (facing positive Z, the south neighbor)
    RIGHT = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in a consistent order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::BOTTOM,
            BlockSide::TOP,
            BlockSide::LEFT,
            BlockSide::RIGHT,
        ]
    }

    /// The four faces that point at another chunk.
    pub fn horizontal() -> [BlockSide; 4] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::LEFT,
            BlockSide::RIGHT,
        ]
    }

    /// Unit vector pointing out of this face.
    pub fn normal(self) -> Vector3<i32> {
        match self {
            BlockSide::FRONT => Vector3::new(-1, 0, 0),
            BlockSide::BACK => Vector3::new(1, 0, 0),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::LEFT => Vector3::new(0, 0, -1),
            BlockSide::RIGHT => Vector3::new(0, 0, 1),
        }
    }

    /// The face on the other side of the same boundary.
    pub fn opposite(self) -> BlockSide {
        match self {
            BlockSide::FRONT => BlockSide::BACK,
            BlockSide::BACK => BlockSide::FRONT,
            BlockSide::BOTTOM => BlockSide::TOP,
            BlockSide::TOP => BlockSide::BOTTOM,
            BlockSide::LEFT => BlockSide::RIGHT,
            BlockSide::RIGHT => BlockSide::LEFT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BlockSide;

    #[test]
    fn opposite_faces_have_opposite_normals() {
        for side in BlockSide::all() {
            assert_eq!(side.normal() + side.opposite().normal(), cgmath::Vector3::new(0, 0, 0));
        }
    }

    #[test]
    fn horizontal_faces_have_no_vertical_component() {
        for side in BlockSide::horizontal() {
            assert_eq!(side.normal().y, 0);
        }
    }
}
