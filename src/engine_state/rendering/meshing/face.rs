use cgmath::Point3;

use crate::engine_state::{
    rendering::Vertex,
    voxels::block::{block_side::BlockSide, block_type::BlockType},
};

/// A single quad of a chunk mesh.
///
/// A face is defined by four corner points (lower-left, lower-right, upper-right,
/// upper-left) in chunk coordinates. Corners are wound so that the quad faces out of
/// the block along `block_side`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Lower-right corner
    pub lr: Point3<usize>,
    /// Lower-left corner
    pub ll: Point3<usize>,
    /// Upper-right corner
    pub ur: Point3<usize>,
    /// Upper-left corner
    pub ul: Point3<usize>,
    /// The block type the face belongs to
    pub block_type: BlockType,
    /// Which side of the block this face represents
    pub block_side: BlockSide,
}

impl Face {
    /// The unit face of the block at `(i, j, k)` on `block_side`.
    pub fn new(i: usize, j: usize, k: usize, block_type: BlockType, block_side: BlockSide) -> Self {
        let (ll, lr, ul, ur) = match block_side {
            BlockSide::FRONT => (
                Point3::new(i, j, k),
                Point3::new(i, j, k + 1),
                Point3::new(i, j + 1, k),
                Point3::new(i, j + 1, k + 1),
            ),
            BlockSide::BACK => (
                Point3::new(i + 1, j, k + 1),
                Point3::new(i + 1, j, k),
                Point3::new(i + 1, j + 1, k + 1),
                Point3::new(i + 1, j + 1, k),
            ),
            BlockSide::BOTTOM => (
                Point3::new(i, j, k + 1),
                Point3::new(i, j, k),
                Point3::new(i + 1, j, k + 1),
                Point3::new(i + 1, j, k),
            ),
            BlockSide::TOP => (
                Point3::new(i, j + 1, k),
                Point3::new(i, j + 1, k + 1),
                Point3::new(i + 1, j + 1, k),
                Point3::new(i + 1, j + 1, k + 1),
            ),
            BlockSide::LEFT => (
                Point3::new(i + 1, j, k),
                Point3::new(i, j, k),
                Point3::new(i + 1, j + 1, k),
                Point3::new(i, j + 1, k),
            ),
            BlockSide::RIGHT => (
                Point3::new(i, j, k + 1),
                Point3::new(i + 1, j, k + 1),
                Point3::new(i, j + 1, k + 1),
                Point3::new(i + 1, j + 1, k + 1),
            ),
        };
        Face {
            ll,
            lr,
            ul,
            ur,
            block_type,
            block_side,
        }
    }

    /// Merges `other` into this face if it sits directly above with the same block type.
    ///
    /// Only meaningful for the four vertical sides.
    pub fn merge_up(&self, other: &Face) -> Option<Face> {
        if self.block_type == other.block_type
            && self.block_side == other.block_side
            && self.ul == other.ll
            && self.ur == other.lr
        {
            return Some(Face {
                ul: other.ul,
                ur: other.ur,
                ll: self.ll,
                lr: self.lr,
                block_side: self.block_side,
                block_type: self.block_type,
            });
        }

        None
    }

    /// Height of the face in blocks.
    pub fn height(&self) -> usize {
        match self.block_side {
            BlockSide::TOP | BlockSide::BOTTOM => 1,
            _ => self.ul.y - self.ll.y,
        }
    }

    /// Texture layer for this face: one layer per block type and side.
    pub fn texture_index(&self) -> u32 {
        self.block_type as u32 * 6 + self.block_side as u32
    }

    /// The four corners as vertices, ordered ll, lr, ul, ur.
    pub fn vertices(&self) -> [Vertex; 4] {
        let texture_index = self.texture_index();
        let side = self.block_side as u32;
        let v = self.height() as u8;
        let corner = |point: Point3<usize>, u: u8, v: u8| {
            Vertex::new(point.map(|c| c as i32), texture_index, u, v, side)
        };
        [
            corner(self.ll, 0, v),
            corner(self.lr, 1, v),
            corner(self.ul, 0, 0),
            corner(self.ur, 1, 0),
        ]
    }

    /// Two triangles over the four vertices starting at `first_vertex`.
    pub fn indices(first_vertex: u32) -> [u32; 6] {
        [
            first_vertex,
            first_vertex + 1,
            first_vertex + 3,
            first_vertex,
            first_vertex + 3,
            first_vertex + 2,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacked_side_faces_merge() {
        let lower = Face::new(0, 4, 0, BlockType::STONE, BlockSide::FRONT);
        let upper = Face::new(0, 5, 0, BlockType::STONE, BlockSide::FRONT);
        let merged = lower.merge_up(&upper).unwrap();
        assert_eq!(merged.ll, Point3::new(0, 4, 0));
        assert_eq!(merged.ur, Point3::new(0, 6, 1));
        assert_eq!(merged.height(), 2);
    }

    #[test]
    fn different_blocks_do_not_merge() {
        let lower = Face::new(0, 4, 0, BlockType::STONE, BlockSide::BACK);
        let upper = Face::new(0, 5, 0, BlockType::DIRT, BlockSide::BACK);
        assert!(lower.merge_up(&upper).is_none());
        let gap = Face::new(0, 7, 0, BlockType::STONE, BlockSide::BACK);
        assert!(lower.merge_up(&gap).is_none());
    }

    #[test]
    fn indices_form_two_triangles() {
        assert_eq!(Face::indices(8), [8, 9, 11, 8, 11, 10]);
    }
}
