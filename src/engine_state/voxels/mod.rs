//! # Voxel World
//!
//! * **Block**: block types and faces
//! * **Chunk**: a 16 x 128 x 16 column of blocks plus its mesh pipeline state
//! * **Generation**: terrain and decoration
//! * **World**: the chunk store and world-coordinate block access
//! * **Visibility**: which chunks must exist and be meshed around the player
//! * **Unload**: which chunks to evict
//! * **Persistence**: the seam to an external save layer
//!
//! ## Thread Safety
//!
//! The world map is sharded and every chunk has its own locks: one for blocks and one
//! for mesh state. Nothing here takes two chunk locks at once.

pub mod block;
pub mod chunk;
pub mod generation;
pub mod persistence;
pub mod unload;
pub mod visibility;
pub mod world;
