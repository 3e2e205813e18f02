//! # Visibility Tracker
//!
//! Decides which chunks must exist and which must be meshed around the player.
//!
//! - The **visible set** is every chunk within Chebyshev distance `R` of the player.
//! - The **border ring** is the ring at distance `R + 1`. Border chunks are generated so
//!   visible edge chunks have neighbor data to mesh against, but are never decorated or
//!   meshed on their own account.
//!
//! A scan first makes sure every visible and border chunk exists, then decorates and
//! schedules the visible ones. Creating the whole area first means a tree planted on a
//! visible edge always finds its neighbor chunk loaded.

use std::sync::Arc;

use crate::engine_state::rendering::scheduler::MeshBuildScheduler;

use super::chunk::{Chunk, ChunkCoordinate};
use super::world::World;

/// Counts from one scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VisibilityScan {
    /// Chunks in the visible set that exist.
    pub visible: usize,
    /// Chunks in the border ring that exist.
    pub border: usize,
    /// Coordinates whose chunk could not be generated this scan.
    pub generation_failures: usize,
    /// Chunks decorated this scan.
    pub populated: usize,
    /// Chunks newly queued for meshing.
    pub scheduled: usize,
}

/// Tracks the area around the player.
#[derive(Clone, Debug)]
pub struct VisibilityTracker {
    render_distance: i32,
    center: Option<ChunkCoordinate>,
}

impl VisibilityTracker {
    /// A tracker for a render distance in chunks.
    pub fn new(render_distance: i32) -> Self {
        VisibilityTracker {
            render_distance: render_distance.max(0),
            center: None,
        }
    }

    /// Render distance in chunks.
    pub fn render_distance(&self) -> i32 {
        self.render_distance
    }

    /// The player chunk of the last scan.
    pub fn center(&self) -> Option<ChunkCoordinate> {
        self.center
    }

    /// Whether `coordinate` is in the visible set around `center`.
    pub fn is_visible(&self, center: ChunkCoordinate, coordinate: ChunkCoordinate) -> bool {
        center.chebyshev_distance(coordinate) <= self.render_distance
    }

    /// The `(2R + 1)^2` visible coordinates around `center`.
    pub fn visible_set(&self, center: ChunkCoordinate) -> Vec<ChunkCoordinate> {
        let r = self.render_distance;
        (-r..=r)
            .flat_map(|dx| (-r..=r).map(move |dz| center.offset(dx, dz)))
            .collect()
    }

    /// The `8(R + 1)` coordinates at distance exactly `R + 1` from `center`.
    ///
    /// This is the full square frame, corners included: 24 chunks at `R = 2` rather than
    /// the 20 of an edge-only frame. A tree planted in a corner visible chunk can spill
    /// diagonally, and the chunk it spills into has to be resident to take the leaves.
    ///
    /// Border chunks are created but never decorated or scheduled.
    pub fn border_ring(&self, center: ChunkCoordinate) -> Vec<ChunkCoordinate> {
        let ring = self.render_distance + 1;
        (-ring..=ring)
            .flat_map(|dx| (-ring..=ring).map(move |dz| (dx, dz)))
            .filter(|&(dx, dz)| dx.abs() == ring || dz.abs() == ring)
            .map(|(dx, dz)| center.offset(dx, dz))
            .collect()
    }

    /// Brings the area around `center` up to date.
    ///
    /// # Arguments
    ///
    /// * `center` - The player's chunk
    /// * `world` - Where missing chunks are generated and decorated
    /// * `scheduler` - Receives visible chunks that need a mesh
    pub fn scan(
        &mut self,
        center: ChunkCoordinate,
        world: &World,
        scheduler: &MeshBuildScheduler,
    ) -> VisibilityScan {
        if self.center != Some(center) {
            log::debug!("player entered chunk {center:?}");
            self.center = Some(center);
        }

        let mut scan = VisibilityScan::default();
        let mut visible = Vec::new();
        for coordinate in self.visible_set(center) {
            match world.get_or_create(coordinate) {
                Ok(chunk) => visible.push(chunk),
                Err(_) => scan.generation_failures += 1,
            }
        }
        for coordinate in self.border_ring(center) {
            match world.get_or_create(coordinate) {
                Ok(_) => scan.border += 1,
                Err(_) => scan.generation_failures += 1,
            }
        }
        scan.visible = visible.len();

        for chunk in &visible {
            if let Ok(true) = world.populate_features(chunk) {
                scan.populated += 1;
            }
        }

        for chunk in &visible {
            scan.scheduled += self.refresh(chunk, world, scheduler);
        }

        if scan.scheduled > 0 || scan.generation_failures > 0 {
            log::debug!("visibility scan around {center:?}: {scan:?}");
        }
        scan
    }

    /// Schedules a visible chunk that is not settled, and any decorated neighbor that
    /// is not settled either.
    fn refresh(&self, chunk: &Arc<Chunk>, world: &World, scheduler: &MeshBuildScheduler) -> usize {
        let mut scheduled = 0;
        if !chunk.is_settled() && scheduler.conditionally_schedule(chunk) {
            scheduled += 1;
        }
        for (_, coordinate) in chunk.coordinate().neighbors() {
            let Some(neighbor) = world.get(coordinate) else {
                continue;
            };
            if neighbor.features_populated()
                && !neighbor.is_settled()
                && scheduler.conditionally_schedule(&neighbor)
            {
                scheduled += 1;
            }
        }
        scheduled
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::engine_state::voxels::chunk::mesh_state::{MeshEvent, MeshState};
    use crate::engine_state::voxels::generation::{FlatTerrainGenerator, NoiseTerrainGenerator};

    fn flat_world() -> World {
        World::new(Arc::new(FlatTerrainGenerator::default()))
    }

    #[test]
    fn visible_and_border_sets_partition_the_area() {
        let tracker = VisibilityTracker::new(2);
        let center = ChunkCoordinate::new(-4, 7);
        let visible: HashSet<_> = tracker.visible_set(center).into_iter().collect();
        let border: HashSet<_> = tracker.border_ring(center).into_iter().collect();
        assert_eq!(visible.len(), 25);
        assert_eq!(border.len(), 24);
        assert!(visible.is_disjoint(&border));
        assert!(border
            .iter()
            .all(|coordinate| center.chebyshev_distance(*coordinate) == 3));
    }

    #[test]
    fn scan_creates_both_sets_and_schedules_only_visible() {
        let world = flat_world();
        let scheduler = MeshBuildScheduler::new();
        let mut tracker = VisibilityTracker::new(2);
        let center = ChunkCoordinate::new(0, 0);

        let scan = tracker.scan(center, &world, &scheduler);
        assert_eq!(scan.visible, 25);
        assert_eq!(scan.border, 24);
        assert_eq!(scan.populated, 25);
        assert_eq!(scan.scheduled, 25);
        assert_eq!(world.len(), 49);
        assert_eq!(scheduler.len(), 25);

        for coordinate in tracker.border_ring(center) {
            let chunk = world.get(coordinate).unwrap();
            assert!(!chunk.features_populated());
            assert_eq!(chunk.state(), MeshState::Unmeshed);
            assert!(!scheduler.is_pending(coordinate));
        }
    }

    #[test]
    fn rescanning_is_a_no_op_while_builds_are_pending() {
        let world = flat_world();
        let scheduler = MeshBuildScheduler::new();
        let mut tracker = VisibilityTracker::new(1);
        tracker.scan(ChunkCoordinate::new(0, 0), &world, &scheduler);
        let scan = tracker.scan(ChunkCoordinate::new(0, 0), &world, &scheduler);
        assert_eq!(scan.scheduled, 0);
        assert_eq!(scan.populated, 0);
        assert_eq!(scheduler.len(), 9);
    }

    #[test]
    fn decorated_neighbors_outside_view_are_refreshed() {
        let world = flat_world();
        let scheduler = MeshBuildScheduler::new();
        let mut tracker = VisibilityTracker::new(0);

        // A chunk that was visible earlier, decorated, then dropped back to UNMESHED.
        let east = world.get_chunk_at(1, 0).unwrap();
        world.populate_features(&east).unwrap();
        assert_eq!(east.state(), MeshState::Unmeshed);

        tracker.scan(ChunkCoordinate::new(0, 0), &world, &scheduler);
        assert!(scheduler.is_pending(ChunkCoordinate::new(1, 0)));
        assert!(!scheduler.is_pending(ChunkCoordinate::new(-1, 0)));
    }

    #[test]
    fn settled_chunks_are_left_alone() {
        let world = flat_world();
        let scheduler = MeshBuildScheduler::new();
        let mut tracker = VisibilityTracker::new(0);
        tracker.scan(ChunkCoordinate::new(0, 0), &world, &scheduler);

        let chunk = world.get(ChunkCoordinate::new(0, 0)).unwrap();
        scheduler.drain_pending();
        chunk.transition(MeshEvent::BeginBuild);
        chunk.complete_build(Some(Default::default()), || {});
        chunk.take_mesh_for_upload();
        chunk.finish_upload(true);

        let scan = tracker.scan(ChunkCoordinate::new(0, 0), &world, &scheduler);
        assert_eq!(scan.scheduled, 0);
        assert!(chunk.is_settled());
    }

    #[test]
    fn noise_world_scan_decorates_only_visible_chunks() {
        let world = World::new(Arc::new(NoiseTerrainGenerator::new(7)));
        let scheduler = MeshBuildScheduler::new();
        let mut tracker = VisibilityTracker::new(1);
        let center = ChunkCoordinate::new(0, 0);
        tracker.scan(center, &world, &scheduler);

        assert_eq!(world.len(), 25);
        for chunk in world.snapshot_values() {
            let visible = tracker.is_visible(center, chunk.coordinate());
            assert_eq!(chunk.features_populated(), visible);
        }
    }
}
