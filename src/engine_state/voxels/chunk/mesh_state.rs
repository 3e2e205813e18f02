//! # Chunk Mesh State Machine
//!
//! A chunk's mesh lifecycle is one explicit state plus a handful of orthogonal bits,
//! all changed through [`ChunkStatus::apply`]. Nothing else writes these fields.
//!
//! ```text
//!  UNMESHED ──Schedule──▶ QUEUED ──BeginBuild──▶ BUILDING
//!     ▲                                            │
//!     ├────────────────BuildFailed─────────────────┤
//!     │                                      BuildSucceeded
//!     │                                            ▼
//!     ├──Invalidate── SETTLED ◀──Uploaded── READY_FOR_UPLOAD
//!     └──Invalidate / UploadFailed ──────────────────┘
//! ```
//!
//! Invalidating a QUEUED or BUILDING chunk does not start a second build; it sets
//! `remesh_requested` and the in-flight result is discarded when it lands.
//!
//! `Uploaded` and `UploadFailed` are applied once the graphics context has answered, so
//! `mesh_generated` only turns on when a mesh really reached it.

/// Where a chunk is in the mesh pipeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum MeshState {
    /// No current mesh data. Eligible for scheduling.
    #[default]
    Unmeshed,
    /// In the scheduler's pending set or a worker queue.
    Queued,
    /// A worker is building mesh data.
    Building,
    /// Fresh mesh data is waiting for the graphics thread.
    ReadyForUpload,
    /// The uploaded mesh matches the chunk's block content.
    Settled,
}

impl MeshState {
    /// Whether a build is queued or running.
    pub fn is_in_flight(self) -> bool {
        matches!(self, MeshState::Queued | MeshState::Building)
    }
}

/// Inputs to the state machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeshEvent {
    /// Scheduler wants to queue the chunk.
    Schedule,
    /// A worker picked the chunk up.
    BeginBuild,
    /// The worker produced mesh data.
    BuildSucceeded,
    /// The worker failed to produce mesh data.
    BuildFailed,
    /// The graphics context accepted the mesh data.
    Uploaded,
    /// The graphics context rejected the upload.
    UploadFailed,
    /// Block content changed; current mesh data is stale.
    Invalidate,
    /// The chunk is being removed from the world.
    Evict,
}

/// What [`ChunkStatus::apply`] did with an event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The state moved (possibly to itself).
    Applied {
        /// State before the event.
        from: MeshState,
        /// State after the event.
        to: MeshState,
    },
    /// A build is in flight; the event was recorded and takes effect when it completes.
    Deferred,
    /// The event is not valid in the current state; nothing changed.
    Rejected {
        /// State the chunk stayed in.
        state: MeshState,
    },
}

impl Transition {
    /// Whether the event changed or was recorded against the chunk.
    pub fn accepted(self) -> bool {
        !matches!(self, Transition::Rejected { .. })
    }

    /// Whether the event landed the chunk in `state`.
    pub fn reached(self, state: MeshState) -> bool {
        matches!(self, Transition::Applied { to, .. } if to == state)
    }
}

/// Per-chunk mutable state, guarded by the chunk's own lock.
#[derive(Clone, Debug, Default)]
pub struct ChunkStatus {
    state: MeshState,
    mesh_generated: bool,
    features_populated: bool,
    dirty: bool,
    remesh_requested: bool,
    evicted: bool,
    consecutive_failures: u32,
}

impl ChunkStatus {
    /// Status of a freshly generated chunk: needs decoration, needs saving.
    pub fn generated() -> Self {
        ChunkStatus {
            dirty: true,
            ..Default::default()
        }
    }

    /// Status of a chunk restored from storage: already decorated, already saved.
    pub fn restored() -> Self {
        ChunkStatus {
            features_populated: true,
            ..Default::default()
        }
    }

    /// The single transition function for mesh state.
    pub fn apply(&mut self, event: MeshEvent) -> Transition {
        let from = self.state;
        let to = match (event, from) {
            (MeshEvent::Schedule, MeshState::Unmeshed) if !self.evicted => MeshState::Queued,
            (MeshEvent::BeginBuild, MeshState::Queued) => MeshState::Building,
            (MeshEvent::BuildSucceeded, MeshState::Building) => {
                if self.remesh_requested || self.evicted {
                    self.remesh_requested = false;
                    MeshState::Unmeshed
                } else {
                    self.consecutive_failures = 0;
                    MeshState::ReadyForUpload
                }
            }
            (MeshEvent::BuildFailed, MeshState::Building) => {
                self.remesh_requested = false;
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                MeshState::Unmeshed
            }
            (MeshEvent::Uploaded, MeshState::ReadyForUpload) if !self.evicted => {
                self.mesh_generated = true;
                MeshState::Settled
            }
            (MeshEvent::UploadFailed, MeshState::ReadyForUpload) => MeshState::Unmeshed,
            (MeshEvent::Invalidate, MeshState::Queued | MeshState::Building) => {
                self.remesh_requested = true;
                return Transition::Deferred;
            }
            (
                MeshEvent::Invalidate,
                MeshState::Unmeshed | MeshState::ReadyForUpload | MeshState::Settled,
            ) => MeshState::Unmeshed,
            (MeshEvent::Evict, _) => {
                self.evicted = true;
                self.mesh_generated = false;
                self.remesh_requested = false;
                MeshState::Unmeshed
            }
            (_, state) => return Transition::Rejected { state },
        };
        self.state = to;
        Transition::Applied { from, to }
    }

    /// Current mesh state.
    pub fn state(&self) -> MeshState {
        self.state
    }

    /// Whether the graphics context has ever received a mesh for this chunk.
    ///
    /// Stays `true` across invalidation: the last uploaded mesh keeps being drawn
    /// until a replacement lands.
    pub fn mesh_generated(&self) -> bool {
        self.mesh_generated
    }

    /// Whether built mesh data is current: waiting for upload or already uploaded.
    pub fn data_ready_for_gl(&self) -> bool {
        matches!(self.state, MeshState::ReadyForUpload | MeshState::Settled)
    }

    /// Whether a build is queued or running.
    pub fn mesh_build_in_flight(&self) -> bool {
        self.state.is_in_flight()
    }

    /// Whether the decoration pass has run.
    pub fn features_populated(&self) -> bool {
        self.features_populated
    }

    /// Records that the decoration pass ran. Returns `false` if it already had.
    pub fn mark_features_populated(&mut self) -> bool {
        !std::mem::replace(&mut self.features_populated, true)
    }

    /// Whether block content changed since it was last persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Sets or clears the dirty bit.
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Clears the dirty bit, returning whether it was set.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Whether the chunk has been removed from the world.
    pub fn is_evicted(&self) -> bool {
        self.evicted
    }

    /// Whether an invalidation is waiting for an in-flight build to finish.
    pub fn remesh_requested(&self) -> bool {
        self.remesh_requested
    }

    /// Failed builds since the last successful one.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settled() -> ChunkStatus {
        let mut status = ChunkStatus::generated();
        for event in [
            MeshEvent::Schedule,
            MeshEvent::BeginBuild,
            MeshEvent::BuildSucceeded,
            MeshEvent::Uploaded,
        ] {
            assert!(status.apply(event).accepted(), "{event:?} rejected");
        }
        status
    }

    #[test]
    fn full_cycle_reaches_settled() {
        let status = settled();
        assert_eq!(status.state(), MeshState::Settled);
        assert!(status.mesh_generated());
        assert!(status.data_ready_for_gl());
        assert!(!status.mesh_build_in_flight());
    }

    #[test]
    fn schedule_is_rejected_unless_unmeshed() {
        let mut status = ChunkStatus::generated();
        assert!(status.apply(MeshEvent::Schedule).reached(MeshState::Queued));
        assert_eq!(
            status.apply(MeshEvent::Schedule),
            Transition::Rejected {
                state: MeshState::Queued
            }
        );
        let mut status = settled();
        assert!(!status.apply(MeshEvent::Schedule).accepted());
    }

    #[test]
    fn invalidating_settled_keeps_old_geometry_flag() {
        let mut status = settled();
        assert!(status.apply(MeshEvent::Invalidate).reached(MeshState::Unmeshed));
        assert!(status.mesh_generated());
        assert!(!status.data_ready_for_gl());
    }

    #[test]
    fn invalidating_in_flight_build_discards_its_result() {
        let mut status = ChunkStatus::generated();
        status.apply(MeshEvent::Schedule);
        status.apply(MeshEvent::BeginBuild);
        assert_eq!(status.apply(MeshEvent::Invalidate), Transition::Deferred);
        assert_eq!(status.state(), MeshState::Building);
        assert!(status.apply(MeshEvent::BuildSucceeded).reached(MeshState::Unmeshed));
        assert!(!status.remesh_requested());
    }

    #[test]
    fn failure_returns_to_unmeshed_and_counts() {
        let mut status = ChunkStatus::generated();
        for expected in 1..=3 {
            status.apply(MeshEvent::Schedule);
            status.apply(MeshEvent::BeginBuild);
            assert!(status.apply(MeshEvent::BuildFailed).reached(MeshState::Unmeshed));
            assert_eq!(status.consecutive_failures(), expected);
        }
        status.apply(MeshEvent::Schedule);
        status.apply(MeshEvent::BeginBuild);
        status.apply(MeshEvent::BuildSucceeded);
        assert_eq!(status.consecutive_failures(), 0);
    }

    #[test]
    fn evicted_chunks_never_reschedule_or_upload() {
        let mut status = ChunkStatus::generated();
        status.apply(MeshEvent::Schedule);
        status.apply(MeshEvent::BeginBuild);
        status.apply(MeshEvent::Evict);
        assert!(!status.apply(MeshEvent::BuildSucceeded).accepted());
        assert!(!status.apply(MeshEvent::Schedule).accepted());
        assert!(status.is_evicted());
    }

    #[test]
    fn upload_failure_drops_back_to_unmeshed() {
        let mut status = ChunkStatus::generated();
        status.apply(MeshEvent::Schedule);
        status.apply(MeshEvent::BeginBuild);
        status.apply(MeshEvent::BuildSucceeded);
        assert!(status.apply(MeshEvent::UploadFailed).reached(MeshState::Unmeshed));
        assert!(!status.mesh_generated());

        // A failed re-upload keeps the flag from the earlier upload.
        let mut status = settled();
        status.apply(MeshEvent::Invalidate);
        status.apply(MeshEvent::Schedule);
        status.apply(MeshEvent::BeginBuild);
        status.apply(MeshEvent::BuildSucceeded);
        assert!(status.apply(MeshEvent::UploadFailed).reached(MeshState::Unmeshed));
        assert!(status.mesh_generated());
        assert!(!settled().apply(MeshEvent::UploadFailed).accepted());
    }

    #[test]
    fn feature_population_is_recorded_once() {
        let mut status = ChunkStatus::generated();
        assert!(status.mark_features_populated());
        assert!(!status.mark_features_populated());
        assert!(ChunkStatus::restored().features_populated());
        assert!(!ChunkStatus::restored().is_dirty());
    }
}
