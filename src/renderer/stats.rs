//! Per-frame counters.

/// Counters accumulated over one frame, reset by the executor at frame start.
///
/// These exist for tests and profiling overlays; nothing in the scheduler
/// reads them back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    /// Material switches seen by the dispatcher, including forced splits on
    /// shared materials.
    pub material_switches: u32,
    pub pipeline_binds: u32,
    pub render_target_binds: u32,
    /// Individual light uniform uploads.
    pub light_uploads: u32,
    /// Draws skipped because their shader variant failed to compile.
    pub skipped_failed: u32,
    /// Draws skipped by the frame render cap.
    pub skipped_capped: u32,
    pub passes: u32,
}

impl FrameStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
