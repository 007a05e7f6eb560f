//! Per-frame scene statistics

/// Counters refreshed by every `simulate` and `render` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneStats {
    /// Live entities after the last sync point
    pub entity_count: usize,
    /// Draw calls issued by the last render
    pub draw_calls: u32,
    /// Wall time of the last simulate call in milliseconds
    pub simulate_ms: f32,
    /// Wall time of the last render call in milliseconds
    pub render_ms: f32,
    /// Completed render calls
    pub frames: u64,
}
