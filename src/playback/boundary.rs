/// Floors `seconds` to a multiple of `interval`. Negative and non-finite
/// times align to 0.
pub fn align_to_boundary(seconds: f64, interval: u64) -> u64 {
    if interval == 0 || !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    let whole = seconds.floor() as u64;
    whole / interval * interval
}

/// Remembers the last boundary handled for one video. Following a different
/// video forgets the marker, so every video starts its own cadence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryGate {
    video_id: Option<String>,
    last: Option<u64>,
}

impl BoundaryGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the video changed (and the marker was cleared).
    pub fn follow(&mut self, video_id: &str) -> bool {
        if self.video_id.as_deref() == Some(video_id) {
            return false;
        }
        self.video_id = Some(video_id.to_string());
        self.last = None;
        true
    }

    pub fn is_handled(&self, boundary: u64) -> bool {
        self.last == Some(boundary)
    }

    pub fn mark(&mut self, boundary: u64) {
        self.last = Some(boundary);
    }

    pub fn last(&self) -> Option<u64> {
        self.last
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
