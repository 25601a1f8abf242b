//! Playback time to history slot / screen column mapping
//!
//! Upstream players disagree on units: some report seconds, some
//! milliseconds, some mix the two between position and duration. Tagged
//! values are converted exactly. Untagged pairs go through a magnitude
//! heuristic that only exists for compatibility with such sources.

/// A time value as reported by the playback transport
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeValue {
    Seconds(f64),
    Milliseconds(f64),
    /// Unit unknown; treated as seconds unless the heuristic says otherwise
    Untagged(f64),
}

impl TimeValue {
    fn tagged_seconds(self) -> Option<f64> {
        match self {
            TimeValue::Seconds(s) => Some(s),
            TimeValue::Milliseconds(ms) => Some(ms / 1000.0),
            TimeValue::Untagged(_) => None,
        }
    }

    fn raw(self) -> f64 {
        match self {
            TimeValue::Seconds(v) | TimeValue::Milliseconds(v) | TimeValue::Untagged(v) => v,
        }
    }
}

impl Default for TimeValue {
    fn default() -> Self {
        TimeValue::Seconds(0.0)
    }
}

/// Guess units for an untagged (position, duration) pair.
///
/// - duration above the threshold, position not: duration is milliseconds
/// - both above: both are milliseconds
/// - only position above: position is milliseconds
pub fn normalize_untagged(position: f64, duration: f64, threshold: f64) -> (f64, f64) {
    let position_big = position > threshold;
    let duration_big = duration > threshold;
    match (position_big, duration_big) {
        (false, true) => (position, duration / 1000.0),
        (true, true) => (position / 1000.0, duration / 1000.0),
        (true, false) => (position / 1000.0, duration),
        (false, false) => (position, duration),
    }
}

/// Resolve a position/duration pair to seconds
pub fn to_seconds(position: TimeValue, duration: TimeValue, threshold: f64) -> (f64, f64) {
    let (position, duration) = match (position.tagged_seconds(), duration.tagged_seconds()) {
        (Some(p), Some(d)) => (p, d),
        (Some(p), None) => (p, duration.raw()),
        (None, Some(d)) => (position.raw(), d),
        (None, None) => normalize_untagged(position.raw(), duration.raw(), threshold),
    };
    (finite_or_zero(position), finite_or_zero(duration))
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Fraction of the track played, clamped to [0, 1]. `None` while the
/// duration is unknown (zero, negative or not finite).
pub fn progress(position_secs: f64, duration_secs: f64) -> Option<f64> {
    if !(duration_secs > 0.0) || !duration_secs.is_finite() {
        return None;
    }
    Some((position_secs / duration_secs).clamp(0.0, 1.0))
}

/// History slot for a progress value
pub fn slot_index(progress: f64, bins: usize) -> usize {
    index_for(progress, bins)
}

/// Plot-local column for a progress value
pub fn column_for_progress(progress: f64, plot_width: usize) -> usize {
    index_for(progress, plot_width)
}

fn index_for(progress: f64, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    let p = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
    ((p * count as f64).floor() as usize).min(count - 1)
}

/// Slots overlapping plot column `column` at `plot_width`. Never empty.
///
/// A slot straddling a column boundary belongs to both neighbours, so
/// `slot_index(p)` always lies in the range of `column_for_progress(p)`.
pub fn slot_range_for_column(
    column: usize,
    plot_width: usize,
    bins: usize,
) -> std::ops::Range<usize> {
    if plot_width == 0 || bins == 0 {
        return 0..0;
    }
    let start = (column * bins / plot_width).min(bins - 1);
    let end = ((column + 1) * bins).div_ceil(plot_width).clamp(start + 1, bins);
    start..end
}

/// Where the current column comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnSource {
    /// Duration known; column derived from progress
    Progress { progress: f64, slot: usize },
    /// Duration unknown; column taken from the fallback counter
    Fallback,
}

/// Left-to-right counter used while the duration is unknown
///
/// Advances by one per painted column and stops at the last plot column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FallbackCounter {
    next: usize,
}

impl FallbackCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column to paint next, clamped to the plot
    pub fn column(&self, plot_width: usize) -> usize {
        self.next.min(plot_width.saturating_sub(1))
    }

    /// Return the column to paint and advance
    pub fn advance(&mut self, plot_width: usize) -> usize {
        let column = self.column(plot_width);
        self.next = (column + 1).min(plot_width.saturating_sub(1));
        column
    }

    pub fn value(&self) -> usize {
        self.next
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}
