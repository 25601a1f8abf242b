//! Backfill for columns skipped between two render ticks
//!
//! When playback advances more than one column between frames, the skipped
//! columns are painted with a blend of the previous and latest frames so the
//! ribbon has no holes. The blend weight eases towards the latest frame and
//! the final column is always the latest frame itself.

use crate::config::GapConfig;

/// One column to paint as part of a gap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapColumn {
    pub column: usize,
    /// Weight of the latest frame, 1.0 is the latest frame exactly
    pub weight: f32,
    /// The column the playhead is actually on
    pub is_final: bool,
}

/// Cubic ease-in-out on [0, 1]
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapPolicy {
    large_gap_columns: usize,
    large_gap_floor: f32,
    small_gap_floor: f32,
}

impl GapPolicy {
    pub fn new(config: &GapConfig) -> Self {
        Self {
            large_gap_columns: config.large_gap_columns.max(1),
            large_gap_floor: config.large_gap_floor.clamp(0.0, 1.0),
            small_gap_floor: config.small_gap_floor.clamp(0.0, 1.0),
        }
    }

    /// Minimum blend weight for a gap of `columns`
    pub fn floor_for(&self, columns: usize) -> f32 {
        if columns >= self.large_gap_columns {
            self.large_gap_floor
        } else {
            self.small_gap_floor
        }
    }

    /// Columns to paint moving the playhead from `from` to `to`.
    ///
    /// Without a previous column, or when playback did not move right, only
    /// `to` is painted.
    pub fn plan(&self, from: Option<usize>, to: usize) -> Vec<GapColumn> {
        let from = match from {
            Some(from) if to > from => from,
            _ => {
                return vec![GapColumn {
                    column: to,
                    weight: 1.0,
                    is_final: true,
                }];
            }
        };

        let span = to - from;
        let floor = self.floor_for(span);
        (1..=span)
            .map(|k| {
                if k == span {
                    return GapColumn {
                        column: to,
                        weight: 1.0,
                        is_final: true,
                    };
                }
                let eased = smoothstep(k as f32 / span as f32);
                GapColumn {
                    column: from + k,
                    weight: floor + (1.0 - floor) * eased,
                    is_final: false,
                }
            })
            .collect()
    }
}

impl Default for GapPolicy {
    fn default() -> Self {
        Self::new(&GapConfig::default())
    }
}
