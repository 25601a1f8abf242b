//! Time-indexed history of painted spectra for the current track
//!
//! Slots are indexed by playback progress, never by pixel column, so the grid
//! survives any number of resizes. Storage is one flat allocation made up
//! front; `clear` zeroes it in place.

use crate::frame::SpectralFrame;
use crate::timeline::slot_range_for_column;

#[derive(Debug)]
pub struct HistoryGrid {
    bins: usize,
    band_count: usize,
    values: Vec<f32>,
    present: Vec<bool>,
    present_count: usize,
    generation: u64,
}

impl HistoryGrid {
    pub fn new(bins: usize, band_count: usize) -> Self {
        Self {
            bins,
            band_count,
            values: vec![0.0; bins * band_count],
            present: vec![false; bins],
            present_count: 0,
            generation: 0,
        }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn band_count(&self) -> usize {
        self.band_count
    }

    /// Store `frame` at `slot`, overwriting whatever was there.
    /// Out-of-range slots and frames of the wrong length are ignored.
    pub fn save(&mut self, slot: usize, frame: &SpectralFrame) -> bool {
        if slot >= self.bins || frame.len() != self.band_count {
            return false;
        }
        let start = slot * self.band_count;
        self.values[start..start + self.band_count].copy_from_slice(frame.bands());
        if !self.present[slot] {
            self.present[slot] = true;
            self.present_count += 1;
        }
        true
    }

    /// Bands stored at `slot`, if present
    pub fn get(&self, slot: usize) -> Option<&[f32]> {
        if !self.is_present(slot) {
            return None;
        }
        let start = slot * self.band_count;
        Some(&self.values[start..start + self.band_count])
    }

    pub fn is_present(&self, slot: usize) -> bool {
        self.present.get(slot).copied().unwrap_or(false)
    }

    pub fn present_count(&self) -> usize {
        self.present_count
    }

    pub fn is_empty(&self) -> bool {
        self.present_count == 0
    }

    /// Presence mask, one entry per slot
    pub fn mask(&self) -> &[bool] {
        &self.present
    }

    /// Number of times the grid has been cleared
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Zero every slot and the presence mask without reallocating
    pub fn clear(&mut self) {
        self.values.fill(0.0);
        self.present.fill(false);
        self.present_count = 0;
        self.generation += 1;
    }

    /// Most recent present slot overlapping `column` at `plot_width`
    pub fn slot_for_column(&self, column: usize, plot_width: usize) -> Option<usize> {
        slot_range_for_column(column, plot_width, self.bins)
            .rev()
            .find(|&slot| self.present[slot])
    }

    /// Walk every column of a plot `plot_width` wide, yielding the stored
    /// bands for columns that have history. Columns without history are
    /// skipped.
    pub fn replay(&self, plot_width: usize) -> impl Iterator<Item = (usize, &[f32])> + '_ {
        (0..plot_width).filter_map(move |column| {
            let slot = self.slot_for_column(column, plot_width)?;
            self.get(slot).map(|bands| (column, bands))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{column_for_progress, slot_index};

    fn frame(v: f32) -> SpectralFrame {
        SpectralFrame::new(vec![v; 4])
    }

    #[test]
    fn test_save_and_get() {
        let mut grid = HistoryGrid::new(16, 4);
        assert!(grid.save(3, &frame(0.5)));
        assert_eq!(grid.get(3), Some(&[0.5; 4][..]));
        assert_eq!(grid.get(4), None);
        assert_eq!(grid.present_count(), 1);
    }

    #[test]
    fn test_resave_overwrites() {
        let mut grid = HistoryGrid::new(16, 4);
        grid.save(3, &frame(0.5));
        grid.save(3, &frame(0.9));
        assert_eq!(grid.get(3), Some(&[0.9; 4][..]));
        assert_eq!(grid.present_count(), 1);
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut grid = HistoryGrid::new(16, 4);
        assert!(!grid.save(16, &frame(0.5)));
        assert!(!grid.save(0, &SpectralFrame::new(vec![0.5; 3])));
        assert!(grid.is_empty());
    }

    #[test]
    fn test_clear_then_save_leaves_one_slot() {
        let mut grid = HistoryGrid::new(32, 4);
        for slot in 0..10 {
            grid.save(slot, &frame(0.4));
        }

        grid.clear();
        assert!(grid.mask().iter().all(|present| !present));
        assert_eq!(grid.generation(), 1);
        assert_eq!(grid.get(0), None);

        grid.save(7, &frame(0.2));
        assert_eq!(grid.mask().iter().filter(|p| **p).count(), 1);
        assert_eq!(grid.present_count(), 1);
    }

    #[test]
    fn test_replay_skips_missing_columns() {
        let mut grid = HistoryGrid::new(100, 4);
        grid.save(10, &frame(0.1));
        grid.save(55, &frame(0.5));

        let columns: Vec<usize> = grid.replay(10).map(|(column, _)| column).collect();
        assert_eq!(columns, vec![1, 5]);
    }

    #[test]
    fn test_replay_keeps_progress_after_resize() {
        let bins = 4096;
        let mut grid = HistoryGrid::new(bins, 4);
        grid.save(slot_index(0.3, bins), &frame(0.8));

        for width in [800, 1217, 300] {
            let column = column_for_progress(0.3, width);
            let painted: Vec<(usize, &[f32])> = grid.replay(width).collect();
            assert!(!painted.is_empty());
            assert!(painted.iter().any(|(c, bands)| *c == column && bands[0] > 0.0));
            for (c, _) in &painted {
                assert!(c.abs_diff(column) <= 1);
            }
        }
    }

    #[test]
    fn test_slot_for_column_prefers_latest_slot() {
        let mut grid = HistoryGrid::new(100, 4);
        grid.save(20, &frame(0.1));
        grid.save(29, &frame(0.9));
        assert_eq!(grid.slot_for_column(2, 10), Some(29));
    }
}
