//! Offscreen column rasterizer
//!
//! Each column is written straight into the pixmap's pixel slice rather than
//! drawn through a scaled path, so the same input always yields the same
//! bytes.

use crate::config::PlotMargins;
use crate::palette::Palette;
use tiny_skia::{Pixmap, PremultipliedColorU8};

/// Logical surface size plus device pixel ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f32,
    pub height: f32,
    pub scale_factor: f32,
}

impl SurfaceSize {
    pub fn new(width: f32, height: f32, scale_factor: f32) -> Self {
        Self {
            width,
            height,
            scale_factor,
        }
    }

    /// Device pixel dimensions, at least 1x1
    pub fn physical(&self) -> (u32, u32) {
        let scale = if self.scale_factor.is_finite() && self.scale_factor > 0.0 {
            self.scale_factor
        } else {
            1.0
        };
        let px = |v: f32| {
            if v.is_finite() {
                (v * scale).round().clamp(1.0, u16::MAX as f32) as u32
            } else {
                1
            }
        };
        (px(self.width), px(self.height))
    }

    /// Integer scale used for chrome (glyphs, line widths)
    pub fn chrome_scale(&self) -> u32 {
        if self.scale_factor.is_finite() {
            self.scale_factor.round().max(1.0) as u32
        } else {
            1
        }
    }
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self::new(800.0, 240.0, 1.0)
    }
}

/// Data area of the surface, in device pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlotRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl PlotRect {
    pub fn from_surface(width: u32, height: u32, margins: &PlotMargins) -> Self {
        let edge = |total: u32, fraction: f32| {
            (total as f32 * fraction.clamp(0.0, 1.0)).round() as u32
        };
        let left = edge(width, margins.left).min(width);
        let right = width.saturating_sub(edge(width, margins.right)).max(left);
        let top = edge(height, margins.top).min(height);
        let bottom = height.saturating_sub(edge(height, margins.bottom)).max(top);

        Self {
            left,
            top,
            width: right - left,
            height: bottom - top,
        }
    }

    /// One past the last data column
    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    /// One past the last data row
    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Surface x for a plot-local column
    pub fn column_x(&self, column: usize) -> u32 {
        self.left + column as u32
    }

    /// Fractional band index shown at plot-local `row`; the top row is the
    /// highest band, the bottom row the lowest
    pub fn band_position(&self, row: u32, band_count: usize) -> f32 {
        if band_count < 2 || self.height < 2 {
            return 0.0;
        }
        let t = row as f32 / (self.height - 1) as f32;
        (1.0 - t) * (band_count - 1) as f32
    }

    /// Surface y for a fractional band index (inverse of `band_position`)
    pub fn band_y(&self, band: f32, band_count: usize) -> f32 {
        if band_count < 2 || self.height < 2 {
            return (self.bottom().saturating_sub(1)) as f32;
        }
        let t = 1.0 - (band / (band_count - 1) as f32).clamp(0.0, 1.0);
        self.top as f32 + t * (self.height - 1) as f32
    }
}

/// Amplitude at a fractional band index, linearly interpolated
pub fn sample_bands(bands: &[f32], position: f32) -> f32 {
    match bands.len() {
        0 => 0.0,
        1 => bands[0],
        len => {
            let position = position.clamp(0.0, (len - 1) as f32);
            let lo = position.floor() as usize;
            let hi = (lo + 1).min(len - 1);
            let frac = position - lo as f32;
            bands[lo] + (bands[hi] - bands[lo]) * frac
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnRasterizer {
    palette: Palette,
    column: Vec<PremultipliedColorU8>,
}

impl ColumnRasterizer {
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            column: Vec::new(),
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Paint `bands` as the full-height column at surface `x`. Rows outside
    /// the plot are written transparent. Returns false if `x` is off-surface.
    pub fn paint(&mut self, pixmap: &mut Pixmap, plot: &PlotRect, x: u32, bands: &[f32]) -> bool {
        let (width, height) = (pixmap.width(), pixmap.height());
        if x >= width {
            return false;
        }

        self.column.clear();
        self.column
            .resize(height as usize, PremultipliedColorU8::TRANSPARENT);

        let rows = plot.top.min(height)..plot.bottom().min(height);
        for y in rows {
            let position = plot.band_position(y - plot.top, bands.len());
            let amplitude = sample_bands(bands, position);
            self.column[y as usize] = self.palette.pixel(amplitude);
        }

        let pixels = pixmap.pixels_mut();
        for (y, pixel) in self.column.iter().enumerate() {
            pixels[y * width as usize + x as usize] = *pixel;
        }
        true
    }
}
