//! Presentation compositor
//!
//! Every tick the visible surface is rebuilt from scratch: the offscreen
//! ribbon is copied in byte for byte, then axes, tick labels and the
//! waterline are drawn on top. Nothing drawn here ever reaches the offscreen
//! buffer.

use crate::glyphs::{self, GLYPH_ADVANCE};
use crate::raster::PlotRect;
use crate::timeline::column_for_progress;
use tiny_skia::{Color, Paint, Pixmap, Rect, Transform};

/// Lowest band frequency emitted by the analyzer
pub const MIN_FREQUENCY_HZ: f32 = 20.0;
/// Highest band frequency emitted by the analyzer, before the Nyquist cap
pub const MAX_FREQUENCY_HZ: f32 = 20_000.0;

const FREQUENCY_TICKS_HZ: [f32; 9] = [
    50.0, 100.0, 200.0, 500.0, 1_000.0, 2_000.0, 5_000.0, 10_000.0, 20_000.0,
];

/// Tick mark length in font pixels
const TICK_LENGTH: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct AxisTick {
    /// Surface y for frequency ticks, surface x for time ticks
    pub position: f32,
    pub label: String,
}

pub fn frequency_label(hz: f32) -> String {
    if hz >= 1_000.0 {
        format!("{}k", (hz / 1_000.0).round() as u32)
    } else {
        format!("{}", hz.round() as u32)
    }
}

/// `m:ss`
pub fn time_label(secs: f64) -> String {
    let total = if secs.is_finite() { secs.max(0.0).round() as u64 } else { 0 };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Y ticks for log-spaced bands running from 20 Hz to min(20 kHz, Nyquist)
pub fn frequency_ticks(plot: &PlotRect, nyquist_hz: f32) -> Vec<AxisTick> {
    let top_hz = MAX_FREQUENCY_HZ.min(nyquist_hz);
    if plot.height < 2 || !(top_hz > MIN_FREQUENCY_HZ) {
        return Vec::new();
    }
    let span = (top_hz / MIN_FREQUENCY_HZ).ln();
    let rows = (plot.height - 1) as f32;

    FREQUENCY_TICKS_HZ
        .iter()
        .filter(|hz| **hz <= top_hz)
        .map(|hz| {
            let up = (hz / MIN_FREQUENCY_HZ).ln() / span;
            AxisTick {
                position: plot.top as f32 + (1.0 - up) * rows,
                label: frequency_label(*hz),
            }
        })
        .collect()
}

/// Horizontal extent of a label centred on `x`, kept on the surface
fn label_span(x: f32, label: &str, pixel_size: u32, surface_width: u32) -> (f32, f32) {
    let width = glyphs::text_width(label, pixel_size) as f32;
    let max_left = (surface_width as f32 - width).max(0.0);
    let left = (x - width / 2.0).clamp(0.0, max_left);
    (left, left + width)
}

/// X ticks every `step_secs` inside the track plus one at the duration.
///
/// Regular ticks whose label would collide with the final label are dropped.
/// Returns nothing while the duration is unknown.
pub fn time_ticks(
    plot: &PlotRect,
    surface_width: u32,
    duration_secs: Option<f64>,
    step_secs: u32,
    pixel_size: u32,
) -> Vec<AxisTick> {
    let duration = match duration_secs {
        Some(d) if d > 0.0 && d.is_finite() => d,
        _ => return Vec::new(),
    };
    if plot.width == 0 {
        return Vec::new();
    }

    let final_tick = AxisTick {
        position: plot.right() as f32 - 0.5,
        label: time_label(duration),
    };
    let (final_left, _) = label_span(
        final_tick.position,
        &final_tick.label,
        pixel_size,
        surface_width,
    );
    let spacing = (GLYPH_ADVANCE * pixel_size) as f32;

    let mut ticks = Vec::new();
    if step_secs > 0 {
        let step = f64::from(step_secs);
        let mut t = step;
        while t < duration {
            let column = column_for_progress(t / duration, plot.width as usize);
            let position = plot.column_x(column) as f32 + 0.5;
            let label = time_label(t);
            let (_, right) = label_span(position, &label, pixel_size, surface_width);
            if right + spacing <= final_left {
                ticks.push(AxisTick { position, label });
            }
            t += step;
        }
    }
    ticks.push(final_tick);
    ticks
}

/// Smoothed y-position of the loudest band
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Waterline {
    y: Option<f32>,
    alpha: f32,
}

impl Waterline {
    /// Feed the current peak row. The first sample after a reset is taken as
    /// is; later samples are averaged with weight `smoothing` on the old value.
    pub fn update(&mut self, target_y: f32, alpha: f32, smoothing: f32) {
        let smoothing = smoothing.clamp(0.0, 1.0);
        self.y = Some(match self.y {
            Some(y) => y * smoothing + target_y * (1.0 - smoothing),
            None => target_y,
        });
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn y(&self) -> Option<f32> {
        self.y
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Everything the overlay needs besides the two pixmaps
#[derive(Debug, Clone, Copy)]
pub struct Overlay<'a> {
    pub plot: &'a PlotRect,
    pub nyquist_hz: f32,
    pub duration_secs: Option<f64>,
    pub time_tick_secs: u32,
    pub waterline: &'a Waterline,
}

#[derive(Debug, Clone)]
pub struct Compositor {
    pixel_size: u32,
    axis_color: Color,
    label_color: Color,
    waterline_rgb: [u8; 3],
}

impl Compositor {
    /// `pixel_size` is the integer device scale used for lines and glyphs
    pub fn new(pixel_size: u32) -> Self {
        Self {
            pixel_size: pixel_size.max(1),
            axis_color: Color::from_rgba8(150, 150, 160, 200),
            label_color: Color::from_rgba8(200, 200, 200, 255),
            waterline_rgb: [255, 244, 220],
        }
    }

    pub fn pixel_size(&self) -> u32 {
        self.pixel_size
    }

    pub fn set_pixel_size(&mut self, pixel_size: u32) {
        self.pixel_size = pixel_size.max(1);
    }

    /// Rebuild `visible` from `offscreen` plus the overlay.
    ///
    /// Returns false, leaving `visible` cleared, if the buffers differ in size.
    pub fn compose(&self, visible: &mut Pixmap, offscreen: &Pixmap, overlay: &Overlay<'_>) -> bool {
        if visible.width() != offscreen.width() || visible.height() != offscreen.height() {
            visible.fill(Color::TRANSPARENT);
            return false;
        }
        visible.data_mut().copy_from_slice(offscreen.data());

        if overlay.plot.is_empty() {
            return true;
        }
        self.draw_axes(visible, overlay.plot);
        self.draw_frequency_ticks(visible, overlay);
        self.draw_time_ticks(visible, overlay);
        self.draw_waterline(visible, overlay);
        true
    }

    fn fill(&self, pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = false;
        if let Some(rect) = Rect::from_xywh(x, y, w, h) {
            pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        }
    }

    fn draw_axes(&self, pixmap: &mut Pixmap, plot: &PlotRect) {
        let line = self.pixel_size as f32;
        let left = plot.left as f32;
        let bottom = plot.bottom() as f32;
        self.fill(
            pixmap,
            left - line,
            plot.top as f32,
            line,
            plot.height as f32 + line,
            self.axis_color,
        );
        self.fill(pixmap, left - line, bottom, plot.width as f32 + line, line, self.axis_color);
    }

    fn draw_frequency_ticks(&self, pixmap: &mut Pixmap, overlay: &Overlay<'_>) {
        let size = self.pixel_size;
        let line = size as f32;
        let tick = (TICK_LENGTH * size) as f32;
        let axis_x = overlay.plot.left as f32 - line;
        let text_h = glyphs::text_height(size) as f32;

        for t in frequency_ticks(overlay.plot, overlay.nyquist_hz) {
            let y = t.position.floor();
            self.fill(pixmap, axis_x - tick, y, tick, line, self.axis_color);

            let width = glyphs::text_width(&t.label, size) as f32;
            let x = (axis_x - tick - line - width).max(0.0);
            let label_y = (y - text_h / 2.0).max(0.0);
            glyphs::draw_text(pixmap, &t.label, x, label_y, size, self.label_color);
        }
    }

    fn draw_time_ticks(&self, pixmap: &mut Pixmap, overlay: &Overlay<'_>) {
        let size = self.pixel_size;
        let line = size as f32;
        let tick = (TICK_LENGTH * size) as f32;
        let axis_y = overlay.plot.bottom() as f32 + line;

        let ticks = time_ticks(
            overlay.plot,
            pixmap.width(),
            overlay.duration_secs,
            overlay.time_tick_secs,
            size,
        );
        for t in ticks {
            let x = t.position.floor();
            self.fill(pixmap, x, axis_y, line, tick, self.axis_color);

            let (left, _) = label_span(t.position, &t.label, size, pixmap.width());
            glyphs::draw_text(pixmap, &t.label, left, axis_y + tick + line, size, self.label_color);
        }
    }

    fn draw_waterline(&self, pixmap: &mut Pixmap, overlay: &Overlay<'_>) {
        let Some(y) = overlay.waterline.y() else {
            return;
        };
        let alpha = overlay.waterline.alpha();
        if alpha * 255.0 < 1.0 {
            return;
        }
        let plot = overlay.plot;
        let line = self.pixel_size as f32;
        let y = (y - line / 2.0)
            .round()
            .clamp(plot.top as f32, (plot.bottom() as f32 - line).max(plot.top as f32));
        let [r, g, b] = self.waterline_rgb;
        let color = Color::from_rgba8(r, g, b, (alpha * 230.0).round() as u8);
        self.fill(pixmap, plot.left as f32, y, plot.width as f32, line, color);
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(1)
    }
}
