//! Amplitude to color mapping
//!
//! Amplitude goes to dB, dB is normalized over a fixed floor, a power tone
//! curve pushes low-level noise towards black, and the result indexes a
//! multi-stop color ramp. Both the curve and the ramp are plain data from
//! `RibbonConfig`.

use crate::config::{ColorStop, ToneConfig};
use tiny_skia::{ColorU8, PremultipliedColorU8};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneCurve {
    floor_db: f32,
    exponent: f32,
    min_amplitude: f32,
}

impl ToneCurve {
    pub fn new(config: &ToneConfig) -> Self {
        Self {
            floor_db: config.floor_db.max(f32::EPSILON),
            exponent: config.exponent.max(f32::EPSILON),
            min_amplitude: config.min_amplitude.max(f32::MIN_POSITIVE),
        }
    }

    pub fn to_db(&self, amplitude: f32) -> f32 {
        20.0 * amplitude.max(self.min_amplitude).log10()
    }

    /// dB mapped onto [0, 1]: `-floor_db` and below is 0, full scale is 1
    pub fn normalize_db(&self, db: f32) -> f32 {
        ((db + self.floor_db) / self.floor_db).clamp(0.0, 1.0)
    }

    /// Amplitude in [0, 1] to tone-mapped value in [0, 1]
    pub fn apply(&self, amplitude: f32) -> f32 {
        let amplitude = if amplitude.is_nan() { 0.0 } else { amplitude };
        self.normalize_db(self.to_db(amplitude)).powf(self.exponent)
    }
}

impl Default for ToneCurve {
    fn default() -> Self {
        Self::new(&ToneConfig::default())
    }
}

/// Multi-stop color ramp sampled by tone-mapped value
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    stops: Vec<ColorStop>,
}

impl ColorRamp {
    /// Stops are sorted by position; an empty list falls back to black-to-white
    pub fn new(stops: &[ColorStop]) -> Self {
        let mut stops = stops.to_vec();
        if stops.is_empty() {
            stops = vec![
                ColorStop::new(0.0, [0, 0, 0]),
                ColorStop::new(1.0, [255, 255, 255]),
            ];
        }
        stops.sort_by(|a, b| a.position.total_cmp(&b.position));
        Self { stops }
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    pub fn sample(&self, t: f32) -> [u8; 3] {
        let t = if t.is_nan() { 0.0 } else { t };
        let first = self.stops[0];
        if t <= first.position {
            return first.rgb;
        }

        for pair in self.stops.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if t <= hi.position {
                let span = hi.position - lo.position;
                let f = if span > 0.0 { (t - lo.position) / span } else { 1.0 };
                return lerp_rgb(lo.rgb, hi.rgb, f);
            }
        }

        self.stops[self.stops.len() - 1].rgb
    }
}

fn lerp_rgb(a: [u8; 3], b: [u8; 3], f: f32) -> [u8; 3] {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * f).round().clamp(0.0, 255.0) as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2])]
}

/// Tone curve plus ramp: amplitude straight to a pixel
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    tone: ToneCurve,
    ramp: ColorRamp,
}

impl Palette {
    pub fn new(tone: &ToneConfig, stops: &[ColorStop]) -> Self {
        Self {
            tone: ToneCurve::new(tone),
            ramp: ColorRamp::new(stops),
        }
    }

    pub fn tone(&self) -> &ToneCurve {
        &self.tone
    }

    pub fn ramp(&self) -> &ColorRamp {
        &self.ramp
    }

    /// Straight-alpha color. Alpha follows the tone value so silence is
    /// close to transparent and loud content close to opaque.
    pub fn color(&self, amplitude: f32) -> ColorU8 {
        let t = self.tone.apply(amplitude);
        let [r, g, b] = self.ramp.sample(t);
        let alpha = (t.sqrt() * 255.0).round().clamp(0.0, 255.0) as u8;
        ColorU8::from_rgba(r, g, b, alpha)
    }

    pub fn pixel(&self, amplitude: f32) -> PremultipliedColorU8 {
        self.color(amplitude).premultiply()
    }
}
