//! Synthetic analysis engine and playback transport for the demo command

use spectral_ribbon::{
    AnalysisChannel, AnalysisEvent, FrameSink, PlaybackSnapshot, PlaybackSource, RibbonError,
    SPECTRAL_CHANNEL, TimeValue, TrackIdentity, encode_frame,
};
use std::f32::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tiny_skia::Pixmap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Roughly the rate the real analyzer emits at
const EMIT_INTERVAL: Duration = Duration::from_millis(17);

/// Band magnitudes for a moving tone over a pulsing bass line
pub fn synth_bands(t: f32, band_count: usize) -> Vec<f32> {
    let n = band_count as f32;
    let center = (0.5 + 0.4 * (t * 0.7).sin()) * n;
    let pulse = 0.5 + 0.5 * (t * TAU * 2.0).sin();

    (0..band_count)
        .map(|i| {
            let x = i as f32;
            let tone = 0.9 * (-((x - center) / 3.0).powi(2)).exp();
            let bass = 0.6 * pulse * (-x / 6.0).exp();
            // cheap deterministic hiss
            let hiss = 0.01 * (1.0 + (x * 12.9898 + t * 78.233).sin()) / 2.0;
            (tone + bass + hiss).clamp(0.0, 1.0)
        })
        .collect()
}

/// Pretends to be the analysis engine: emits frames on `SPECTRAL_CHANNEL`
/// while capture is enabled
pub struct SyntheticEngine {
    events: mpsc::Sender<AnalysisEvent>,
    band_count: usize,
    started: Instant,
    runtime: Handle,
    running: Option<CancellationToken>,
}

impl SyntheticEngine {
    /// Must be created inside a tokio runtime
    pub fn new(events: mpsc::Sender<AnalysisEvent>, band_count: usize, started: Instant) -> Self {
        Self {
            events,
            band_count,
            started,
            runtime: Handle::current(),
            running: None,
        }
    }
}

impl AnalysisChannel for SyntheticEngine {
    fn enable_capture(&mut self) -> spectral_ribbon::Result<()> {
        if self.running.is_some() {
            return Ok(());
        }
        if self.events.is_closed() {
            return Err(RibbonError::Capture("event stream closed".into()));
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let events = self.events.clone();
        let band_count = self.band_count;
        let started = self.started;

        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(EMIT_INTERVAL);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let t = started.elapsed().as_secs_f32();
                        let payload = encode_frame(&synth_bands(t, band_count));
                        // fire and forget, a full queue just drops the frame
                        let _ = events.try_send(AnalysisEvent::new(SPECTRAL_CHANNEL, payload));
                    }
                }
            }
        });
        self.running = Some(cancel);
        log::info!("Synthetic capture started ({} bands)", self.band_count);
        Ok(())
    }

    fn disable_capture(&mut self) -> spectral_ribbon::Result<()> {
        if let Some(cancel) = self.running.take() {
            cancel.cancel();
            log::info!("Synthetic capture stopped");
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.running.is_some()
    }
}

/// Wall-clock playback of a fixed-length track
pub struct SimulatedPlayback {
    started: Instant,
    duration_secs: f64,
    untagged_ms: bool,
    track: TrackIdentity,
}

impl SimulatedPlayback {
    /// `duration_secs` of 0 reports an unknown duration
    pub fn new(started: Instant, duration_secs: f64, untagged_ms: bool) -> Self {
        Self {
            started,
            duration_secs,
            untagged_ms,
            track: TrackIdentity::new("Synthetic Sweep", "spectral-ribbon", "Demo"),
        }
    }

    fn position_secs(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if self.duration_secs > 0.0 {
            elapsed.min(self.duration_secs)
        } else {
            elapsed
        }
    }
}

impl PlaybackSource for SimulatedPlayback {
    fn snapshot(&self) -> PlaybackSnapshot {
        let position = self.position_secs();
        let (position, duration) = if self.untagged_ms {
            (
                TimeValue::Untagged(position * 1000.0),
                TimeValue::Untagged(self.duration_secs * 1000.0),
            )
        } else {
            (
                TimeValue::Seconds(position),
                TimeValue::Seconds(self.duration_secs),
            )
        };
        PlaybackSnapshot {
            position,
            duration,
            track: Some(self.track.clone()),
        }
    }
}

/// Counts presented frames
#[derive(Clone, Default)]
pub struct CountingSink {
    presented: Arc<AtomicUsize>,
}

impl CountingSink {
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.presented.clone()
    }
}

impl FrameSink for CountingSink {
    fn present(&mut self, _frame: &Pixmap) {
        self.presented.fetch_add(1, Ordering::Relaxed);
    }
}
