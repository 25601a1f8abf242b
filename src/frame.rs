//! Spectral frame ingestion
//!
//! The analysis engine emits band vectors at its own irregular cadence. The
//! inbox keeps exactly two of them (latest and previous) so the render tick
//! can read a consistent pair without queueing. Writers decode outside the
//! lock and only hold it for a copy, so ingestion never stalls the channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Channel name the analysis engine publishes band vectors on
pub const SPECTRAL_CHANNEL: &str = "viz:spectral";

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// One vector of per-band magnitudes, low to high frequency, each in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralFrame {
    bands: Vec<f32>,
}

impl SpectralFrame {
    /// Build a frame, clamping every value into [0, 1] (NaN becomes 0)
    pub fn new(bands: Vec<f32>) -> Self {
        let mut frame = Self { bands };
        frame.bands.iter_mut().for_each(|v| *v = sanitize(*v));
        frame
    }

    pub fn silent(band_count: usize) -> Self {
        Self {
            bands: vec![0.0; band_count],
        }
    }

    pub fn bands(&self) -> &[f32] {
        &self.bands
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Index and value of the loudest band
    pub fn peak(&self) -> Option<(usize, f32)> {
        self.bands
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (i, v)| match best {
                Some((_, b)) if b >= v => best,
                _ => Some((i, v)),
            })
    }

    /// Linear blend: `weight` 0.0 is `from`, 1.0 is `to`
    pub fn blend(from: &SpectralFrame, to: &SpectralFrame, weight: f32) -> SpectralFrame {
        let w = weight.clamp(0.0, 1.0);
        let bands = from
            .bands
            .iter()
            .zip(to.bands.iter())
            .map(|(a, b)| a + (b - a) * w)
            .collect();
        SpectralFrame { bands }
    }

    fn copy_from(&mut self, other: &SpectralFrame) {
        self.bands.clear();
        self.bands.extend_from_slice(&other.bands);
    }
}

fn sanitize(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Encode bands the way the analysis engine does (little-endian f32)
pub fn encode_frame(bands: &[f32]) -> Vec<u8> {
    bands.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a payload, returning `None` unless it holds exactly `band_count` floats
pub fn decode_frame(payload: &[u8], band_count: usize) -> Option<Vec<f32>> {
    if payload.len() % F32_BYTES != 0 || payload.len() / F32_BYTES != band_count {
        return None;
    }

    Some(
        payload
            .chunks_exact(F32_BYTES)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// Copy of the inbox contents taken by the render tick
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub latest: SpectralFrame,
    pub previous: SpectralFrame,
    pub has_previous: bool,
}

impl FrameSnapshot {
    pub fn new(band_count: usize) -> Self {
        Self {
            latest: SpectralFrame::silent(band_count),
            previous: SpectralFrame::silent(band_count),
            has_previous: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: u64,
    pub dropped: u64,
}

#[derive(Debug)]
struct InboxState {
    latest: SpectralFrame,
    previous: SpectralFrame,
    has_previous: bool,
    has_new_column: bool,
}

/// Shared latest/previous frame buffers
///
/// Cloning the inbox hands out another handle to the same buffers; one clone
/// goes to whatever delivers analysis events, the other stays with the ribbon.
#[derive(Debug, Clone)]
pub struct FrameInbox {
    band_count: usize,
    state: Arc<Mutex<InboxState>>,
    accepted: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl FrameInbox {
    pub fn new(band_count: usize) -> Self {
        Self {
            band_count,
            state: Arc::new(Mutex::new(InboxState {
                latest: SpectralFrame::silent(band_count),
                previous: SpectralFrame::silent(band_count),
                has_previous: false,
                has_new_column: false,
            })),
            accepted: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn band_count(&self) -> usize {
        self.band_count
    }

    /// Route a named analysis event; anything not on the spectral channel is ignored
    pub fn on_event(&self, channel: &str, payload: &[u8]) -> bool {
        if channel != SPECTRAL_CHANNEL {
            return false;
        }
        self.ingest(payload)
    }

    /// Accept a byte-encoded frame. Malformed payloads are dropped silently.
    pub fn ingest(&self, payload: &[u8]) -> bool {
        match decode_frame(payload, self.band_count) {
            Some(bands) => self.store(SpectralFrame::new(bands)),
            None => self.drop_payload(payload.len()),
        }
    }

    /// Accept an already-decoded frame, with the same length check
    pub fn ingest_bands(&self, bands: &[f32]) -> bool {
        if bands.len() != self.band_count {
            return self.drop_payload(bands.len() * F32_BYTES);
        }
        self.store(SpectralFrame::new(bands.to_vec()))
    }

    fn drop_payload(&self, len: usize) -> bool {
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!(
            "Dropped malformed spectral frame ({} bytes, expected {}), {} dropped so far",
            len,
            self.band_count * F32_BYTES,
            dropped
        );
        false
    }

    fn store(&self, frame: SpectralFrame) -> bool {
        let mut state = self.lock();
        let InboxState {
            latest, previous, ..
        } = &mut *state;
        previous.copy_from(latest);
        *latest = frame;
        state.has_previous = true;
        state.has_new_column = true;
        drop(state);

        self.accepted.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Copy the current pair into `snapshot` if a new frame arrived since the
    /// last call, clearing the new-column flag. Returns whether it did.
    pub fn take_into(&self, snapshot: &mut FrameSnapshot) -> bool {
        let mut state = self.lock();
        if !state.has_new_column {
            return false;
        }
        state.has_new_column = false;
        snapshot.latest.copy_from(&state.latest);
        snapshot.previous.copy_from(&state.previous);
        snapshot.has_previous = state.has_previous;
        true
    }

    /// Whether a frame is waiting for the next tick
    pub fn has_new_column(&self) -> bool {
        self.lock().has_new_column
    }

    pub fn has_previous(&self) -> bool {
        self.lock().has_previous
    }

    pub fn latest(&self) -> SpectralFrame {
        self.lock().latest.clone()
    }

    pub fn previous(&self) -> SpectralFrame {
        self.lock().previous.clone()
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
