//! Lifecycle controller
//!
//! `Ribbon` owns every piece of render state and drives it from a single
//! synchronous `tick`. State machine:
//!
//! ```text
//! Uninitialized --enable--> Active <--disable/enable--> Suspended
//!        \                    |                            /
//!         `---------------- teardown --> TornDown <-------'
//! ```
//!
//! Analysis frames arrive through the shared [`FrameInbox`]; playback time is
//! polled from a [`PlaybackSource`] once per tick. Seeks and track changes
//! wipe the history and restart the cursor without changing state.

use crate::compositor::{Compositor, Overlay, Waterline};
use crate::config::RibbonConfig;
use crate::error::Result;
use crate::frame::{FrameInbox, FrameSnapshot, SpectralFrame};
use crate::gap::GapPolicy;
use crate::history::HistoryGrid;
use crate::palette::Palette;
use crate::raster::{ColumnRasterizer, PlotRect, SurfaceSize};
use crate::timeline::{self, ColumnSource, FallbackCounter, TimeValue};
use std::fmt;
use tiny_skia::{Color, Pixmap};

/// Control side of the external analysis engine
pub trait AnalysisChannel: Send {
    /// Ask the engine to start emitting spectral frames
    fn enable_capture(&mut self) -> Result<()>;

    /// Ask the engine to stop emitting spectral frames
    fn disable_capture(&mut self) -> Result<()>;

    fn is_capturing(&self) -> bool {
        false
    }
}

/// Identity of the playing track; any field change counts as a new track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackIdentity {
    pub title: String,
    pub artist: String,
    pub album: String,
}

impl TrackIdentity {
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
        }
    }
}

/// What the playback transport reports when polled
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSnapshot {
    pub position: TimeValue,
    pub duration: TimeValue,
    pub track: Option<TrackIdentity>,
}

pub trait PlaybackSource: Send {
    fn snapshot(&self) -> PlaybackSnapshot;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Active,
    Suspended,
    TornDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    Seek,
    TrackChange,
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetReason::Seek => write!(f, "seek"),
            ResetReason::TrackChange => write!(f, "track change"),
        }
    }
}

/// Per-track drawing position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderCursor {
    previous_column: Option<usize>,
    // previous_column came from the fallback counter
    previous_is_fallback: bool,
    fallback: FallbackCounter,
    waterline: Waterline,
}

impl RenderCursor {
    /// Plot column painted last, `None` when there is nothing to backfill from
    pub fn previous_column(&self) -> Option<usize> {
        self.previous_column
    }

    pub fn fallback(&self) -> &FallbackCounter {
        &self.fallback
    }

    pub fn waterline(&self) -> &Waterline {
        &self.waterline
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// The visible surface was rebuilt
    pub composed: bool,
    /// Offscreen columns painted this tick, gap columns included
    pub columns_painted: usize,
    pub reset: Option<ResetReason>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RibbonStats {
    pub ticks: u64,
    pub columns_painted: u64,
    pub resets: u64,
}

struct Buffers {
    offscreen: Pixmap,
    visible: Pixmap,
}

pub struct Ribbon {
    config: RibbonConfig,
    state: LifecycleState,
    inbox: FrameInbox,
    channel: Box<dyn AnalysisChannel>,
    playback: Box<dyn PlaybackSource>,
    history: HistoryGrid,
    rasterizer: ColumnRasterizer,
    gap: GapPolicy,
    compositor: Compositor,
    buffers: Option<Buffers>,
    surface: SurfaceSize,
    plot: PlotRect,
    cursor: RenderCursor,
    frames: FrameSnapshot,
    has_frame: bool,
    track: Option<TrackIdentity>,
    track_seen: bool,
    last_position: Option<f64>,
    last_duration: f64,
    sample_rate_hz: u32,
    stats: RibbonStats,
}

impl Ribbon {
    pub fn new(
        config: RibbonConfig,
        surface: SurfaceSize,
        channel: Box<dyn AnalysisChannel>,
        playback: Box<dyn PlaybackSource>,
    ) -> Self {
        let band_count = config.band_count;
        let palette = Palette::new(&config.tone, &config.palette);

        Self {
            state: LifecycleState::Uninitialized,
            inbox: FrameInbox::new(band_count),
            channel,
            playback,
            history: HistoryGrid::new(config.history_bins, band_count),
            rasterizer: ColumnRasterizer::new(palette),
            gap: GapPolicy::new(&config.gap),
            compositor: Compositor::new(surface.chrome_scale()),
            buffers: None,
            surface,
            plot: PlotRect::default(),
            cursor: RenderCursor::default(),
            frames: FrameSnapshot::new(band_count),
            has_frame: false,
            track: None,
            track_seen: false,
            last_position: None,
            last_duration: 0.0,
            sample_rate_hz: config.sample_rate_hz,
            stats: RibbonStats::default(),
            config,
        }
    }

    pub fn config(&self) -> &RibbonConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active
    }

    /// Handle for whatever delivers analysis events
    pub fn inbox(&self) -> &FrameInbox {
        &self.inbox
    }

    pub fn history(&self) -> &HistoryGrid {
        &self.history
    }

    pub fn cursor(&self) -> &RenderCursor {
        &self.cursor
    }

    pub fn plot(&self) -> &PlotRect {
        &self.plot
    }

    pub fn surface(&self) -> SurfaceSize {
        self.surface
    }

    pub fn stats(&self) -> RibbonStats {
        self.stats
    }

    pub fn channel(&self) -> &dyn AnalysisChannel {
        self.channel.as_ref()
    }

    /// Last composed frame, `None` before the first enable and after teardown
    pub fn visible(&self) -> Option<&Pixmap> {
        self.buffers.as_ref().map(|b| &b.visible)
    }

    pub fn offscreen(&self) -> Option<&Pixmap> {
        self.buffers.as_ref().map(|b| &b.offscreen)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Change the Nyquist used for frequency labels. History is kept.
    pub fn set_sample_rate(&mut self, hz: u32) {
        if hz == 0 {
            log::debug!("Ignoring zero sample rate");
            return;
        }
        if hz != self.sample_rate_hz {
            log::debug!("Sample rate changed {} -> {} Hz", self.sample_rate_hz, hz);
            self.sample_rate_hz = hz;
        }
    }

    /// Start (or resume) capture and rendering
    pub fn enable(&mut self) {
        match self.state {
            LifecycleState::Active => return,
            LifecycleState::TornDown => {
                log::debug!("Ignoring enable on a torn down ribbon");
                return;
            }
            LifecycleState::Uninitialized => self.allocate(),
            // nothing painted or observed while suspended, so no backfill and
            // no seek detection across the pause
            LifecycleState::Suspended => {
                self.cursor.previous_column = None;
                self.last_position = None;
            }
        }

        if let Err(e) = self.channel.enable_capture() {
            log::warn!("Failed to enable spectral capture: {}", e);
        }
        self.state = LifecycleState::Active;
        log::debug!("Ribbon active ({}x{} plot)", self.plot.width, self.plot.height);
    }

    /// Stop capture; history and buffers are kept for a later `enable`
    pub fn disable(&mut self) {
        if self.state != LifecycleState::Active {
            return;
        }
        self.state = LifecycleState::Suspended;
        if let Err(e) = self.channel.disable_capture() {
            log::warn!("Failed to disable spectral capture: {}", e);
        }
        log::debug!("Ribbon suspended");
    }

    /// Release everything. Safe to call any number of times.
    pub fn teardown(&mut self) {
        if self.state == LifecycleState::TornDown {
            return;
        }
        if let Err(e) = self.channel.disable_capture() {
            log::warn!("Failed to disable spectral capture during teardown: {}", e);
        }
        self.buffers = None;
        self.history.clear();
        self.cursor.reset();
        self.state = LifecycleState::TornDown;
        log::debug!("Ribbon torn down");
    }

    /// Adopt a new surface size and repaint the offscreen buffer from history
    pub fn resize(&mut self, surface: SurfaceSize) {
        if self.state == LifecycleState::TornDown {
            return;
        }
        self.surface = surface;
        self.compositor.set_pixel_size(surface.chrome_scale());

        if self.buffers.is_none() {
            return;
        }
        self.allocate();
        let painted = self.rebuild_from_history();
        log::debug!(
            "Resized to {:?}, rebuilt {} columns from {} history slots",
            surface.physical(),
            painted,
            self.history.present_count()
        );
        self.compose(self.last_duration);
    }

    /// Advance one render step
    pub fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.state != LifecycleState::Active {
            return outcome;
        }
        self.stats.ticks += 1;

        let snapshot = self.playback.snapshot();
        let (position, duration) = timeline::to_seconds(
            snapshot.position,
            snapshot.duration,
            self.config.unit_threshold,
        );
        self.last_duration = duration;

        outcome.reset = self.detect_discontinuity(position, snapshot.track);
        if let Some(reason) = outcome.reset {
            self.reset(reason);
        }

        if self.inbox.take_into(&mut self.frames) {
            self.has_frame = true;
            outcome.columns_painted = self.paint(position, duration);
            self.stats.columns_painted += outcome.columns_painted as u64;
        }
        self.update_waterline();

        outcome.composed = self.compose(duration);
        outcome
    }

    fn detect_discontinuity(
        &mut self,
        position: f64,
        track: Option<TrackIdentity>,
    ) -> Option<ResetReason> {
        let track_changed = self.track_seen && track != self.track;
        self.track_seen = true;
        self.track = track;

        let last = self.last_position.replace(position);
        if track_changed {
            return Some(ResetReason::TrackChange);
        }

        let delta = position - last?;
        let seek = &self.config.seek;
        if delta < -seek.backward_secs || delta > seek.forward_secs {
            Some(ResetReason::Seek)
        } else {
            None
        }
    }

    fn reset(&mut self, reason: ResetReason) {
        log::info!("{} detected, clearing spectral history", reason);
        self.history.clear();
        self.cursor.reset();
        self.has_frame = false;
        if let Some(buffers) = self.buffers.as_mut() {
            buffers.offscreen.fill(Color::TRANSPARENT);
        }
        self.stats.resets += 1;
    }

    fn column_source(&self, position: f64, duration: f64) -> ColumnSource {
        match timeline::progress(position, duration) {
            Some(progress) => ColumnSource::Progress {
                progress,
                slot: timeline::slot_index(progress, self.history.bins()),
            },
            None => ColumnSource::Fallback,
        }
    }

    /// Paint the newly taken frame (plus any gap) and record it in history
    fn paint(&mut self, position: f64, duration: f64) -> usize {
        let width = self.plot.width as usize;
        if self.buffers.is_none() || self.plot.is_empty() {
            return 0;
        }
        let bins = self.history.bins();

        match self.column_source(position, duration) {
            ColumnSource::Progress { progress, slot } => {
                let target = timeline::column_for_progress(progress, width);
                // fallback columns are not progress positions, never gap from one
                let from = if self.cursor.previous_is_fallback {
                    None
                } else {
                    self.cursor.previous_column
                };
                let plan = self.gap.plan(from, target);
                for column in &plan {
                    let frame = if column.is_final || !self.frames.has_previous {
                        self.frames.latest.clone()
                    } else {
                        SpectralFrame::blend(
                            &self.frames.previous,
                            &self.frames.latest,
                            column.weight,
                        )
                    };
                    let column_slot = if column.is_final {
                        slot
                    } else {
                        timeline::slot_range_for_column(column.column, width, bins).start
                    };
                    self.paint_column(column.column, column_slot, &frame);
                }
                self.cursor.previous_column = Some(target);
                self.cursor.previous_is_fallback = false;
                plan.len()
            }
            ColumnSource::Fallback => {
                let column = self.cursor.fallback.advance(width);
                let slot = timeline::slot_range_for_column(column, width, bins).start;
                let frame = self.frames.latest.clone();
                self.paint_column(column, slot, &frame);
                self.cursor.previous_column = Some(column);
                self.cursor.previous_is_fallback = true;
                1
            }
        }
    }

    fn paint_column(&mut self, column: usize, slot: usize, frame: &SpectralFrame) {
        if let Some(buffers) = self.buffers.as_mut() {
            let x = self.plot.column_x(column);
            self.rasterizer
                .paint(&mut buffers.offscreen, &self.plot, x, frame.bands());
        }
        self.history.save(slot, frame);
    }

    fn update_waterline(&mut self) {
        if !self.has_frame {
            return;
        }
        let Some((band, amplitude)) = self.frames.latest.peak() else {
            return;
        };
        let y = self.plot.band_y(band as f32, self.frames.latest.len());
        let alpha = self.rasterizer.palette().tone().apply(amplitude);
        self.cursor
            .waterline
            .update(y, alpha, self.config.waterline_smoothing);
    }

    fn compose(&mut self, duration: f64) -> bool {
        let Some(Buffers { offscreen, visible }) = self.buffers.as_mut() else {
            return false;
        };
        let overlay = Overlay {
            plot: &self.plot,
            nyquist_hz: self.sample_rate_hz as f32 / 2.0,
            duration_secs: (duration > 0.0).then_some(duration),
            time_tick_secs: self.config.time_tick_secs,
            waterline: &self.cursor.waterline,
        };
        self.compositor.compose(visible, offscreen, &overlay)
    }

    /// (Re)create both buffers at the current surface size
    fn allocate(&mut self) {
        let (width, height) = self.surface.physical();
        self.plot = PlotRect::from_surface(width, height, &self.config.plot_margins);
        self.cursor.previous_column = None;

        self.buffers = match (Pixmap::new(width, height), Pixmap::new(width, height)) {
            (Some(offscreen), Some(visible)) => Some(Buffers { offscreen, visible }),
            _ => {
                log::warn!("Could not allocate {}x{} ribbon buffers", width, height);
                None
            }
        };
    }

    /// Repaint the offscreen buffer from history at the current plot width.
    /// Columns without history are left transparent. Returns columns painted.
    pub fn rebuild_from_history(&mut self) -> usize {
        let Some(buffers) = self.buffers.as_mut() else {
            return 0;
        };
        buffers.offscreen.fill(Color::TRANSPARENT);

        let mut painted = 0;
        for (column, bands) in self.history.replay(self.plot.width as usize) {
            let x = self.plot.column_x(column);
            if self
                .rasterizer
                .paint(&mut buffers.offscreen, &self.plot, x, bands)
            {
                painted += 1;
            }
        }
        painted
    }
}

impl fmt::Debug for Ribbon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ribbon")
            .field("state", &self.state)
            .field("surface", &self.surface)
            .field("plot", &self.plot)
            .field("cursor", &self.cursor)
            .field("history_slots", &self.history.present_count())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::PlotMargins;
    use crate::error::RibbonError;
    use crate::frame::encode_frame;
    use std::sync::{Arc, Mutex};

    const BANDS: usize = 16;

    /// Records capture calls; optionally fails all of them
    #[derive(Clone, Default)]
    pub(crate) struct RecordingChannel {
        pub calls: Arc<Mutex<Vec<&'static str>>>,
        pub fail: bool,
    }

    impl RecordingChannel {
        pub fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AnalysisChannel for RecordingChannel {
        fn enable_capture(&mut self) -> Result<()> {
            self.calls.lock().unwrap().push("enable");
            if self.fail {
                return Err(RibbonError::Capture("engine offline".into()));
            }
            Ok(())
        }

        fn disable_capture(&mut self) -> Result<()> {
            self.calls.lock().unwrap().push("disable");
            if self.fail {
                return Err(RibbonError::Capture("engine offline".into()));
            }
            Ok(())
        }
    }

    /// Playback whose snapshot the test sets directly
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedPlayback {
        pub snapshot: Arc<Mutex<PlaybackSnapshot>>,
    }

    impl ScriptedPlayback {
        pub fn set(&self, position: f64, duration: f64) {
            let mut snapshot = self.snapshot.lock().unwrap();
            snapshot.position = TimeValue::Seconds(position);
            snapshot.duration = TimeValue::Seconds(duration);
        }

        pub fn set_raw(&self, position: TimeValue, duration: TimeValue) {
            let mut snapshot = self.snapshot.lock().unwrap();
            snapshot.position = position;
            snapshot.duration = duration;
        }

        pub fn set_track(&self, title: &str) {
            let track = TrackIdentity::new(title, "artist", "album");
            self.snapshot.lock().unwrap().track = Some(track);
        }
    }

    impl PlaybackSource for ScriptedPlayback {
        fn snapshot(&self) -> PlaybackSnapshot {
            self.snapshot.lock().unwrap().clone()
        }
    }

    pub(crate) fn test_config() -> RibbonConfig {
        RibbonConfig {
            band_count: BANDS,
            plot_margins: PlotMargins {
                left: 0.0,
                right: 0.0,
                top: 0.0,
                bottom: 0.0,
            },
            ..RibbonConfig::default()
        }
    }

    struct Harness {
        ribbon: Ribbon,
        channel: RecordingChannel,
        playback: ScriptedPlayback,
    }

    impl Harness {
        fn new(width: f32) -> Self {
            Self::with_channel(width, RecordingChannel::default())
        }

        fn with_channel(width: f32, channel: RecordingChannel) -> Self {
            let playback = ScriptedPlayback::default();
            let ribbon = Ribbon::new(
                test_config(),
                SurfaceSize::new(width, 64.0, 1.0),
                Box::new(channel.clone()),
                Box::new(playback.clone()),
            );
            Self {
                ribbon,
                channel,
                playback,
            }
        }

        fn push(&self, level: f32) {
            assert!(self.ribbon.inbox().ingest(&encode_frame(&[level; BANDS])));
        }

        /// Tick at `position` of a `duration` track with a fresh frame
        fn frame_at(&mut self, position: f64, duration: f64) -> TickOutcome {
            self.playback.set(position, duration);
            self.push(0.9);
            self.ribbon.tick()
        }

        fn column_alpha(&self, x: u32) -> u8 {
            let offscreen = self.ribbon.offscreen().unwrap();
            offscreen.pixel(x, 32).unwrap().alpha()
        }
    }

    #[test]
    fn test_enable_allocates_and_starts_capture() {
        let mut h = Harness::new(800.0);
        assert_eq!(h.ribbon.state(), LifecycleState::Uninitialized);
        assert!(h.ribbon.visible().is_none());

        h.ribbon.enable();
        assert!(h.ribbon.is_active());
        assert_eq!(h.ribbon.plot().width, 800);
        assert_eq!(h.ribbon.visible().unwrap().width(), 800);
        assert_eq!(h.channel.calls(), vec!["enable"]);

        h.ribbon.enable();
        assert_eq!(h.channel.calls(), vec!["enable"]);
    }

    #[test]
    fn test_capture_failure_is_not_fatal() {
        let channel = RecordingChannel {
            fail: true,
            ..RecordingChannel::default()
        };
        let mut h = Harness::with_channel(800.0, channel);
        h.ribbon.enable();
        assert!(h.ribbon.is_active());

        let outcome = h.frame_at(60.0, 200.0);
        assert!(outcome.composed);
        assert_eq!(outcome.columns_painted, 1);

        h.ribbon.disable();
        assert_eq!(h.ribbon.state(), LifecycleState::Suspended);
    }

    #[test]
    fn test_tick_without_frame_paints_nothing() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        h.playback.set(10.0, 200.0);

        let outcome = h.ribbon.tick();
        assert!(outcome.composed);
        assert_eq!(outcome.columns_painted, 0);
        assert!(h.ribbon.history().is_empty());
        assert_eq!(h.ribbon.cursor().waterline().y(), None);
    }

    #[test]
    fn test_frame_paints_progress_column_and_slot() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();

        let outcome = h.frame_at(60.0, 200.0);
        assert_eq!(outcome.columns_painted, 1);
        assert_eq!(h.ribbon.cursor().previous_column(), Some(240));
        assert!(h.ribbon.history().is_present(1228));
        assert_eq!(h.ribbon.history().present_count(), 1);
        assert!(h.column_alpha(240) > 0);
        assert_eq!(h.column_alpha(241), 0);
        assert!(h.ribbon.cursor().waterline().y().is_some());
    }

    #[test]
    fn test_untagged_millisecond_times() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        h.playback
            .set_raw(TimeValue::Untagged(60_000.0), TimeValue::Untagged(200_000.0));
        h.push(0.9);
        h.ribbon.tick();
        assert_eq!(h.ribbon.cursor().previous_column(), Some(240));
    }

    #[test]
    fn test_gap_between_ticks_is_backfilled() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        h.frame_at(59.5, 200.0);
        assert_eq!(h.ribbon.cursor().previous_column(), Some(238));

        let outcome = h.frame_at(61.0, 200.0);
        assert_eq!(outcome.columns_painted, 6);
        assert_eq!(h.ribbon.cursor().previous_column(), Some(244));
        for x in 238..=244 {
            assert!(h.column_alpha(x) > 0, "column {x} not painted");
        }
        assert_eq!(h.column_alpha(245), 0);
        assert_eq!(h.ribbon.history().present_count(), 7);
    }

    #[test]
    fn test_malformed_frame_does_not_paint() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        h.playback.set(60.0, 200.0);
        assert!(!h.ribbon.inbox().ingest(&encode_frame(&[0.5; BANDS - 1])));

        let outcome = h.ribbon.tick();
        assert_eq!(outcome.columns_painted, 0);
        assert!(h.ribbon.history().is_empty());
        assert_eq!(h.column_alpha(240), 0);
    }

    #[test]
    fn test_backward_seek_clears_once() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        h.frame_at(99.5, 200.0);
        h.frame_at(100.0, 200.0);
        assert!(!h.ribbon.history().is_empty());

        h.playback.set(95.0, 200.0);
        let outcome = h.ribbon.tick();
        assert_eq!(outcome.reset, Some(ResetReason::Seek));
        assert_eq!(h.ribbon.history().generation(), 1);
        assert!(h.ribbon.history().is_empty());
        assert_eq!(h.ribbon.cursor().previous_column(), None);
        assert_eq!(h.column_alpha(400), 0);
        assert!(h.ribbon.is_active());

        h.playback.set(95.1, 200.0);
        assert_eq!(h.ribbon.tick().reset, None);
        assert_eq!(h.ribbon.history().generation(), 1);

        // first frame after the seek is painted alone
        let outcome = h.frame_at(95.2, 200.0);
        assert_eq!(outcome.columns_painted, 1);
        assert_eq!(h.ribbon.stats().resets, 1);
    }

    #[test]
    fn test_forward_seek_threshold() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        h.frame_at(100.0, 200.0);
        assert_eq!(h.frame_at(105.0, 200.0).reset, None);
        assert_eq!(h.frame_at(115.5, 200.0).reset, Some(ResetReason::Seek));
    }

    #[test]
    fn test_seek_without_frame_clears_waterline() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        h.frame_at(99.5, 200.0);
        h.frame_at(100.0, 200.0);
        assert!(h.ribbon.cursor().waterline().y().is_some());

        h.playback.set(95.0, 200.0);
        let outcome = h.ribbon.tick();
        assert_eq!(outcome.reset, Some(ResetReason::Seek));
        assert_eq!(h.ribbon.cursor().waterline().y(), None);

        h.playback.set(95.1, 200.0);
        h.ribbon.tick();
        assert_eq!(h.ribbon.cursor().waterline().y(), None);

        h.frame_at(95.2, 200.0);
        assert!(h.ribbon.cursor().waterline().y().is_some());
    }

    #[test]
    fn test_track_change_clears_history() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        h.playback.set_track("one");
        assert_eq!(h.frame_at(10.0, 200.0).reset, None);

        h.playback.set_track("two");
        h.playback.set(0.0, 180.0);
        let outcome = h.ribbon.tick();
        assert_eq!(outcome.reset, Some(ResetReason::TrackChange));
        assert_eq!(h.ribbon.history().generation(), 1);
        assert_eq!(h.ribbon.stats().resets, 1);
    }

    #[test]
    fn test_unknown_duration_uses_fallback_counter() {
        let mut h = Harness::new(4.0);
        h.ribbon.enable();

        for expected in [1, 2, 3, 3, 3, 3] {
            h.frame_at(5.0, 0.0);
            assert_eq!(h.ribbon.cursor().fallback().value(), expected);
        }
        for x in 0..4 {
            assert!(h.column_alpha(x) > 0);
        }

        // ticks without a frame don't advance it
        h.ribbon.tick();
        assert_eq!(h.ribbon.cursor().fallback().value(), 3);
    }

    #[test]
    fn test_duration_becoming_known_does_not_backfill() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        for _ in 0..10 {
            h.frame_at(99.0, 0.0);
        }
        assert_eq!(h.ribbon.history().present_count(), 10);

        let outcome = h.frame_at(100.0, 200.0);
        assert_eq!(outcome.reset, None);
        assert_eq!(outcome.columns_painted, 1);
        assert_eq!(h.ribbon.cursor().previous_column(), Some(400));
        assert_eq!(h.ribbon.history().present_count(), 11);
        assert_eq!(h.column_alpha(399), 0);
        assert!(h.column_alpha(400) > 0);

        // progress columns gap from each other again
        assert_eq!(h.frame_at(100.5, 200.0).columns_painted, 2);
    }

    #[test]
    fn test_resize_rebuilds_at_same_progress() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        h.frame_at(60.0, 200.0);
        assert!(h.column_alpha(240) > 0);

        h.ribbon.resize(SurfaceSize::new(1217.0, 64.0, 1.0));
        assert_eq!(h.ribbon.plot().width, 1217);
        assert_eq!(h.ribbon.history().generation(), 0);
        assert_eq!(h.ribbon.cursor().previous_column(), None);

        let column = timeline::column_for_progress(0.3, 1217) as u32;
        assert!(h.column_alpha(column) > 0);
        assert_eq!(h.column_alpha(column + 2), 0);

        h.ribbon.resize(SurfaceSize::new(800.0, 64.0, 1.0));
        assert!(h.column_alpha(240) > 0);
    }

    #[test]
    fn test_resize_before_enable_only_records_size() {
        let mut h = Harness::new(800.0);
        h.ribbon.resize(SurfaceSize::new(300.0, 50.0, 2.0));
        assert!(h.ribbon.visible().is_none());

        h.ribbon.enable();
        assert_eq!(h.ribbon.visible().unwrap().width(), 600);
        assert_eq!(h.ribbon.visible().unwrap().height(), 100);
    }

    #[test]
    fn test_suspend_keeps_history_and_skips_ticks() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        h.frame_at(60.0, 200.0);

        h.ribbon.disable();
        assert_eq!(h.ribbon.state(), LifecycleState::Suspended);
        assert_eq!(h.channel.calls(), vec!["enable", "disable"]);

        let outcome = h.frame_at(61.0, 200.0);
        assert!(!outcome.composed);
        assert_eq!(h.ribbon.history().present_count(), 1);

        h.ribbon.enable();
        assert!(h.ribbon.is_active());
        assert_eq!(h.ribbon.cursor().previous_column(), None);
        assert_eq!(h.channel.calls(), vec!["enable", "disable", "enable"]);

        // resuming paints only the current column
        let outcome = h.frame_at(65.0, 200.0);
        assert_eq!(outcome.columns_painted, 1);
    }

    #[test]
    fn test_resume_after_long_pause_is_not_a_seek() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        h.frame_at(60.0, 200.0);
        h.frame_at(60.5, 200.0);
        h.frame_at(61.0, 200.0);
        let saved = h.ribbon.history().present_count();

        h.ribbon.disable();
        h.ribbon.enable();
        let outcome = h.frame_at(75.0, 200.0);
        assert_eq!(outcome.reset, None);
        assert_eq!(outcome.columns_painted, 1);
        assert_eq!(h.ribbon.history().generation(), 0);
        assert_eq!(h.ribbon.history().present_count(), saved + 1);

        // seeks are detected again once ticking resumes
        assert_eq!(h.frame_at(70.0, 200.0).reset, Some(ResetReason::Seek));
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        h.frame_at(60.0, 200.0);

        h.ribbon.teardown();
        h.ribbon.teardown();
        assert_eq!(h.ribbon.state(), LifecycleState::TornDown);
        assert_eq!(h.channel.calls(), vec!["enable", "disable"]);
        assert!(h.ribbon.visible().is_none());

        h.ribbon.enable();
        h.ribbon.resize(SurfaceSize::new(100.0, 100.0, 1.0));
        assert_eq!(h.ribbon.tick(), TickOutcome::default());
        assert_eq!(h.ribbon.state(), LifecycleState::TornDown);
    }

    #[test]
    fn test_set_sample_rate_keeps_history() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        h.frame_at(60.0, 200.0);

        h.ribbon.set_sample_rate(8_000);
        h.ribbon.set_sample_rate(0);
        assert_eq!(h.ribbon.sample_rate(), 8_000);
        assert_eq!(h.ribbon.history().present_count(), 1);
    }

    #[test]
    fn test_visible_differs_from_offscreen_only_by_overlay() {
        let mut h = Harness::new(800.0);
        h.ribbon.enable();
        h.frame_at(60.0, 200.0);

        let offscreen = h.ribbon.offscreen().unwrap();
        let visible = h.ribbon.visible().unwrap();
        assert_eq!(offscreen.pixel(240, 50), visible.pixel(240, 50));
    }
}
