//! Render loop
//!
//! Runs a [`Ribbon`] on a fixed tokio interval and hands each composed frame
//! to a [`FrameSink`]. Analysis events can be fed through an mpsc receiver;
//! they only touch the frame inbox, never the drawing state. Late ticks are
//! skipped rather than bunched up, so frames are dropped instead of queued.

use crate::frame::{FrameInbox, IngestStats};
use crate::raster::SurfaceSize;
use crate::ribbon::{LifecycleState, Ribbon, RibbonStats};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tiny_skia::Pixmap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Where composed frames go (a window, an encoder, a test probe)
pub trait FrameSink: Send + 'static {
    fn present(&mut self, frame: &Pixmap);
}

/// A named event from the analysis engine
#[derive(Debug, Clone)]
pub struct AnalysisEvent {
    pub channel: String,
    pub payload: Vec<u8>,
}

impl AnalysisEvent {
    pub fn new(channel: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }
}

type SharedSink = Arc<Mutex<Box<dyn FrameSink>>>;

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct RenderTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RenderTask {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

pub struct RibbonSession {
    ribbon: Arc<Mutex<Ribbon>>,
    inbox: FrameInbox,
    sink: SharedSink,
    frame_interval: Duration,
    shutdown: CancellationToken,
    render: Option<RenderTask>,
    listeners: Vec<JoinHandle<()>>,
}

impl RibbonSession {
    pub fn new(ribbon: Ribbon, sink: impl FrameSink) -> Self {
        let inbox = ribbon.inbox().clone();
        let frame_interval = ribbon.config().frame_interval();
        Self {
            ribbon: Arc::new(Mutex::new(ribbon)),
            inbox,
            sink: Arc::new(Mutex::new(Box::new(sink))),
            frame_interval,
            shutdown: CancellationToken::new(),
            render: None,
            listeners: Vec::new(),
        }
    }

    /// Enable the ribbon and start ticking. Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        let active = {
            let mut ribbon = lock(&self.ribbon);
            ribbon.enable();
            ribbon.is_active()
        };
        if active && self.render.is_none() {
            self.spawn_render();
        }
    }

    /// Stop ticking and release capture; history is kept
    pub fn suspend(&mut self) {
        if let Some(task) = self.render.take() {
            task.stop();
        }
        lock(&self.ribbon).disable();
    }

    pub fn resume(&mut self) {
        self.start();
    }

    /// Stop every task and tear the ribbon down. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.render.take() {
            task.stop();
        }
        for listener in self.listeners.drain(..) {
            listener.abort();
        }
        lock(&self.ribbon).teardown();
    }

    /// Route events from `events` into the frame inbox until the sender
    /// closes or the session is torn down
    pub fn listen(&mut self, mut events: mpsc::Receiver<AnalysisEvent>) {
        let inbox = self.inbox.clone();
        let cancel = self.shutdown.child_token();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => {
                            inbox.on_event(&event.channel, &event.payload);
                        }
                        None => {
                            log::debug!("Analysis event stream closed");
                            break;
                        }
                    },
                }
            }
        });
        self.listeners.push(handle);
    }

    pub fn resize(&self, surface: SurfaceSize) {
        lock(&self.ribbon).resize(surface);
    }

    pub fn set_sample_rate(&self, hz: u32) {
        lock(&self.ribbon).set_sample_rate(hz);
    }

    /// Handle for pushing analysis frames directly
    pub fn inbox(&self) -> FrameInbox {
        self.inbox.clone()
    }

    pub fn state(&self) -> LifecycleState {
        lock(&self.ribbon).state()
    }

    pub fn stats(&self) -> RibbonStats {
        lock(&self.ribbon).stats()
    }

    pub fn ingest_stats(&self) -> IngestStats {
        self.inbox.stats()
    }

    /// Copy of the last composed frame
    pub fn snapshot(&self) -> Option<Pixmap> {
        lock(&self.ribbon).visible().cloned()
    }

    /// Run `f` against the ribbon under its lock
    pub fn with_ribbon<R>(&self, f: impl FnOnce(&Ribbon) -> R) -> R {
        f(&*lock(&self.ribbon))
    }

    fn spawn_render(&mut self) {
        let cancel = self.shutdown.child_token();
        let ribbon = self.ribbon.clone();
        let sink = self.sink.clone();
        let interval = self.frame_interval;

        let handle = tokio::spawn(render_loop(ribbon, sink, interval, cancel.clone()));
        self.render = Some(RenderTask { cancel, handle });
        log::debug!("Render loop started ({:?} interval)", interval);
    }
}

impl Drop for RibbonSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn render_loop(
    ribbon: Arc<Mutex<Ribbon>>,
    sink: SharedSink,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !render_tick(&ribbon, &sink) {
                    break;
                }
            }
        }
    }
    log::debug!("Render loop stopped");
}

/// One tick plus presentation. Returns false once the ribbon stops being active.
fn render_tick(ribbon: &Mutex<Ribbon>, sink: &Mutex<Box<dyn FrameSink>>) -> bool {
    let mut ribbon = lock(ribbon);
    let outcome = ribbon.tick();
    if !ribbon.is_active() {
        return false;
    }
    if outcome.composed {
        if let Some(frame) = ribbon.visible() {
            lock(sink).present(frame);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{SPECTRAL_CHANNEL, encode_frame};
    use crate::ribbon::tests::{RecordingChannel, ScriptedPlayback, test_config};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct CountingSink {
        frames: Arc<AtomicUsize>,
    }

    impl FrameSink for CountingSink {
        fn present(&mut self, _frame: &Pixmap) {
            self.frames.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        session: RibbonSession,
        channel: RecordingChannel,
        frames: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let mut config = test_config();
        config.frame_interval_ms = 2;
        let channel = RecordingChannel::default();
        let playback = ScriptedPlayback::default();
        playback.set(60.0, 200.0);

        let ribbon = Ribbon::new(
            config,
            SurfaceSize::new(200.0, 40.0, 1.0),
            Box::new(channel.clone()),
            Box::new(playback),
        );
        let sink = CountingSink::default();
        let frames = sink.frames.clone();
        Fixture {
            session: RibbonSession::new(ribbon, sink),
            channel,
            frames,
        }
    }

    async fn settle() {
        time::sleep(Duration::from_millis(40)).await;
    }

    #[tokio::test]
    async fn test_session_presents_frames() {
        let mut f = fixture();
        f.session.start();
        assert_eq!(f.session.state(), LifecycleState::Active);

        f.session.inbox().ingest_bands(&[0.8; 16]);
        settle().await;

        assert!(f.frames.load(Ordering::SeqCst) > 0);
        assert!(f.session.stats().ticks > 0);
        assert_eq!(f.session.with_ribbon(|r| r.history().present_count()), 1);
        assert!(f.session.snapshot().is_some());
    }

    #[tokio::test]
    async fn test_zero_frame_interval_keeps_rendering() {
        let mut config = test_config();
        config.frame_interval_ms = 0;
        let playback = ScriptedPlayback::default();
        playback.set(60.0, 200.0);
        let ribbon = Ribbon::new(
            config,
            SurfaceSize::new(200.0, 40.0, 1.0),
            Box::new(RecordingChannel::default()),
            Box::new(playback),
        );
        let sink = CountingSink::default();
        let frames = sink.frames.clone();
        let mut session = RibbonSession::new(ribbon, sink);

        session.start();
        settle().await;

        assert_eq!(session.state(), LifecycleState::Active);
        assert!(frames.load(Ordering::SeqCst) > 0);
        let presented = frames.load(Ordering::SeqCst);
        settle().await;
        assert!(frames.load(Ordering::SeqCst) > presented);
    }

    #[tokio::test]
    async fn test_listener_routes_spectral_events() {
        let mut f = fixture();
        let (tx, rx) = mpsc::channel(8);
        f.session.listen(rx);
        f.session.start();

        tx.send(AnalysisEvent::new("viz:energy", encode_frame(&[0.5; 16])))
            .await
            .unwrap();
        tx.send(AnalysisEvent::new(SPECTRAL_CHANNEL, encode_frame(&[0.5; 3])))
            .await
            .unwrap();
        tx.send(AnalysisEvent::new(SPECTRAL_CHANNEL, encode_frame(&[0.5; 16])))
            .await
            .unwrap();
        settle().await;

        let stats = f.session.ingest_stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(f.session.with_ribbon(|r| r.history().present_count()), 1);
    }

    #[tokio::test]
    async fn test_teardown_stops_render_loop() {
        let mut f = fixture();
        f.session.start();
        settle().await;

        f.session.teardown();
        let presented = f.frames.load(Ordering::SeqCst);
        settle().await;

        assert_eq!(f.frames.load(Ordering::SeqCst), presented);
        assert_eq!(f.session.state(), LifecycleState::TornDown);
        assert!(f.session.snapshot().is_none());

        f.session.teardown();
        assert_eq!(f.channel.calls(), vec!["enable", "disable"]);
    }

    #[tokio::test]
    async fn test_suspend_and_resume() {
        let mut f = fixture();
        f.session.start();
        settle().await;

        f.session.suspend();
        assert_eq!(f.session.state(), LifecycleState::Suspended);
        let presented = f.frames.load(Ordering::SeqCst);
        settle().await;
        assert_eq!(f.frames.load(Ordering::SeqCst), presented);

        f.session.resume();
        settle().await;
        assert!(f.frames.load(Ordering::SeqCst) > presented);
        assert_eq!(f.channel.calls(), vec!["enable", "disable", "enable"]);
    }

    #[tokio::test]
    async fn test_resize_through_session() {
        let mut f = fixture();
        f.session.start();
        f.session.resize(SurfaceSize::new(320.0, 48.0, 1.0));
        let snapshot = f.session.snapshot().unwrap();
        assert_eq!((snapshot.width(), snapshot.height()), (320, 48));
    }
}
