//! Live, time-indexed spectrogram ribbon
//!
//! Spectral band vectors from an external analysis engine are painted as
//! one-pixel columns at the horizontal position of the current playback time.
//! Painted columns are also kept in a progress-indexed history so the ribbon
//! can be rebuilt at any size.

pub mod compositor;
pub mod config;
pub mod error;
pub mod frame;
pub mod gap;
pub mod glyphs;
pub mod history;
pub mod palette;
pub mod raster;
pub mod ribbon;
pub mod session;
pub mod timeline;

pub use config::{RibbonConfig, config_path};
pub use error::{Result, RibbonError};
pub use frame::{FrameInbox, SPECTRAL_CHANNEL, SpectralFrame, decode_frame, encode_frame};
pub use raster::SurfaceSize;
pub use ribbon::{
    AnalysisChannel, LifecycleState, PlaybackSnapshot, PlaybackSource, Ribbon, TickOutcome,
    TrackIdentity,
};
pub use session::{AnalysisEvent, FrameSink, RibbonSession};
pub use timeline::TimeValue;
