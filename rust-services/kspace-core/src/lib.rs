//! Reconstruction-and-layout core for a dynamic multi-coil k-space viewer.
//!
//! Data flows from a [`KSpaceVolume`] through [`recon`] (direct inverse
//! transform and coil combination), [`normalize`] (8-bit display mapping) and,
//! for the coil mosaic, [`layout`] + [`mosaic`]. [`session::SessionState`]
//! owns the selector and open views and turns [`session::ViewEvent`]s into
//! rendered frames; [`event_loop::EventLoop`] feeds it from a queue.

pub mod config;
pub mod error;
pub mod event_loop;
pub mod fft;
pub mod layout;
pub mod loader;
pub mod mosaic;
pub mod normalize;
pub mod playback;
pub mod recon;
pub mod session;
pub mod synthetic;
pub mod view;
pub mod volume;

pub use config::ViewerConfig;
pub use error::{Result, ViewerError};
pub use layout::{solve_layout, LayoutParams, MosaicLayout};
pub use normalize::{normalize, NormalizationPolicy, RenderableImage};
pub use recon::{reconstruct, CoilSelection, Reconstruction};
pub use session::{Frame, SessionState, ViewEvent};
pub use view::{Domain, View, ViewId, ViewSelector, Viewport};
pub use volume::{KSpaceVolume, VolumeShape};
