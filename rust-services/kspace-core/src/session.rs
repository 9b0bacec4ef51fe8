//! Single-owner session state and the view state machine.
//!
//! Every control-surface action arrives as a [`ViewEvent`]. Handling an event
//! applies it to the selector, then recomputes whatever views it affects and
//! returns the new images in a [`Frame`]. Events are applied strictly in
//! order; a failed recompute leaves the selector and volume as they were
//! after the event was applied.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use ndarray::Array2;
use num_complex::Complex32;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::layout::{LayoutCache, MosaicLayout};
use crate::loader::{NpzLoader, VolumeLoader};
use crate::mosaic::compose_mosaic;
use crate::normalize::{normalize_with, RenderableImage};
use crate::playback::{advance, PlaybackSequencer, PlaybackState};
use crate::recon::{coil_display, CoilSelection, Reconstruction, Reconstructor};
use crate::view::{View, ViewId, ViewRegistry, ViewSelector, Viewport};
use crate::volume::KSpaceVolume;

#[derive(Debug, Clone)]
pub enum ViewEvent {
    Load(PathBuf),
    SetTimeIndex(usize),
    SetSliceIndex(usize),
    ToggleDomain,
    ViewportResized { view: ViewId, width: u32, height: u32 },
    OpenView(View),
    CloseView(ViewId),
    PlaybackStart,
    PlaybackStop,
    PlaybackTick { generation: u64 },
    Shutdown,
}

/// Images produced while handling one event.
#[derive(Debug, Default)]
pub struct Frame {
    pub images: Vec<(ViewId, RenderableImage)>,
}

impl Frame {
    pub fn get(&self, view: ViewId) -> Option<&RenderableImage> {
        self.images.iter().find(|(id, _)| *id == view).map(|(_, img)| img)
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

struct Loaded {
    volume: Arc<KSpaceVolume>,
    reconstructor: Reconstructor,
}

pub struct SessionState {
    config: ViewerConfig,
    loader: Box<dyn VolumeLoader>,
    loaded: Option<Loaded>,
    selector: ViewSelector,
    views: ViewRegistry,
    composite_view: ViewId,
    layout_cache: LayoutCache,
    /// Normalized per-coil tiles from the last mosaic recompute, reused when
    /// only the mosaic viewport changes.
    coil_tiles: Vec<RenderableImage>,
    playback: PlaybackSequencer,
}

impl SessionState {
    pub fn new(config: ViewerConfig) -> Self {
        Self::with_loader(config, Box::new(NpzLoader))
    }

    pub fn with_loader(config: ViewerConfig, loader: Box<dyn VolumeLoader>) -> Self {
        let mut views = ViewRegistry::default();
        let composite_view = views.open(View::Composite, Viewport::default());
        let playback = PlaybackSequencer::new(config.playback_interval());
        Self {
            selector: ViewSelector {
                domain: config.initial_domain,
                ..ViewSelector::default()
            },
            config,
            loader,
            loaded: None,
            views,
            composite_view,
            layout_cache: LayoutCache::default(),
            coil_tiles: Vec::new(),
            playback,
        }
    }

    /// Deliver playback ticks to `sink` (normally the event loop's queue).
    pub fn attach_ticks(&mut self, sink: Sender<ViewEvent>) {
        self.playback.attach(sink);
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn selector(&self) -> ViewSelector {
        self.selector
    }

    pub fn volume(&self) -> Option<&Arc<KSpaceVolume>> {
        self.loaded.as_ref().map(|l| &l.volume)
    }

    pub fn views(&self) -> &ViewRegistry {
        &self.views
    }

    pub fn composite_view(&self) -> ViewId {
        self.composite_view
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn playback_generation(&self) -> u64 {
        self.playback.generation()
    }

    pub fn handle(&mut self, event: ViewEvent) -> Result<Frame> {
        match event {
            ViewEvent::Load(path) => self.load(&path),
            ViewEvent::SetTimeIndex(index) => self.set_time_index(index),
            ViewEvent::SetSliceIndex(index) => self.set_slice_index(index),
            ViewEvent::ToggleDomain => self.toggle_domain(),
            ViewEvent::ViewportResized { view, width, height } => {
                self.viewport_resized(view, Viewport { width, height })
            }
            ViewEvent::OpenView(view) => self.open_view(view, Viewport::default()).map(|(_, frame)| frame),
            ViewEvent::CloseView(id) => {
                self.views.close(id).ok_or(ViewerError::UnknownView(id))?;
                Ok(Frame::default())
            }
            ViewEvent::PlaybackStart => {
                self.playback.start();
                Ok(Frame::default())
            }
            ViewEvent::PlaybackStop | ViewEvent::Shutdown => {
                self.playback.stop();
                Ok(Frame::default())
            }
            ViewEvent::PlaybackTick { generation } => self.playback_tick(generation),
        }
    }

    /// Load through the session's loader. On failure the current volume and
    /// selector are untouched.
    pub fn load(&mut self, path: &Path) -> Result<Frame> {
        let volume = self.loader.load(path)?;
        self.set_volume(volume)
    }

    /// Replace the volume wholesale and reset the selector.
    pub fn set_volume(&mut self, volume: KSpaceVolume) -> Result<Frame> {
        let shape = volume.shape();
        self.playback.stop();
        self.loaded = Some(Loaded {
            reconstructor: Reconstructor::new(shape, self.config.parallel),
            volume: Arc::new(volume),
        });
        self.selector = ViewSelector {
            time_index: 0,
            slice_index: 0,
            domain: self.config.initial_domain,
        };
        self.layout_cache.invalidate();
        self.coil_tiles.clear();

        let closed = self
            .views
            .retain(|v| !matches!(v, View::SingleCoil(c) if *c >= shape.nc));
        if !closed.is_empty() {
            info!(closed = closed.len(), coils = shape.nc, "closed coil views past new coil count");
        }
        self.recompute(None)
    }

    pub fn set_time_index(&mut self, index: usize) -> Result<Frame> {
        let nt = self.loaded.as_ref().map_or(0, |l| l.volume.shape().nt);
        self.selector.time_index = clamp_index(index, nt);
        self.recompute(None)
    }

    pub fn set_slice_index(&mut self, index: usize) -> Result<Frame> {
        let nz = self.loaded.as_ref().map_or(0, |l| l.volume.shape().nz);
        self.selector.slice_index = clamp_index(index, nz);
        self.recompute(None)
    }

    pub fn toggle_domain(&mut self) -> Result<Frame> {
        self.selector.domain = self.selector.domain.toggled();
        self.layout_cache.invalidate();
        debug!(domain = ?self.selector.domain, "domain toggled");
        self.recompute(None)
    }

    /// Only a mosaic resize has an effect: its layout is solved again and
    /// the last tiles are recomposed. Other views rescale their existing
    /// bitmap on the presentation side.
    pub fn viewport_resized(&mut self, id: ViewId, viewport: Viewport) -> Result<Frame> {
        let entry = self.views.get_mut(id).ok_or(ViewerError::UnknownView(id))?;
        entry.viewport = viewport;
        if entry.view != View::Mosaic {
            return Ok(Frame::default());
        }

        self.layout_cache.invalidate();
        if self.coil_tiles.is_empty() {
            return self.recompute(Some(id));
        }
        let layout = self.mosaic_layout(viewport)?;
        let image = compose_mosaic(&layout, &self.coil_tiles, self.config.layout);
        Ok(self.store(vec![(id, image)]))
    }

    /// Open a view and render it. Only one mosaic is kept; opening it again
    /// moves the existing one to `viewport` and returns its id.
    pub fn open_view(&mut self, view: View, viewport: Viewport) -> Result<(ViewId, Frame)> {
        if let View::SingleCoil(coil) = view {
            if let Some(loaded) = &self.loaded {
                loaded.volume.check_coil(coil)?;
            }
        }
        let id = match view {
            View::Mosaic => match self.views.find(View::Mosaic) {
                Some(id) => {
                    if let Some(entry) = self.views.get_mut(id) {
                        if entry.viewport != viewport {
                            entry.viewport = viewport;
                            self.layout_cache.invalidate();
                        }
                    }
                    id
                }
                None => self.views.open(view, viewport),
            },
            _ => self.views.open(view, viewport),
        };
        let frame = self.recompute(Some(id))?;
        Ok((id, frame))
    }

    fn playback_tick(&mut self, generation: u64) -> Result<Frame> {
        if !self.playback.accepts(generation) {
            return Ok(Frame::default());
        }
        let nt = self.loaded.as_ref().map_or(0, |l| l.volume.shape().nt);
        self.selector.time_index = advance(self.selector.time_index, nt);
        let result = self.recompute(None);
        self.playback.tick_done();
        result
    }

    fn mosaic_layout(&mut self, viewport: Viewport) -> Result<MosaicLayout> {
        let loaded = self.loaded.as_ref().ok_or(ViewerError::NoVolume)?;
        let shape = loaded.volume.shape();
        let params = self.config.layout;
        match self.layout_cache.get_or_solve(
            shape.nc,
            viewport.width,
            viewport.height,
            shape.aspect_ratio(),
            params,
        ) {
            Ok(layout) => Ok(layout),
            Err(e) => {
                warn!(error = %e, "falling back to a single scrolling column");
                Ok(MosaicLayout::scroll_column(
                    shape.nc,
                    viewport.width,
                    shape.aspect_ratio(),
                    params,
                ))
            }
        }
    }

    /// Render every open view, or just `only`.
    fn recompute(&mut self, only: Option<ViewId>) -> Result<Frame> {
        let Some(loaded) = &self.loaded else {
            return Ok(Frame::default());
        };
        let volume = Arc::clone(&loaded.volume);
        let started = Instant::now();

        let targets: Vec<(ViewId, View, Viewport)> = self
            .views
            .iter()
            .filter(|(id, _)| only.map_or(true, |o| o == *id))
            .map(|(id, e)| (id, e.view, e.viewport))
            .collect();
        if targets.is_empty() {
            return Ok(Frame::default());
        }

        let mosaic_viewport = targets
            .iter()
            .find(|(_, v, _)| *v == View::Mosaic)
            .map(|(_, _, vp)| *vp);
        let layout = match mosaic_viewport {
            Some(vp) => Some(self.mosaic_layout(vp)?),
            None => None,
        };

        let Some(loaded) = &self.loaded else {
            return Ok(Frame::default());
        };
        let selector = self.selector;
        let policy = self.config.normalization;
        let params = self.config.layout;
        let parallel = self.config.parallel;

        let needs_all = targets
            .iter()
            .any(|(_, v, _)| matches!(v, View::Composite | View::Mosaic));
        let shared: Option<Reconstruction> = if needs_all {
            Some(loaded.reconstructor.reconstruct(&volume, &selector, CoilSelection::All)?)
        } else {
            None
        };

        let tiles: Vec<RenderableImage> = match (&shared, layout) {
            (Some(recon), Some(_)) => {
                let normalize_coil = |plane: &Array2<Complex32>| normalize_with(&coil_display(selector.domain, plane), policy);
                if parallel {
                    recon.per_coil.par_iter().map(normalize_coil).collect()
                } else {
                    recon.per_coil.iter().map(normalize_coil).collect()
                }
            }
            _ => Vec::new(),
        };

        let render = |&(id, view, _): &(ViewId, View, Viewport)| -> Result<(ViewId, RenderableImage)> {
            let image = match (view, &shared) {
                (View::Composite, Some(recon)) => normalize_with(&recon.composite, policy),
                (View::Mosaic, _) => {
                    let layout = layout.ok_or(ViewerError::NoVolume)?;
                    compose_mosaic(&layout, &tiles, params)
                }
                (View::SingleCoil(coil), Some(recon)) if coil < recon.per_coil.len() => {
                    normalize_with(&coil_display(selector.domain, &recon.per_coil[coil]), policy)
                }
                (View::Composite, None) | (View::SingleCoil(_), _) => {
                    let coils = match view {
                        View::SingleCoil(coil) => CoilSelection::Single(coil),
                        _ => CoilSelection::All,
                    };
                    let recon = loaded.reconstructor.reconstruct(&volume, &selector, coils)?;
                    normalize_with(&recon.composite, policy)
                }
            };
            Ok((id, image))
        };
        let images: Vec<(ViewId, RenderableImage)> = if parallel {
            targets.par_iter().map(render).collect::<Result<_>>()?
        } else {
            targets.iter().map(render).collect::<Result<_>>()?
        };

        if layout.is_some() {
            self.coil_tiles = tiles;
        }
        debug!(
            time = selector.time_index,
            slice = selector.slice_index,
            domain = ?selector.domain,
            views = images.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "recomputed views"
        );
        Ok(self.store(images))
    }

    fn store(&mut self, images: Vec<(ViewId, RenderableImage)>) -> Frame {
        for (id, image) in &images {
            if let Some(entry) = self.views.get_mut(*id) {
                entry.last_frame = Some(image.clone());
            }
        }
        Frame { images }
    }
}

fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}
