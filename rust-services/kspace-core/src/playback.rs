//! Playback sequencer: advances the time index on a fixed cadence.
//!
//! Ticks are delivered as [`ViewEvent::PlaybackTick`] into the session's
//! event queue. At most one tick is outstanding at a time; a tick that fires
//! while the previous one is still being handled is dropped, so a slow
//! recompute never builds a backlog.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};
use tracing::{debug, trace};

use crate::session::ViewEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

/// Next time index while playing: wraps around at `nt`.
pub fn advance(time_index: usize, nt: usize) -> usize {
    if nt == 0 {
        0
    } else {
        (time_index + 1) % nt
    }
}

struct Ticker {
    /// Dropping this disconnects the ticker thread's stop channel.
    _stop: Sender<()>,
    pending: Arc<AtomicBool>,
}

pub struct PlaybackSequencer {
    state: PlaybackState,
    interval: Duration,
    generation: u64,
    sink: Option<Sender<ViewEvent>>,
    ticker: Option<Ticker>,
}

impl PlaybackSequencer {
    pub fn new(interval: Duration) -> Self {
        Self {
            state: PlaybackState::Stopped,
            interval,
            generation: 0,
            sink: None,
            ticker: None,
        }
    }

    /// Route timer ticks into `sink`. Without a sink the sequencer only
    /// tracks state and ticks must be injected by the caller.
    pub fn attach(&mut self, sink: Sender<ViewEvent>) {
        self.sink = Some(sink);
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Identifies the current play run; ticks from earlier runs are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stopped -> Playing. No-op while already playing.
    pub fn start(&mut self) {
        if self.is_playing() {
            return;
        }
        self.generation += 1;
        self.state = PlaybackState::Playing;
        if let Some(sink) = &self.sink {
            self.ticker = Some(spawn_ticker(self.interval, self.generation, sink.clone()));
        }
        debug!(generation = self.generation, "playback started");
    }

    /// Playing -> Stopped. Does not wait for the ticker thread; any tick
    /// already queued is ignored through the generation bump.
    pub fn stop(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.state = PlaybackState::Stopped;
        self.ticker = None;
        self.generation += 1;
        debug!("playback stopped");
    }

    /// Whether a tick from `generation` should be applied.
    pub fn accepts(&self, generation: u64) -> bool {
        self.is_playing() && generation == self.generation
    }

    /// Mark the outstanding tick as handled so the next one may be sent.
    pub fn tick_done(&self) {
        if let Some(ticker) = &self.ticker {
            ticker.pending.store(false, Ordering::Release);
        }
    }
}

fn spawn_ticker(interval: Duration, generation: u64, sink: Sender<ViewEvent>) -> Ticker {
    let (stop_tx, stop_rx) = bounded::<()>(0);
    let pending = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&pending);

    thread::spawn(move || {
        let timer = tick(interval);
        loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(timer) -> _ => {
                    if flag.swap(true, Ordering::AcqRel) {
                        trace!(generation, "previous tick still pending, skipping");
                        continue;
                    }
                    if sink.send(ViewEvent::PlaybackTick { generation }).is_err() {
                        break;
                    }
                }
            }
        }
        trace!(generation, "ticker exited");
    });

    Ticker {
        _stop: stop_tx,
        pending,
    }
}
