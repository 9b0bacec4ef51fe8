//! Event queue driving a [`SessionState`].

use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{error, info};

use crate::error::ViewerError;
use crate::normalize::RenderableImage;
use crate::session::{SessionState, ViewEvent};
use crate::view::ViewId;

/// Presentation boundary: receives every rendered image.
pub trait FrameSink {
    fn present(&mut self, view: ViewId, image: &RenderableImage);

    /// Called when an event fails; the session stays usable afterwards.
    fn report_error(&mut self, _error: &ViewerError) {}
}

/// Consumes events one at a time, in arrival order, and forwards the
/// resulting images to the sink.
pub struct EventLoop<S: FrameSink> {
    session: SessionState,
    sender: Sender<ViewEvent>,
    receiver: Receiver<ViewEvent>,
    sink: S,
}

impl<S: FrameSink> EventLoop<S> {
    pub fn new(mut session: SessionState, sink: S) -> Self {
        let (sender, receiver) = unbounded();
        session.attach_ticks(sender.clone());
        Self {
            session,
            sender,
            receiver,
            sink,
        }
    }

    /// Handle for the control surface to post events.
    pub fn sender(&self) -> Sender<ViewEvent> {
        self.sender.clone()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Apply one event. Returns `false` once `Shutdown` has been handled.
    pub fn dispatch(&mut self, event: ViewEvent) -> bool {
        let shutdown = matches!(event, ViewEvent::Shutdown);
        match self.session.handle(event) {
            Ok(frame) => {
                for (id, image) in &frame.images {
                    self.sink.present(*id, image);
                }
            }
            Err(e) => {
                error!(error = %e, "event failed");
                self.sink.report_error(&e);
            }
        }
        !shutdown
    }

    /// Handle everything already queued without blocking.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.receiver.try_recv() {
            handled += 1;
            if !self.dispatch(event) {
                break;
            }
        }
        handled
    }

    /// Block on the queue until `Shutdown`.
    pub fn run(&mut self) {
        while let Ok(event) = self.receiver.recv() {
            if !self.dispatch(event) {
                break;
            }
        }
        info!("event loop stopped");
    }

    /// Handle events as they arrive for `duration`, then return. Returns
    /// `false` if `Shutdown` was seen.
    pub fn run_for(&mut self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(event) => {
                    if !self.dispatch(event) {
                        return false;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return true,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array5;
    use num_complex::Complex32;

    use crate::config::ViewerConfig;
    use crate::playback::PlaybackState;
    use crate::view::View;
    use crate::volume::KSpaceVolume;

    #[derive(Default)]
    struct Recorder {
        presented: Vec<ViewId>,
        errors: usize,
    }

    impl FrameSink for Recorder {
        fn present(&mut self, view: ViewId, _image: &RenderableImage) {
            self.presented.push(view);
        }

        fn report_error(&mut self, _error: &ViewerError) {
            self.errors += 1;
        }
    }

    fn loop_with_volume(nt: usize) -> EventLoop<Recorder> {
        let mut data = Array5::<Complex32>::zeros((nt, 1, 2, 4, 4));
        data[[0, 0, 0, 1, 1]] = Complex32::new(1.0, 0.0);
        let mut session = SessionState::new(ViewerConfig {
            playback_interval_ms: 5,
            ..ViewerConfig::default()
        });
        session
            .set_volume(KSpaceVolume::from_complex(data).unwrap())
            .unwrap();
        EventLoop::new(session, Recorder::default())
    }

    #[test]
    fn events_apply_in_order() {
        let mut ev = loop_with_volume(4);
        let tx = ev.sender();
        tx.send(ViewEvent::SetTimeIndex(3)).unwrap();
        tx.send(ViewEvent::SetTimeIndex(1)).unwrap();
        tx.send(ViewEvent::OpenView(View::SingleCoil(1))).unwrap();
        assert_eq!(ev.process_pending(), 3);
        assert_eq!(ev.session().selector().time_index, 1);
        assert_eq!(ev.sink().presented.len(), 3);
    }

    #[test]
    fn failures_are_reported_and_loop_continues() {
        let mut ev = loop_with_volume(2);
        let tx = ev.sender();
        tx.send(ViewEvent::OpenView(View::SingleCoil(9))).unwrap();
        tx.send(ViewEvent::Load("/nonexistent/volume.npz".into())).unwrap();
        tx.send(ViewEvent::SetTimeIndex(1)).unwrap();
        ev.process_pending();
        assert_eq!(ev.sink().errors, 2);
        assert_eq!(ev.session().selector().time_index, 1);
        assert!(ev.session().volume().is_some());
    }

    #[test]
    fn shutdown_stops_processing() {
        let mut ev = loop_with_volume(2);
        let tx = ev.sender();
        tx.send(ViewEvent::Shutdown).unwrap();
        tx.send(ViewEvent::SetTimeIndex(1)).unwrap();
        assert_eq!(ev.process_pending(), 1);
        assert_eq!(ev.session().selector().time_index, 0);
        tx.send(ViewEvent::Shutdown).unwrap();
        ev.run();
        assert_eq!(ev.session().selector().time_index, 1);
    }

    #[test]
    fn timed_playback_advances_and_stops() {
        let mut ev = loop_with_volume(3);
        ev.dispatch(ViewEvent::PlaybackStart);
        assert!(ev.run_for(Duration::from_millis(200)));
        assert!(!ev.sink().presented.is_empty());

        ev.dispatch(ViewEvent::PlaybackStop);
        let stopped_at = ev.session().selector().time_index;
        ev.run_for(Duration::from_millis(50));
        assert_eq!(ev.session().selector().time_index, stopped_at);
        assert_eq!(ev.session().playback_state(), PlaybackState::Stopped);
    }
}
