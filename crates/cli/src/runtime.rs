//! Host runtime for the grid controller.
//!
//! Executes controller effects: PATCHes go to a named writer thread over a
//! channel, completions come back on a second channel and are fed to the
//! controller on the caller's thread. The single autosave timer is a
//! `(token, deadline)` slot the event loop checks on every tick.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use leadgrid_client::ApiClient;
use leadgrid_engine::{AutosaveToken, CellKey, Effect, GridController, PatchRequest, RequestId};

/// Anything that can carry a PATCH to the server. The error string is what
/// the grid shows in the cell.
pub trait PatchTransport: Send + 'static {
    fn send_patch(&self, request: &PatchRequest) -> Result<(), String>;
}

impl PatchTransport for ApiClient {
    fn send_patch(&self, request: &PatchRequest) -> Result<(), String> {
        self.send(request).map_err(|e| e.to_string())
    }
}

struct Completion {
    id: RequestId,
    result: Result<(), String>,
}

pub struct Runtime {
    grid: GridController,
    requests: Sender<PatchRequest>,
    completions: Receiver<Completion>,
    timer: Option<(AutosaveToken, Instant)>,
    focus: Option<(CellKey, usize)>,
}

impl Runtime {
    /// Spawn the writer thread and wrap `grid`.
    pub fn start<T: PatchTransport>(grid: GridController, transport: T) -> Result<Self, String> {
        let (request_tx, request_rx) = mpsc::channel::<PatchRequest>();
        let (completion_tx, completion_rx) = mpsc::channel::<Completion>();

        thread::Builder::new()
            .name("leadgrid-writer".to_string())
            .spawn(move || writer_main(transport, request_rx, completion_tx))
            .map_err(|e| format!("failed to spawn writer thread: {}", e))?;

        Ok(Self {
            grid,
            requests: request_tx,
            completions: completion_rx,
            timer: None,
            focus: None,
        })
    }

    pub fn grid(&self) -> &GridController {
        &self.grid
    }

    /// Run one controller operation and execute the effects it produced.
    pub fn dispatch<R>(&mut self, op: impl FnOnce(&mut GridController) -> R) -> R {
        let result = op(&mut self.grid);
        self.execute();
        result
    }

    /// Caret placement requested by the last `start_edit`.
    pub fn take_focus(&mut self) -> Option<(CellKey, usize)> {
        self.focus.take()
    }

    pub fn timer_deadline(&self) -> Option<Instant> {
        self.timer.map(|(_, deadline)| deadline)
    }

    /// How long the event loop may block: until the timer is due, capped at
    /// `max`.
    pub fn poll_timeout(&self, now: Instant, max: Duration) -> Duration {
        match self.timer_deadline() {
            Some(deadline) => deadline.saturating_duration_since(now).min(max),
            None => max,
        }
    }

    /// Fire the timer if due and feed finished writes back. Returns true if
    /// anything reached the controller.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if let Some((token, deadline)) = self.timer {
            if now >= deadline {
                self.timer = None;
                self.dispatch(|g| g.autosave_fired(token));
                changed = true;
            }
        }
        while let Ok(Completion { id, result }) = self.completions.try_recv() {
            self.dispatch(move |g| g.write_resolved(id, result));
            changed = true;
        }
        changed
    }

    /// Block until no write is in flight. False if `timeout` elapsed first.
    pub fn wait_for_writes(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.grid.has_pending_writes() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.completions.recv_timeout(remaining) {
                Ok(Completion { id, result }) => {
                    self.dispatch(move |g| g.write_resolved(id, result));
                }
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("writer thread gone with writes in flight");
                    return false;
                }
            }
        }
        true
    }

    fn execute(&mut self) {
        loop {
            let effects = self.grid.take_effects();
            if effects.is_empty() {
                break;
            }
            for effect in effects {
                match effect {
                    Effect::ArmAutosave { token, delay } => {
                        self.timer = Some((token, Instant::now() + delay));
                    }
                    Effect::CancelAutosave { token } => {
                        if self.timer.map(|(t, _)| t) == Some(token) {
                            self.timer = None;
                        }
                    }
                    Effect::SendPatch(request) => {
                        if let Err(mpsc::SendError(request)) = self.requests.send(request) {
                            log::warn!("writer thread stopped; {} not sent", request.id);
                            self.grid
                                .write_resolved(request.id, Err("Writer stopped".to_string()));
                        }
                    }
                    Effect::FocusEditor { key, cursor } => self.focus = Some((key, cursor)),
                }
            }
        }
    }
}

fn writer_main<T: PatchTransport>(
    transport: T,
    requests: Receiver<PatchRequest>,
    completions: Sender<Completion>,
) {
    for request in requests {
        let result = transport.send_patch(&request);
        if let Err(ref e) = result {
            log::warn!("PATCH {} for {} failed: {}", request.id, request.key, e);
        }
        if completions
            .send(Completion {
                id: request.id,
                result,
            })
            .is_err()
        {
            break;
        }
    }
    log::debug!("writer thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use leadgrid_engine::{AutosaveConfig, Cell, CellValue, CommitOutcome, Field, GridData, Lead};

    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<PatchRequest>>>,
        fail_with: Option<String>,
    }

    impl PatchTransport for Recorder {
        fn send_patch(&self, request: &PatchRequest) -> Result<(), String> {
            self.sent.lock().unwrap().push(request.clone());
            match &self.fail_with {
                Some(msg) => Err(msg.clone()),
                None => Ok(()),
            }
        }
    }

    fn grid() -> GridController {
        GridController::new(
            GridData {
                fields: vec![Field::new("email", "Email", true)],
                leads: vec![Lead::new("7").with_cell("email", Cell::new(CellValue::Text("a@b.com".into())))],
            },
            AutosaveConfig::with_debounce(Duration::from_millis(50)),
        )
    }

    fn key() -> CellKey {
        CellKey::new("7", "email")
    }

    #[test]
    fn test_timer_fires_only_after_deadline() {
        let recorder = Recorder::default();
        let mut rt = Runtime::start(grid(), recorder.clone()).unwrap();
        rt.dispatch(|g| g.start_edit(key())).unwrap();
        assert_eq!(rt.take_focus(), Some((key(), 7)));
        rt.dispatch(|g| g.update_buffer("c@d.com"));

        let deadline = rt.timer_deadline().unwrap();
        let before = deadline - Duration::from_millis(10);
        rt.tick(before);
        assert!(!rt.grid().has_pending_writes());
        assert_eq!(rt.poll_timeout(before, Duration::from_secs(1)), Duration::from_millis(10));

        assert!(rt.tick(deadline));
        assert!(rt.timer_deadline().is_none());
        assert!(rt.wait_for_writes(Duration::from_secs(5)));
        assert_eq!(
            rt.grid().store().committed_value(&key()),
            CellValue::Text("c@d.com".into())
        );
        assert_eq!(recorder.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_cancel_clears_timer() {
        let mut rt = Runtime::start(grid(), Recorder::default()).unwrap();
        rt.dispatch(|g| g.start_edit(key())).unwrap();
        rt.dispatch(|g| g.update_buffer("c@d.com"));
        assert!(rt.timer_deadline().is_some());
        rt.dispatch(|g| g.cancel_edit());
        assert!(rt.timer_deadline().is_none());
        assert_eq!(
            rt.poll_timeout(Instant::now(), Duration::from_millis(100)),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_transport_error_lands_in_save_state() {
        let recorder = Recorder {
            fail_with: Some("API error 500: boom".into()),
            ..Recorder::default()
        };
        let mut rt = Runtime::start(grid(), recorder).unwrap();
        rt.dispatch(|g| g.start_edit(key())).unwrap();
        rt.dispatch(|g| g.update_buffer("c@d.com"));
        assert!(matches!(rt.dispatch(|g| g.confirm()), CommitOutcome::Sent(_)));
        assert!(rt.wait_for_writes(Duration::from_secs(5)));

        let state = rt.grid().save_state(&key());
        assert_eq!(state.error.as_deref(), Some("API error 500: boom"));
        assert_eq!(
            rt.grid().store().committed_value(&key()),
            CellValue::Text("a@b.com".into())
        );
    }

    #[test]
    fn test_wait_without_writes_returns_immediately() {
        let mut rt = Runtime::start(grid(), Recorder::default()).unwrap();
        assert!(rt.wait_for_writes(Duration::from_millis(1)));
    }
}
