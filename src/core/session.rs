//! Session management
//!
//! A session is the running half of a pane: its pty, its child process and
//! the three threads that move bytes in and out of them.
//!
//! ```text
//! reader thread:  pty -> ScreenRenderer -> OutputGate
//! writer thread:  input channel -> pty
//! waiter thread:  child exit -> SessionEvent::Closed
//! ```
//!
//! Only the reader thread ever touches the renderer, so cursor state and
//! pending bytes need no locking.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

use super::pty::{PaneProcess, PtyParts};
use super::term::ScreenRenderer;
use crate::ui::OutputGate;

/// Unique identifier for a session (and its pane)
pub type SessionId = u64;

const READ_CHUNK: usize = 1024;

/// Session events delivered to the multiplexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The child exited or its pty reached end-of-stream
    Closed {
        id: SessionId,
        exit_code: Option<u32>,
    },
}

/// Pane lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Running,
    Closed,
}

/// Lifecycle shared between a session's threads
#[derive(Debug)]
pub struct Lifecycle(AtomicU8);

impl Lifecycle {
    const STARTING: u8 = 0;
    const RUNNING: u8 = 1;
    const CLOSED: u8 = 2;

    pub fn new() -> Self {
        Self(AtomicU8::new(Self::STARTING))
    }

    pub fn state(&self) -> SessionState {
        match self.0.load(Ordering::SeqCst) {
            Self::STARTING => SessionState::Starting,
            Self::RUNNING => SessionState::Running,
            _ => SessionState::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Starting -> Running. Returns false if the session already moved on.
    pub fn mark_running(&self) -> bool {
        self.0
            .compare_exchange(Self::STARTING, Self::RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Moves to Closed. Returns true only for the call that made the transition.
    pub fn close(&self) -> bool {
        self.0.swap(Self::CLOSED, Ordering::SeqCst) != Self::CLOSED
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// A shell session bound to one rectangle
pub struct Session {
    id: SessionId,
    lifecycle: Arc<Lifecycle>,
    input_tx: Sender<Vec<u8>>,
    input_rx: Option<Receiver<Vec<u8>>>,
}

impl Session {
    /// Create a session in the `Starting` state.
    ///
    /// Input sent before `start` is queued and delivered once the pty exists.
    pub fn new(id: SessionId) -> Self {
        let (input_tx, input_rx) = mpsc::channel();
        Self {
            id,
            lifecycle: Arc::new(Lifecycle::new()),
            input_tx,
            input_rx: Some(input_rx),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    /// Attach a spawned pty and start the session's threads.
    pub fn start(
        &mut self,
        parts: PtyParts,
        renderer: ScreenRenderer,
        output: OutputGate,
        events: Sender<SessionEvent>,
    ) -> std::io::Result<()> {
        let input_rx = self
            .input_rx
            .take()
            .ok_or_else(|| std::io::Error::new(ErrorKind::Other, "session already started"))?;
        if !self.lifecycle.mark_running() {
            return Err(std::io::Error::new(ErrorKind::Other, "session is not starting"));
        }
        info!("Session {} running in {:?}", self.id, renderer.rect());

        let PtyParts {
            reader,
            writer,
            process,
        } = parts;

        let id = self.id;
        spawn_named(format!("pane-{id}-reader"), {
            let lifecycle = self.lifecycle.clone();
            let events = events.clone();
            move || read_loop(id, reader, renderer, output, lifecycle, events)
        })?;
        spawn_named(format!("pane-{id}-writer"), {
            let lifecycle = self.lifecycle.clone();
            move || write_loop(id, writer, input_rx, lifecycle)
        })?;
        spawn_named(format!("pane-{id}-waiter"), {
            let lifecycle = self.lifecycle.clone();
            move || wait_loop(id, process, lifecycle, events)
        })?;

        Ok(())
    }

    /// Queue keystrokes for the child. Ignored once the session is closed.
    pub fn write(&self, data: &[u8]) {
        if self.lifecycle.is_closed() {
            return;
        }
        let _ = self.input_tx.send(data.to_vec());
    }

    #[cfg(test)]
    pub(crate) fn take_input(&mut self) -> Option<Receiver<Vec<u8>>> {
        self.input_rx.take()
    }
}

fn spawn_named<F>(name: String, f: F) -> std::io::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(name).spawn(f).map(|_| ())
}

fn read_loop(
    id: SessionId,
    mut reader: Box<dyn Read + Send>,
    mut renderer: ScreenRenderer,
    output: OutputGate,
    lifecycle: Arc<Lifecycle>,
    events: Sender<SessionEvent>,
) {
    let mut buffer = [0u8; READ_CHUNK];

    loop {
        if lifecycle.is_closed() {
            break;
        }

        match reader.read(&mut buffer) {
            Ok(0) => {
                debug!("Session {} pty reached end of stream", id);
                break;
            }
            Ok(n) => {
                let chunk = renderer.render(&buffer[..n]);
                if !chunk.is_empty() && !output.write(chunk) {
                    warn!("Session {} output gate closed", id);
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                // EIO once the child side is gone
                debug!("Session {} pty read ended: {}", id, e);
                break;
            }
        }
    }

    close(id, &lifecycle, &events, None);
}

fn write_loop(
    id: SessionId,
    mut writer: Box<dyn Write + Send>,
    input: Receiver<Vec<u8>>,
    lifecycle: Arc<Lifecycle>,
) {
    for data in input {
        if lifecycle.is_closed() {
            break;
        }
        if let Err(e) = writer.write_all(&data).and_then(|()| writer.flush()) {
            warn!("Session {} failed to write to pty: {}", id, e);
            break;
        }
    }
    debug!("Session {} writer finished", id);
}

fn wait_loop(
    id: SessionId,
    mut process: Box<dyn PaneProcess>,
    lifecycle: Arc<Lifecycle>,
    events: Sender<SessionEvent>,
) {
    let exit_code = match process.wait() {
        Ok(code) => Some(code),
        Err(e) => {
            warn!("Session {} wait failed: {}", id, e);
            None
        }
    };
    close(id, &lifecycle, &events, exit_code);
}

/// Report the Closed transition exactly once per session.
fn close(
    id: SessionId,
    lifecycle: &Lifecycle,
    events: &Sender<SessionEvent>,
    exit_code: Option<u32>,
) {
    if lifecycle.close() {
        info!("Session {} closed (exit code {:?})", id, exit_code);
        let _ = events.send(SessionEvent::Closed { id, exit_code });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::Rect;
    use crate::ui::output::tests::SharedBuf;
    use std::io::{self, Cursor};
    use std::time::Duration;

    struct ExitNow(u32);

    impl PaneProcess for ExitNow {
        fn wait(&mut self) -> io::Result<u32> {
            Ok(self.0)
        }
    }

    /// Exits when the paired sender is dropped or signalled
    struct ExitOnSignal(Receiver<u32>);

    impl PaneProcess for ExitOnSignal {
        fn wait(&mut self) -> io::Result<u32> {
            Ok(self.0.recv().unwrap_or(0))
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !cond() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Blocks like a pty until data arrives or the sender goes away
    struct ChannelReader(Receiver<Vec<u8>>);

    impl Read for ChannelReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv() {
                Ok(data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                Err(_) => Ok(0),
            }
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), SessionState::Starting);
        assert!(lifecycle.mark_running());
        assert!(!lifecycle.mark_running());
        assert_eq!(lifecycle.state(), SessionState::Running);

        assert!(lifecycle.close());
        assert!(!lifecycle.close());
        assert!(lifecycle.is_closed());
        assert!(!lifecycle.mark_running());
    }

    #[test]
    fn test_session_renders_and_closes_once() {
        let output = OutputGate::spawn(io::sink());
        let (events_tx, events_rx) = mpsc::channel();

        let parts = PtyParts {
            reader: Box::new(Cursor::new(b"hi\n".to_vec())),
            writer: Box::new(io::sink()),
            process: Box::new(ExitNow(0)),
        };

        let mut session = Session::new(7);
        session
            .start(parts, ScreenRenderer::new(Rect::new(1, 1, 20, 5)), output.clone(), events_tx)
            .unwrap();

        let event = events_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(event, SessionEvent::Closed { id: 7, .. }));
        assert_eq!(session.state(), SessionState::Closed);

        // Both the reader and the waiter finish, but only one event is sent
        assert!(events_rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_session_forwards_input_and_output() {
        let sink = SharedBuf::default();
        let output = OutputGate::spawn(sink.clone());
        let (events_tx, events_rx) = mpsc::channel();
        let (exit_tx, exit_rx) = mpsc::channel();
        let (pty_tx, pty_rx) = mpsc::channel();
        let pty_input = SharedBuf::default();

        let parts = PtyParts {
            reader: Box::new(ChannelReader(pty_rx)),
            writer: Box::new(pty_input.clone()),
            process: Box::new(ExitOnSignal(exit_rx)),
        };

        let mut session = Session::new(1);
        session.write(b"ls");
        session
            .start(parts, ScreenRenderer::new(Rect::new(11, 3, 20, 5)), output.clone(), events_tx)
            .unwrap();
        session.write(b"\r");

        pty_tx.send(b"AB".to_vec()).unwrap();

        wait_until(|| pty_input.contents() == b"ls\r");
        wait_until(|| {
            output.sync();
            sink.contents() == b"\x1b[3;11HAB"
        });

        // The child exits first, the reader notices EOF afterwards
        exit_tx.send(130).unwrap();
        let event = events_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event, SessionEvent::Closed { id: 1, exit_code: Some(130) });
        drop(pty_tx);

        assert_eq!(pty_input.contents(), b"ls\r".to_vec());
        assert_eq!(sink.contents(), b"\x1b[3;11HAB".to_vec());
    }

    #[test]
    fn test_start_twice_fails() {
        let output = OutputGate::spawn(io::sink());
        let (events_tx, _events_rx) = mpsc::channel();
        let parts = || PtyParts {
            reader: Box::new(io::empty()),
            writer: Box::new(io::sink()),
            process: Box::new(ExitNow(0)),
        };

        let mut session = Session::new(1);
        let rect = Rect::new(1, 1, 10, 10);
        assert!(session
            .start(parts(), ScreenRenderer::new(rect), output.clone(), events_tx.clone())
            .is_ok());
        assert!(session
            .start(parts(), ScreenRenderer::new(rect), output, events_tx)
            .is_err());
    }
}
