//! Multiplexer - Owns the panes, routes stdin, and runs the shutdown path

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use super::layout::tile;
use super::pane::{Pane, PaneId};
use crate::config::Config;
use crate::core::pty::PtySystem;
use crate::core::session::SessionEvent;
use crate::ui::{InputAction, InputRouter, OutputGate, TerminalControl};

/// Focus value while no pane exists
const NO_FOCUS: usize = usize::MAX;

const STDIN_CHUNK: usize = 1024;

/// Pane collection shared with the input dispatcher, in tiling order
type SharedPanes = Arc<Mutex<Vec<Pane>>>;

fn lock(panes: &Mutex<Vec<Pane>>) -> MutexGuard<'_, Vec<Pane>> {
    panes.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Multiplexer - tiles the terminal and supervises every pane
pub struct Multiplexer {
    config: Config,
    shell: String,
    terminal: Arc<dyn TerminalControl>,
    pty_system: Arc<dyn PtySystem>,
    output: OutputGate,
    panes: SharedPanes,
    /// Index into `panes`, written under the panes lock
    focused: Arc<AtomicUsize>,
    /// Panes started and not yet closed
    open: usize,
    next_id: PaneId,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
}

impl Multiplexer {
    pub fn new(
        config: Config,
        terminal: Arc<dyn TerminalControl>,
        pty_system: Arc<dyn PtySystem>,
        output: OutputGate,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            shell: config.shell(),
            config,
            terminal,
            pty_system,
            output,
            panes: Arc::new(Mutex::new(Vec::new())),
            focused: Arc::new(AtomicUsize::new(NO_FOCUS)),
            open: 0,
            next_id: 1,
            events_tx,
            events_rx,
        }
    }

    /// Put the terminal in raw mode and start one pane per tile.
    ///
    /// Returns the number of panes that started. A pane that fails to start
    /// is logged and left out.
    pub fn start(&mut self) -> anyhow::Result<usize> {
        let (rows, cols) = self
            .terminal
            .size()
            .context("Failed to query terminal size")?;
        info!("Terminal size: {}x{}", cols, rows);
        info!("Shell: {}", self.shell);
        info!("Layout: {:?}", self.config.layout);

        self.terminal
            .enter()
            .context("Failed to switch terminal to raw mode")?;

        for rect in tile(self.config.layout, rows, cols, self.config.panes) {
            let id = self.next_id;
            self.next_id += 1;

            let mut pane = Pane::new(id, rect);
            let started = pane.start(
                self.pty_system.as_ref(),
                &self.shell,
                self.output.clone(),
                self.events_tx.clone(),
            );
            match started {
                Ok(()) => {
                    debug!("Pane {} {:?} at {:?}", id, pane.state(), pane.rect);
                    self.open += 1;
                    lock(&self.panes).push(pane);
                }
                Err(e) => error!("Pane {} failed to start: {:#}", id, e),
            }
        }

        if self.open > 0 {
            self.focused.store(0, Ordering::SeqCst);
        }
        info!("{} pane(s) running", self.open);
        Ok(self.open)
    }

    /// Handle for the stdin reader thread
    pub fn input_dispatcher(&self) -> InputDispatcher {
        InputDispatcher {
            panes: Arc::clone(&self.panes),
            focused: Arc::clone(&self.focused),
            router: InputRouter::new(self.config.prefix()),
        }
    }

    /// Block until every pane has closed, then restore the terminal.
    pub fn run(&mut self) -> anyhow::Result<()> {
        while self.open > 0 {
            match self.events_rx.recv() {
                Ok(SessionEvent::Closed { id, exit_code }) => self.remove_pane(id, exit_code),
                Err(_) => break,
            }
        }
        self.shutdown();
        Ok(())
    }

    /// Number of panes not yet closed
    pub fn open_count(&self) -> usize {
        self.open
    }

    /// Index of the focused pane, if any
    pub fn focused(&self) -> Option<usize> {
        match self.focused.load(Ordering::SeqCst) {
            NO_FOCUS => None,
            index => Some(index),
        }
    }

    /// Live pane ids in tiling order
    pub fn pane_ids(&self) -> Vec<PaneId> {
        lock(&self.panes).iter().map(|pane| pane.id).collect()
    }

    fn remove_pane(&mut self, id: PaneId, exit_code: Option<u32>) {
        let mut panes = lock(&self.panes);
        let Some(index) = panes.iter().position(|pane| pane.id == id) else {
            warn!("Close event for unknown pane {}", id);
            return;
        };

        panes.remove(index);
        self.open = self.open.saturating_sub(1);
        info!("Pane {} removed (exit code {:?}), {} left", id, exit_code, self.open);

        let focused = self.focused.load(Ordering::SeqCst);
        let next = if panes.is_empty() {
            NO_FOCUS
        } else if focused > index && focused != NO_FOCUS {
            focused - 1
        } else {
            focused.min(panes.len() - 1)
        };
        self.focused.store(next, Ordering::SeqCst);
    }

    /// The only place terminal mode is restored.
    fn shutdown(&self) {
        info!("All panes closed, shutting down");
        self.output.sync();
        if let Err(e) = self.terminal.restore() {
            warn!("Failed to restore terminal: {}", e);
        }
    }
}

/// Routes real stdin to the focused pane
pub struct InputDispatcher {
    panes: SharedPanes,
    focused: Arc<AtomicUsize>,
    router: InputRouter,
}

impl InputDispatcher {
    /// Apply one read's worth of stdin.
    pub fn dispatch(&mut self, bytes: &[u8]) {
        for action in self.router.route(bytes) {
            let panes = lock(&self.panes);
            let count = panes.len();
            if count == 0 {
                return;
            }
            let current = self.focused.load(Ordering::SeqCst) % count;

            match action {
                InputAction::Forward(data) => panes[current].write(&data),
                InputAction::FocusNext => self.set_focus((current + 1) % count),
                InputAction::FocusPrev => self.set_focus((current + count - 1) % count),
                InputAction::Focus(index) if index < count => self.set_focus(index),
                InputAction::Focus(index) => debug!("No pane {} to focus", index + 1),
            }
        }
    }

    fn set_focus(&self, index: usize) {
        debug!("Focus pane index {}", index);
        self.focused.store(index, Ordering::SeqCst);
    }

    /// Read `input` on a dedicated thread until it closes.
    pub fn spawn<R>(mut self, mut input: R) -> std::io::Result<()>
    where
        R: Read + Send + 'static,
    {
        thread::Builder::new()
            .name("stdin".to_string())
            .spawn(move || {
                let mut buffer = [0u8; STDIN_CHUNK];
                loop {
                    match input.read(&mut buffer) {
                        Ok(0) => break,
                        Ok(n) => self.dispatch(&buffer[..n]),
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => {
                            warn!("stdin read error: {}", e);
                            break;
                        }
                    }
                }
                debug!("stdin closed");
            })
            .map(|_| ())
    }
}
