//! Pane - A single tiled rectangle backed by its own shell

use std::sync::mpsc::Sender;

use crate::core::pty::{LineFlags, PtySystem, SpawnRequest};
use crate::core::session::{Session, SessionEvent, SessionState};
use crate::core::term::{Rect, ScreenRenderer};
use crate::ui::OutputGate;

/// Unique identifier for a pane
pub type PaneId = u64;

/// A single pane containing a terminal session
pub struct Pane {
    /// Unique identifier
    pub id: PaneId,
    /// Position and size on the real terminal, fixed at creation
    pub rect: Rect,
    /// Terminal session
    session: Session,
}

impl Pane {
    /// Create a pane in the `Starting` state
    pub fn new(id: PaneId, rect: Rect) -> Self {
        Self {
            id,
            rect,
            session: Session::new(id),
        }
    }

    /// Allocate the pty, spawn the shell and start the pane's threads.
    pub fn start(
        &mut self,
        pty_system: &dyn PtySystem,
        shell: &str,
        output: OutputGate,
        events: Sender<SessionEvent>,
    ) -> anyhow::Result<()> {
        let request = SpawnRequest {
            shell: shell.to_string(),
            rows: self.rect.height,
            cols: self.rect.width,
            flags: LineFlags::default(),
        };
        let parts = pty_system.spawn(&request)?;
        self.session
            .start(parts, ScreenRenderer::new(self.rect), output, events)?;
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Forward keystrokes to the pane's shell
    pub fn write(&self, data: &[u8]) {
        self.session.write(data);
    }

    #[cfg(test)]
    pub(crate) fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}
