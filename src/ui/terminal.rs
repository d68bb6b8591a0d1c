//! Real terminal mode controller
//!
//! Raw mode and the alternate screen are switched on once at startup and
//! off once at shutdown. Restoring is idempotent so a second call is a no-op.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::cursor::{MoveTo, Show};
use crossterm::execute;
use crossterm::style::ResetColor;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use tracing::{info, warn};

/// Terminal Mode Controller
pub trait TerminalControl: Send + Sync {
    /// Real terminal size as `(rows, cols)`
    fn size(&self) -> io::Result<(u16, u16)>;
    /// Switch to raw mode (and the alternate screen when enabled).
    fn enter(&self) -> io::Result<()>;
    /// Return to cooked mode and the normal screen.
    fn restore(&self) -> io::Result<()>;
}

/// Controller for the process's own terminal via crossterm
#[derive(Debug)]
pub struct CrosstermTerminal {
    alternate_screen: bool,
    entered: AtomicBool,
    restored: AtomicBool,
}

impl CrosstermTerminal {
    pub fn new(alternate_screen: bool) -> Self {
        Self {
            alternate_screen,
            entered: AtomicBool::new(false),
            restored: AtomicBool::new(false),
        }
    }
}

impl TerminalControl for CrosstermTerminal {
    fn size(&self) -> io::Result<(u16, u16)> {
        let (cols, rows) = terminal::size()?;
        Ok((rows, cols))
    }

    fn enter(&self) -> io::Result<()> {
        if self.entered.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        if self.alternate_screen {
            execute!(stdout, EnterAlternateScreen)?;
        }
        execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
        info!("Terminal in raw mode (alternate screen: {})", self.alternate_screen);
        Ok(())
    }

    fn restore(&self) -> io::Result<()> {
        if self.restored.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let raw = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let screen = if self.alternate_screen {
            execute!(stdout, ResetColor, Show, LeaveAlternateScreen)
        } else {
            execute!(stdout, ResetColor, Show)
        };
        let _ = stdout.flush();

        if let Err(ref e) = screen {
            warn!("Failed to reset screen: {}", e);
        }
        info!("Terminal restored");
        raw.and(screen)
    }
}
