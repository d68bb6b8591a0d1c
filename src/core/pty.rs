//! Pseudo-terminal wrapper
//!
//! Allocates a pty pair sized to a pane, pins its line discipline, and
//! spawns the shell on the slave side. The rest of the program only sees
//! the byte streams and a handle to wait on the child.

use std::io::{self, Read, Write};

use bitflags::bitflags;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to open pty: {0}")]
    Open(String),

    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    #[error("Failed to clone pty reader: {0}")]
    Reader(String),

    #[error("Failed to take pty writer: {0}")]
    Writer(String),

    #[error("Failed to configure pty line discipline: {0}")]
    LineDiscipline(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, PtyError>;

bitflags! {
    /// Line discipline switches applied to each pane's pty
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineFlags: u8 {
        /// Canonical (line-buffered) input
        const CANONICAL = 0b0000_0001;
        /// Break flushes queues and signals the foreground group
        const BRKINT    = 0b0000_0010;
        /// Ring the bell when the input queue is full
        const IMAXBEL   = 0b0000_0100;
        /// Any character restarts stopped output
        const IXANY     = 0b0000_1000;
        /// Input is UTF-8 (character-wise erase)
        const IUTF8     = 0b0001_0000;
    }
}

impl Default for LineFlags {
    /// Canonical mode off, everything else on.
    fn default() -> Self {
        LineFlags::BRKINT | LineFlags::IMAXBEL | LineFlags::IXANY | LineFlags::IUTF8
    }
}

/// Byte pinned into the end-of-line control characters
pub const EOL_DISABLED: u8 = 255;

/// What to run in a pane and how big its pty is
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub shell: String,
    pub rows: u16,
    pub cols: u16,
    pub flags: LineFlags,
}

/// A child process that can be waited on
pub trait PaneProcess: Send {
    /// Block until the process exits, returning its exit code.
    fn wait(&mut self) -> io::Result<u32>;
}

/// Everything a running pane owns exclusively
pub struct PtyParts {
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
    pub process: Box<dyn PaneProcess>,
}

/// Pseudo-terminal service
pub trait PtySystem: Send + Sync {
    fn spawn(&self, request: &SpawnRequest) -> Result<PtyParts>;
}

/// The platform's pty via portable-pty
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePtySystem;

impl PtySystem for NativePtySystem {
    fn spawn(&self, request: &SpawnRequest) -> Result<PtyParts> {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows: request.rows,
                cols: request.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Open(e.to_string()))?;

        configure_line_discipline(pair.master.as_ref(), request.flags)?;

        let mut cmd = CommandBuilder::new(&request.shell);
        cmd.env("TILEMUX", "1");
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        // Only the child keeps the slave side open, so reads see EOF when it exits
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Reader(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Writer(e.to_string()))?;

        Ok(PtyParts {
            reader,
            writer,
            process: Box::new(NativeProcess {
                child,
                _master: pair.master,
            }),
        })
    }
}

/// Child process plus the master it is attached to
struct NativeProcess {
    child: Box<dyn Child + Send + Sync>,
    _master: Box<dyn MasterPty + Send>,
}

impl PaneProcess for NativeProcess {
    fn wait(&mut self) -> io::Result<u32> {
        self.child.wait().map(|status| status.exit_code())
    }
}

/// Returns the invoking user's shell, falling back to `/bin/sh`.
pub fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}

#[cfg(unix)]
fn configure_line_discipline(master: &dyn MasterPty, flags: LineFlags) -> Result<()> {
    let Some(fd) = master.as_raw_fd() else {
        debug!("pty master has no raw fd, leaving line discipline untouched");
        return Ok(());
    };

    // SAFETY: termios is plain old data and fd is a live pty master.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        return Err(PtyError::LineDiscipline(io::Error::last_os_error()));
    }

    set_flag(&mut tio.c_lflag, libc::ICANON, flags.contains(LineFlags::CANONICAL));
    set_flag(&mut tio.c_iflag, libc::BRKINT, flags.contains(LineFlags::BRKINT));
    set_flag(&mut tio.c_iflag, libc::IMAXBEL, flags.contains(LineFlags::IMAXBEL));
    set_flag(&mut tio.c_iflag, libc::IXANY, flags.contains(LineFlags::IXANY));
    #[cfg(any(target_os = "linux", target_os = "android"))]
    set_flag(&mut tio.c_iflag, libc::IUTF8, flags.contains(LineFlags::IUTF8));

    tio.c_cc[libc::VEOL] = EOL_DISABLED;
    tio.c_cc[libc::VEOL2] = EOL_DISABLED;
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        tio.c_cc[libc::VSWTC] = EOL_DISABLED;
    }

    // SAFETY: tio was filled by tcgetattr above.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } != 0 {
        return Err(PtyError::LineDiscipline(io::Error::last_os_error()));
    }
    debug!("pty line discipline set: {:?}", flags);
    Ok(())
}

#[cfg(unix)]
fn set_flag(field: &mut libc::tcflag_t, bit: libc::tcflag_t, on: bool) {
    if on {
        *field |= bit;
    } else {
        *field &= !bit;
    }
}

#[cfg(not(unix))]
fn configure_line_discipline(_master: &dyn MasterPty, flags: LineFlags) -> Result<()> {
    debug!("line discipline {:?} not applicable on this platform", flags);
    Ok(())
}
