//! Terminal-backed output channels for media subprocesses.
//!
//! Players and recorders such as `aplay`/`arecord` switch to block buffering
//! when stdout is not a terminal, so each output stream of a job gets its own
//! pseudo-terminal pair instead of a pipe. The child writes into the slave end;
//! the job reads the master end.


use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;

/// Size used when the controller is not attached to a terminal.
pub const FALLBACK_COLS: u16 = 80;
pub const FALLBACK_ROWS: u16 = 24;

/// A pseudo-terminal pair sized like the controlling terminal.
#[derive(Debug)]
pub struct TerminalChannel {
    master: OwnedFd,
    slave: OwnedFd,
}

impl TerminalChannel {
    /// Allocate a pty pair. The master is non-blocking and neither end leaks across exec.
    pub fn open() -> io::Result<Self> {
        let (cols, rows) = controlling_terminal_size();
        let mut master_fd: RawFd = -1;
        let mut slave_fd: RawFd = -1;
        let mut ws = winsize(rows, cols);

        #[allow(clippy::unnecessary_mut_passed)]
        // SAFETY: openpty expects valid pointers for master/slave/winsize; we pass stack locals.
        let result = unsafe {
            libc::openpty(
                &mut master_fd,
                &mut slave_fd,
                ptr::null_mut(),
                ptr::null_mut(),
                &mut ws,
            )
        };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: openpty succeeded, so both descriptors are open and owned by us alone.
        let (master, slave) = unsafe { (OwnedFd::from_raw_fd(master_fd), OwnedFd::from_raw_fd(slave_fd)) };

        // Sibling jobs spawn concurrently; a slave inherited by the wrong child
        // would keep this channel open after our own child exits.
        set_cloexec(master.as_raw_fd())?;
        set_cloexec(slave.as_raw_fd())?;
        set_winsize(master.as_raw_fd(), rows, cols)?;
        set_winsize(slave.as_raw_fd(), rows, cols)?;
        set_nonblocking(master.as_raw_fd())?;

        Ok(Self { master, slave })
    }

    pub fn master(&self) -> &OwnedFd {
        &self.master
    }

    pub fn slave(&self) -> &OwnedFd {
        &self.slave
    }

    /// Split into `(master, slave)`.
    pub fn into_parts(self) -> (OwnedFd, OwnedFd) {
        (self.master, self.slave)
    }
}

/// Current `(cols, rows)` of the controlling terminal, or 80x24.
pub fn controlling_terminal_size() -> (u16, u16) {
    match crossterm::terminal::size() {
        Ok((cols, rows)) if cols > 0 && rows > 0 => (cols, rows),
        _ => (FALLBACK_COLS, FALLBACK_ROWS),
    }
}

fn winsize(rows: u16, cols: u16) -> libc::winsize {
    // SAFETY: libc::winsize is a plain C struct; zeroed is a valid baseline.
    let mut ws: libc::winsize = unsafe { mem::zeroed() };
    ws.ws_row = rows.max(1);
    ws.ws_col = cols.max(1);
    ws.ws_xpixel = 0;
    ws.ws_ypixel = 0;
    ws
}

/// Set the terminal window size of a pty end.
pub fn set_winsize(fd: RawFd, rows: u16, cols: u16) -> io::Result<()> {
    let ws = winsize(rows, cols);
    // SAFETY: ioctl reads ws, which is initialized, and only touches fd.
    let result = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &ws) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Read back the window size of a pty end as `(rows, cols)`.
pub fn winsize_of(fd: RawFd) -> io::Result<(u16, u16)> {
    // SAFETY: libc::winsize is a plain C struct; zeroed is a valid baseline.
    let mut ws: libc::winsize = unsafe { mem::zeroed() };
    // SAFETY: ioctl writes into ws, which lives for the duration of the call.
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut ws) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((ws.ws_row, ws.ws_col))
}

/// Configure a descriptor for non-blocking reads.
pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: fcntl only inspects and updates flags on the given descriptor.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn set_cloexec(fd: RawFd) -> io::Result<()> {
    // SAFETY: fcntl only inspects and updates descriptor flags on the given descriptor.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD, 0);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
