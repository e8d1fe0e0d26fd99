use crate::lock_or_recover;
use crate::pump::OutputSinks;
use std::io::{self, Write};
use std::os::fd::{FromRawFd, OwnedFd};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// In-memory sink whose clones append to the same buffer.
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub(crate) fn contents(&self) -> Vec<u8> {
        lock_or_recover(&self.bytes, "SharedBuffer::contents").clone()
    }

    pub(crate) fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock_or_recover(&self.bytes, "SharedBuffer::write").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub(crate) struct CaptureSinks {
    pub(crate) primary: SharedBuffer,
    pub(crate) secondary: SharedBuffer,
}

impl OutputSinks for CaptureSinks {
    fn primary(&self) -> Box<dyn Write + Send> {
        Box::new(self.primary.clone())
    }

    fn secondary(&self) -> Box<dyn Write + Send> {
        Box::new(self.secondary.clone())
    }
}

pub(crate) fn pipe_pair() -> (OwnedFd, OwnedFd) {
    let mut fds = [0; 2];
    let result = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(
        result,
        0,
        "pipe() failed with errno {}",
        io::Error::last_os_error()
    );
    unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
}

/// Poll `check` every few milliseconds until it holds or `timeout` passes.
pub(crate) fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}
