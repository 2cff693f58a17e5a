//! The M32/M99 file-stack abstraction: a LIFO of G-code input streams.
//! The root stream (stdin or the path given on the command line)
//! never leaves the bottom of the stack; M32 pushes a new file on top,
//! M99 or that file's own EOF pops it back off.
//!
//! While a file is active, the root stream is still tended between its
//! lines: a host-sent M112 mustn't wait for the whole file to finish
//! before it's seen. On Linux, `root`'s file descriptor is switched to
//! non-blocking so it can be polled without stalling file playback;
//! elsewhere (or if that switch fails) the root stream falls back to
//! being read only once it's at the bottom of the stack again, same as
//! the original simple behavior.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

pub struct GcodeFileStack {
    root: Box<dyn BufRead + Send>,
    /// The root stream's raw fd, once confirmed switched to
    /// `O_NONBLOCK`. `None` means the root can only be read while it's
    /// the active stream.
    root_fd: Option<i32>,
    /// Bytes read from `root` that don't yet form a complete line,
    /// carried across calls (including across the non-blocking poll
    /// made while a file is active and the later blocking read made
    /// once the root is active again).
    root_partial: String,
    stack: Vec<Box<dyn BufRead + Send>>,
    fsroot: PathBuf,
}

impl GcodeFileStack {
    pub fn new(root: Box<dyn BufRead + Send>, fsroot: PathBuf) -> Self {
        Self::new_with_fd(root, fsroot, None)
    }

    /// `root_fd`, when given, is the raw file descriptor backing
    /// `root` (stdin, or the file the command line names): it gets
    /// switched to non-blocking so the root stream can still be polled
    /// for a new command while a pushed M32 file is being read.
    pub fn new_with_fd(root: Box<dyn BufRead + Send>, fsroot: PathBuf, root_fd: Option<i32>) -> Self {
        let root_fd = root_fd.and_then(|fd| match set_nonblocking(fd) {
            Ok(()) => Some(fd),
            Err(err) => {
                tracing::warn!(
                    %err,
                    "failed to make G-code input non-blocking; a host emergency stop will be delayed until any active M32 file finishes"
                );
                None
            }
        });
        GcodeFileStack { root, root_fd, root_partial: String::new(), stack: Vec::new(), fsroot }
    }

    /// The next line of G-code text, or `None` once the root stream
    /// itself has hit EOF (the whole job is done).
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if self.in_file() {
                if let Some(line) = self.poll_root()? {
                    return Ok(Some(line));
                }
                let top = self.stack.last_mut().expect("in_file() just confirmed a non-empty stack");
                let mut buf = String::new();
                let n = top.read_line(&mut buf)?;
                if n == 0 {
                    self.stack.pop();
                    continue;
                }
                return Ok(Some(buf));
            }

            return self.read_root_blocking();
        }
    }

    /// Non-blocking: reads whatever is immediately available from the
    /// root stream and returns a line if that completed one, without
    /// ever stalling waiting on it. Only does anything when the root
    /// fd was successfully switched to non-blocking; otherwise the
    /// root stream is left untouched until it's active again.
    fn poll_root(&mut self) -> io::Result<Option<String>> {
        if self.root_fd.is_none() {
            return Ok(None);
        }
        match self.root.read_line(&mut self.root_partial) {
            Ok(0) => Ok(None), // root closed; the active file keeps running
            Ok(_) => {
                if self.root_partial.ends_with('\n') {
                    Ok(Some(std::mem::take(&mut self.root_partial)))
                } else {
                    Ok(None)
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Reads the next line from the root stream, blocking (via `poll`
    /// on Linux when the fd is non-blocking, or a plain blocking read
    /// otherwise) until a full line arrives or the stream hits EOF.
    fn read_root_blocking(&mut self) -> io::Result<Option<String>> {
        let Some(fd) = self.root_fd else {
            let mut buf = std::mem::take(&mut self.root_partial);
            let n = self.root.read_line(&mut buf)?;
            return Ok(if n == 0 { None } else { Some(buf) });
        };
        loop {
            match self.root.read_line(&mut self.root_partial) {
                Ok(0) => {
                    return Ok(if self.root_partial.is_empty() {
                        None
                    } else {
                        Some(std::mem::take(&mut self.root_partial))
                    });
                }
                Ok(_) => return Ok(Some(std::mem::take(&mut self.root_partial))),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => wait_readable(fd)?,
                Err(err) => return Err(err),
            }
        }
    }

    /// Pushes `filename` (resolved against `fsroot`) onto the stack,
    /// per M32.
    pub fn push_file(&mut self, filename: &str) -> io::Result<()> {
        let path = self.resolve(filename);
        let file = File::open(path)?;
        self.stack.push(Box::new(BufReader::new(file)));
        Ok(())
    }

    /// Pops the current file, per M99. Returns `false` if there was
    /// nothing to pop (already at the root stream).
    pub fn pop_current(&mut self) -> bool {
        self.stack.pop().is_some()
    }

    pub fn in_file(&self) -> bool {
        !self.stack.is_empty()
    }

    fn resolve(&self, filename: &str) -> PathBuf {
        let path = Path::new(filename);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.fsroot.join(path)
        }
    }
}

/// Reads the raw fd backing `stream`, on platforms where that's
/// meaningful. Returns `None` on anything else, which leaves the root
/// stream in its always-blocking fallback mode.
#[cfg(target_os = "linux")]
pub fn raw_fd_of<T: std::os::unix::io::AsRawFd>(stream: &T) -> Option<i32> {
    Some(stream.as_raw_fd())
}
#[cfg(not(target_os = "linux"))]
pub fn raw_fd_of<T>(_stream: &T) -> Option<i32> {
    None
}

#[cfg(target_os = "linux")]
fn set_nonblocking(fd: i32) -> io::Result<()> {
    // SAFETY: `fd` is a valid, open file descriptor (stdin or a file
    // just opened by the caller) for the duration of this call; we
    // don't take ownership of it.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: same fd, setting flags already read from it.
    let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
#[cfg(not(target_os = "linux"))]
fn set_nonblocking(_fd: i32) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "non-blocking G-code input requires Linux"))
}

/// Blocks until `fd` has data available to read (or an error/hangup),
/// without spinning. Used to turn the root stream's non-blocking reads
/// back into an ordinary blocking wait once it's the active stream
/// again.
#[cfg(target_os = "linux")]
fn wait_readable(fd: i32) -> io::Result<()> {
    let mut pfd = libc::pollfd { fd, events: libc::POLLIN, revents: 0 };
    // SAFETY: `pfd` is a valid pollfd and `1` is its length.
    let ret = unsafe { libc::poll(&mut pfd, 1, -1) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
#[cfg(not(target_os = "linux"))]
fn wait_readable(_fd: i32) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "non-blocking G-code input requires Linux"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_only_stream_reads_lines_until_eof() {
        let mut files = GcodeFileStack::new(Box::new(io::Cursor::new(b"G28\nG1 X1\n".to_vec())), PathBuf::new());
        assert_eq!(files.next_line().unwrap().as_deref(), Some("G28\n"));
        assert_eq!(files.next_line().unwrap().as_deref(), Some("G1 X1\n"));
        assert_eq!(files.next_line().unwrap(), None);
    }

    #[test]
    fn without_a_root_fd_a_pushed_file_is_read_to_completion_before_root_resumes() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("gcode_source_test_{}.gcode", std::process::id()));
        std::fs::write(&path, b"G1 X1\nG1 X2\n").unwrap();

        let mut files = GcodeFileStack::new(Box::new(io::Cursor::new(b"M32 test.gcode\nG28\n".to_vec())), dir);
        files.push_file(path.file_name().unwrap().to_str().unwrap()).unwrap();
        assert!(files.in_file());
        assert_eq!(files.next_line().unwrap().as_deref(), Some("G1 X1\n"));
        assert_eq!(files.next_line().unwrap().as_deref(), Some("G1 X2\n"));
        assert!(!files.in_file());
        assert_eq!(files.next_line().unwrap().as_deref(), Some("G28\n"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn pop_current_returns_false_at_the_root() {
        let mut files = GcodeFileStack::new(Box::new(io::empty()), PathBuf::new());
        assert!(!files.pop_current());
    }
}
