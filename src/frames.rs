//! # Frame Sources
//!
//! Frames arrive from outside: a camera, a recording, or a process that
//! already ran face analysis on the camera feed. [`FrameSource`] yields them
//! one per tick until the stream ends, which ends the session.
//!
//! [`LineFrameSource`] treats each line of text as one frame, which pairs
//! with [`crate::classifier::LabelClassifier`]. The lines can come from a
//! file (a recorded session), stdin, or the stdout of a classifier command
//! started with `sh -c`.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// Supplier of frames. `None` means the stream is over for good.
pub trait FrameSource {
    type Frame;

    fn next_frame(&mut self) -> Option<Self::Frame>;
}

/// Adapts any iterator into a frame source.
#[derive(Debug, Clone)]
pub struct IterFrames<I>(pub I);

impl<I: Iterator> FrameSource for IterFrames<I> {
    type Frame = I::Item;

    fn next_frame(&mut self) -> Option<I::Item> {
        self.0.next()
    }
}

/// One frame per line of text.
pub struct LineFrameSource {
    reader: Box<dyn BufRead + Send>,
    child: Option<Child>,
    lines_read: u64,
}

impl std::fmt::Debug for LineFrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineFrameSource")
            .field("child", &self.child.as_ref().map(Child::id))
            .field("lines_read", &self.lines_read)
            .finish_non_exhaustive()
    }
}

impl LineFrameSource {
    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(reader),
            child: None,
            lines_read: 0,
        }
    }

    /// Reads frames from `path`, or from stdin when `path` is `-`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        if path.as_os_str() == "-" {
            debug!("Reading frames from stdin");
            return Ok(Self::from_reader(BufReader::new(io::stdin())));
        }

        let file = File::open(path)
            .with_context(|| format!("Failed to open frame file {}", path.display()))?;
        info!("Replaying frames from {}", path.display());
        Ok(Self::from_reader(BufReader::new(file)))
    }

    /// Starts `command` through `sh -c` and reads frames from its stdout.
    /// The process is killed when the source is dropped.
    ///
    /// # Errors
    ///
    /// Fails if the command cannot be spawned.
    pub fn spawn(command: &str) -> Result<Self> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdout(Stdio::piped())
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start classifier command: {command}"))?;

        let stdout = child
            .stdout
            .take()
            .context("Failed to capture classifier command output")?;

        info!("Started classifier command (pid {}): {command}", child.id());
        Ok(Self {
            reader: Box::new(BufReader::new(stdout)),
            child: Some(child),
            lines_read: 0,
        })
    }

    #[must_use]
    pub const fn lines_read(&self) -> u64 {
        self.lines_read
    }
}

impl FrameSource for LineFrameSource {
    type Frame = String;

    /// A line that is not valid UTF-8 is decoded lossily and still yields a
    /// frame; the classifier rejects it. Only EOF or an I/O error ends the
    /// stream.
    fn next_frame(&mut self) -> Option<String> {
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                debug!("Frame stream ended after {} lines", self.lines_read);
                None
            }
            Ok(_) => {
                self.lines_read += 1;
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                Some(String::from_utf8_lossy(&buf).into_owned())
            }
            Err(e) => {
                warn!("Cannot read frame: {e}");
                None
            }
        }
    }
}

impl Drop for LineFrameSource {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
