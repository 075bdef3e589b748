//! Frame acquisition
//!
//! Sources produce a finite lazy sequence of frames: a single image, or
//! every image in a directory in name order. A reader thread feeds the
//! pipeline through a bounded channel holding at most one pending frame, so
//! a slow pipeline throttles the reader instead of growing a queue.

pub mod frame;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub use frame::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Produces frames in sequence order; signals end-of-sequence with `None`.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Yields a single image file once.
pub struct ImageSource {
    path: PathBuf,
    done: bool,
}

impl ImageSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path, done: false }
    }
}

impl FrameSource for ImageSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        let image = image::open(&self.path)
            .with_context(|| format!("failed to open image {:?}", self.path))?
            .to_rgb8();
        Ok(Some(Frame::new(image, 0)))
    }
}

/// Yields every image in a directory, in file-name order.
pub struct DirectorySource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl DirectorySource {
    pub fn new(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read directory {:?}", dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();
        debug!("Found {} image files in {:?}", paths.len(), dir);
        Ok(Self { paths, next: 0 })
    }
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        let index = self.next as u64;
        self.next += 1;
        let image = image::open(path)
            .with_context(|| format!("failed to open image {:?}", path))?
            .to_rgb8();
        Ok(Some(Frame::new(image, index)))
    }
}

/// Open a source for the given path: a directory enumerates its images, a
/// file is treated as a single image.
pub fn open_source(path: &Path) -> Result<Box<dyn FrameSource>> {
    if path.is_dir() {
        Ok(Box::new(DirectorySource::new(path)?))
    } else {
        Ok(Box::new(ImageSource::new(path.to_path_buf())))
    }
}

/// Move the source onto a reader thread feeding a bounded(1) channel: the
/// pipeline holds the current frame, the channel at most the next one.
/// A read error is forwarded once and ends the stream.
pub fn spawn_reader(
    mut source: Box<dyn FrameSource>,
    stop: Arc<AtomicBool>,
) -> Receiver<Result<Frame>> {
    let (tx, rx) = bounded(1);
    std::thread::spawn(move || loop {
        if stop.load(Ordering::SeqCst) {
            debug!("Frame reader stopping on stop signal");
            break;
        }
        match source.next_frame() {
            Ok(Some(frame)) => {
                if tx.send(Ok(frame)).is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!("Frame source exhausted");
                break;
            }
            Err(e) => {
                warn!("Frame source error: {e:#}");
                let _ = tx.send(Err(e));
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::sync::atomic::AtomicU64;
    use std::time::Duration;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) {
        RgbImage::new(w, h).save(dir.join(name)).unwrap();
    }

    #[test]
    fn image_source_yields_once() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 4, 3);

        let mut source = ImageSource::new(dir.path().join("a.png"));
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.dimensions(), (4, 3));
        assert_eq!(frame.index, 0);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn directory_source_is_name_ordered() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 2, 2);
        write_png(dir.path(), "a.png", 1, 1);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = DirectorySource::new(dir.path()).unwrap();
        assert_eq!(source.next_frame().unwrap().unwrap().dimensions(), (1, 1));
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.dimensions(), (2, 2));
        assert_eq!(second.index, 1);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut source = ImageSource::new(PathBuf::from("/nonexistent/frame.png"));
        assert!(source.next_frame().is_err());
    }

    /// Endless source that counts how many frames it has produced.
    struct CountingSource {
        produced: Arc<AtomicU64>,
    }

    impl FrameSource for CountingSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            let index = self.produced.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Frame::new(RgbImage::new(2, 2), index)))
        }
    }

    #[test]
    fn reader_blocks_after_one_pending_frame() {
        let produced = Arc::new(AtomicU64::new(0));
        let source = Box::new(CountingSource {
            produced: Arc::clone(&produced),
        });
        let stop = Arc::new(AtomicBool::new(false));
        let rx = spawn_reader(source, Arc::clone(&stop));

        // With nothing consuming, the reader holds at most the frame queued
        // in the channel plus the one it is blocked trying to send.
        std::thread::sleep(Duration::from_millis(100));
        assert!(produced.load(Ordering::SeqCst) <= 2);

        // Draining one frame frees exactly one slot.
        rx.recv().unwrap().unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert!(produced.load(Ordering::SeqCst) <= 3);

        // Dropping the receiver fails the pending send and ends the thread.
        drop(rx);
    }

    #[test]
    fn reader_thread_forwards_frames_then_closes() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "0.png", 2, 2);
        write_png(dir.path(), "1.png", 2, 2);

        let source = open_source(dir.path()).unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let rx = spawn_reader(source, stop);

        assert!(rx.recv().unwrap().is_ok());
        assert!(rx.recv().unwrap().is_ok());
        assert!(rx.recv().is_err()); // channel closed after exhaustion
    }
}
