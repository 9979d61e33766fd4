//! Captured frames.
//!
//! A capture is queued like any other command. [`Frame`] holds its future
//! and releases the host-side frame with a deferred command, which the queue
//! runs strictly after the capture itself. The release therefore never has
//! to block on the capture, and a frame dropped on the host thread before
//! the capture ran cannot deadlock.
//!
//! The capture writes the host frame handle into a slot shared with the
//! release, next to its future. A capture whose reader was interrupted
//! while it ran cannot store its reply, but its handle still reaches the
//! release.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{Reply, SourceApi, SourceCommand};
use crate::cx::Cx;
use crate::dispatch::Bridge;
use crate::error::Result;
use crate::future::Future;
use crate::tracing_compat::trace;
use crate::types::FrameId;

/// Pixel data of one captured frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameData {
    /// Host frame handle.
    pub id: FrameId,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per pixel.
    pub depth: u32,
    /// Row-major pixel bytes, `width * height * depth` long.
    pub pixels: Arc<[u8]>,
}

impl FrameData {
    fn stride(&self) -> usize {
        self.width as usize * self.depth as usize
    }

    /// Returns row `y`, or `None` past the last row.
    #[must_use]
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride();
        self.pixels.get(start..start + self.stride())
    }

    /// Iterates over rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let stride = self.stride().max(1);
        self.pixels.chunks(stride).take(self.height as usize)
    }

    /// Returns the bytes of pixel (`x`, `y`).
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width {
            return None;
        }
        let depth = self.depth as usize;
        let start = x as usize * depth;
        self.row(y)?.get(start..start + depth)
    }
}

/// A pending or completed capture.
///
/// Close it explicitly with [`Frame::close`] or let it drop; either way the
/// host frame is released exactly once.
pub struct Frame<H: SourceApi> {
    bridge: Bridge<H>,
    future: Future<Reply>,
    handle: Arc<Mutex<Option<FrameId>>>,
    released: bool,
}

impl<H: SourceApi> Frame<H> {
    /// Queues a capture of `source`.
    pub(crate) fn capture(bridge: &Bridge<H>, cx: &Cx, source: String) -> Result<Self> {
        let handle = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&handle);
        let command = SourceCommand::CaptureFrame { source };
        let future = bridge.schedule(cx, command.label(), move |host: &H| {
            let reply = command.apply(host)?;
            if let Reply::Frame(frame) = &reply {
                *slot.lock() = Some(frame.id);
            }
            Ok(reply)
        })?;
        Ok(Self {
            bridge: bridge.clone(),
            future,
            handle,
            released: false,
        })
    }

    /// Returns true once the capture has run (or failed).
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.future.has_result()
    }

    /// Blocks until the capture has run and returns its pixels.
    pub fn data(&self) -> Result<FrameData> {
        self.future.result()?.into_frame()
    }

    /// Frame width in pixels.
    pub fn width(&self) -> Result<u32> {
        Ok(self.data()?.width)
    }

    /// Frame height in pixels.
    pub fn height(&self) -> Result<u32> {
        Ok(self.data()?.height)
    }

    /// Bytes per pixel.
    pub fn depth(&self) -> Result<u32> {
        Ok(self.data()?.depth)
    }

    /// Releases the host frame.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let handle = Arc::clone(&self.handle);
        let future = self.future.id();
        self.bridge
            .post_deferred(&Cx::detached(), "release_frame", move |host: &H| {
                // Taken so a frame handle is released at most once.
                let taken = handle.lock().take();
                match taken {
                    Some(frame) => host.release_frame(frame),
                    None => {
                        trace!(future = %future, "no host frame to release");
                        Ok(())
                    }
                }
            })
    }
}

impl<H: SourceApi> Drop for Frame<H> {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

impl<H: SourceApi> std::fmt::Debug for Frame<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("future", &self.future)
            .field("handle", &*self.handle.lock())
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Source;
    use crate::lab::SimHost;
    use crate::test_utils::init_test_logging;
    use crate::types::CancelReason;

    fn bridge() -> Bridge<SimHost> {
        let bridge = Bridge::new(SimHost::new().with_source("Camera", "v4l2_input", 3, 2));
        bridge.start();
        bridge
    }

    #[test]
    fn frame_data_rows_and_pixels() {
        let data = FrameData {
            id: FrameId::new_for_test(1),
            width: 2,
            height: 2,
            depth: 2,
            pixels: Arc::from(vec![1, 2, 3, 4, 5, 6, 7, 8]),
        };
        assert_eq!(data.row(1), Some(&[5, 6, 7, 8][..]));
        assert_eq!(data.row(2), None);
        assert_eq!(data.pixel(1, 0), Some(&[3, 4][..]));
        assert_eq!(data.pixel(2, 0), None);
        assert_eq!(data.rows().count(), 2);
    }

    #[test]
    fn close_releases_after_capture_on_host_thread() {
        init_test_logging();
        let bridge = bridge();
        let cx = bridge.host_cx().unwrap();
        let frame = Source::new(&bridge, "Camera").get_frame(&cx).unwrap();
        assert!(frame.is_ready());
        assert_eq!(frame.width().unwrap(), 3);
        assert_eq!(frame.height().unwrap(), 2);
        assert_eq!(bridge.host().live_frames(), 1);

        frame.close().unwrap();
        assert_eq!(bridge.pending_commands(), 1);
        assert_eq!(bridge.host().live_frames(), 1);
        bridge.tick();
        assert_eq!(bridge.host().live_frames(), 0);
    }

    #[test]
    fn drop_before_capture_does_not_block() {
        init_test_logging();
        let bridge = bridge();
        let frame = Source::new(&bridge, "Camera")
            .get_frame(&Cx::detached())
            .unwrap();
        assert!(!frame.is_ready());
        drop(frame);
        assert_eq!(bridge.pending_commands(), 2);

        bridge.tick();
        assert_eq!(bridge.host().live_frames(), 0);
        assert_eq!(
            bridge.host().call_labels(),
            ["capture_frame", "release_frame"]
        );
    }

    #[test]
    fn discarded_capture_releases_nothing() {
        init_test_logging();
        let bridge = bridge();
        let frame = Source::new(&bridge, "Camera")
            .get_frame(&Cx::detached())
            .unwrap();
        bridge.reset();
        assert!(frame.data().unwrap_err().is_interrupted());
        drop(frame);
        bridge.tick();
        assert!(bridge.host().call_labels().is_empty());
    }

    #[test]
    fn capture_with_interrupted_reader_still_releases() {
        init_test_logging();
        let bridge = bridge();
        let frame = Source::new(&bridge, "Camera")
            .get_frame(&Cx::detached())
            .unwrap();
        frame.future.interrupt(CancelReason::reset()).unwrap();

        bridge.tick();
        assert_eq!(bridge.host().call_labels(), ["capture_frame"]);
        assert_eq!(bridge.host().live_frames(), 1);
        assert!(frame.data().unwrap_err().is_interrupted());

        drop(frame);
        bridge.tick();
        assert_eq!(bridge.host().live_frames(), 0);
        assert_eq!(
            bridge.host().call_labels(),
            ["capture_frame", "release_frame"]
        );
        assert!(bridge.host().errors().is_empty());
    }
}
