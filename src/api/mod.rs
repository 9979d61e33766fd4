//! Host-API facade for sources and scene items.
//!
//! The host implements [`SourceApi`]; scripts talk to it through the
//! [`Source`], [`SceneItem`] and [`Frame`] proxies, which turn every call
//! into a [`SourceCommand`] dispatched through the bridge. Queries block the
//! calling worker on a future; setters are fire-and-forget.
//!
//! ```ignore
//! let camera = Source::new(&bridge, "Camera");
//! bridge.spawn(move |cx| {
//!     camera.set(&cx, "brightness", 0.8)?;
//!     let (x, y) = camera.get_pos(&cx)?.into();
//!     Ok(())
//! })?;
//! ```

pub mod frame;
pub mod source;
pub mod value;

pub use frame::{Frame, FrameData};
pub use source::{SceneItem, Source};
pub use value::{merge_properties, Properties, Value};

use std::fmt;

use crate::dispatch::Host;
use crate::error::{Error, Result};
use crate::types::FrameId;

/// Position of a source or scene item, in canvas pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pos {
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset.
    pub y: f64,
}

impl From<(f64, f64)> for Pos {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<Pos> for (f64, f64) {
    fn from(pos: Pos) -> Self {
        (pos.x, pos.y)
    }
}

/// Crop margins in pixels. Also used as a signed delta by `adjust_crop`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Crop {
    /// Left margin.
    pub left: i32,
    /// Right margin.
    pub right: i32,
    /// Top margin.
    pub top: i32,
    /// Bottom margin.
    pub bottom: i32,
}

impl Crop {
    /// Creates crop margins.
    #[must_use]
    pub const fn new(left: i32, right: i32, top: i32, bottom: i32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    /// Adds `delta` to every margin, clamping at zero.
    #[must_use]
    pub fn adjusted(self, delta: Self) -> Self {
        Self {
            left: self.left.saturating_add(delta.left).max(0),
            right: self.right.saturating_add(delta.right).max(0),
            top: self.top.saturating_add(delta.top).max(0),
            bottom: self.bottom.saturating_add(delta.bottom).max(0),
        }
    }
}

/// Reference counters a source keeps for visibility and activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// The source is shown somewhere (preview, projector, ...).
    Showing,
    /// The source is live in program output.
    Active,
}

/// What a positional command addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// A source by name.
    Source(String),
    /// A source placed in a scene.
    SceneItem {
        /// Scene name.
        scene: String,
        /// Source name.
        source: String,
    },
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(name) => write!(f, "{name:?}"),
            Self::SceneItem { scene, source } => write!(f, "{source:?} in {scene:?}"),
        }
    }
}

/// The host API the facade needs.
///
/// Every method runs on the host thread, inside a bridge command. Unknown
/// names should fail with a descriptive error rather than panic.
pub trait SourceApi: Host {
    /// Returns the source's type identifier.
    fn source_type(&self, source: &str) -> Result<String>;

    /// Returns the source's current settings.
    fn source_properties(&self, source: &str) -> Result<Properties>;

    /// Merges `values` into the source's settings; `Null` erases a key.
    fn update_source(&self, source: &str, values: &Properties) -> Result<()>;

    /// Increments one of the source's reference counters.
    fn inc_ref(&self, source: &str, kind: RefKind) -> Result<()>;

    /// Decrements one of the source's reference counters.
    fn dec_ref(&self, source: &str, kind: RefKind) -> Result<()>;

    /// Returns the position of `target`.
    fn pos(&self, target: &Target) -> Result<Pos>;

    /// Moves `target`.
    fn set_pos(&self, target: &Target, pos: Pos) -> Result<()>;

    /// Returns the crop of `target`.
    fn crop(&self, target: &Target) -> Result<Crop>;

    /// Sets the crop of `target`.
    fn set_crop(&self, target: &Target, crop: Crop) -> Result<()>;

    /// Returns the source's audio/video sync offset in nanoseconds.
    fn sync_offset(&self, source: &str) -> Result<i64>;

    /// Sets the source's sync offset in nanoseconds.
    fn set_sync_offset(&self, source: &str, offset_ns: i64) -> Result<()>;

    /// Renders the source into a frame the caller must release.
    fn capture_frame(&self, source: &str) -> Result<FrameData>;

    /// Releases a captured frame.
    fn release_frame(&self, frame: FrameId) -> Result<()>;
}

/// One facade operation, as queued on the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceCommand {
    /// Read the source type.
    GetType {
        /// Source name.
        source: String,
    },
    /// Read the source settings.
    GetProperties {
        /// Source name.
        source: String,
    },
    /// Merge settings.
    UpdateProperties {
        /// Source name.
        source: String,
        /// Values to merge.
        values: Properties,
    },
    /// Increment a reference counter.
    IncRef {
        /// Source name.
        source: String,
        /// Which counter.
        kind: RefKind,
    },
    /// Decrement a reference counter.
    DecRef {
        /// Source name.
        source: String,
        /// Which counter.
        kind: RefKind,
    },
    /// Read a position.
    GetPos {
        /// Addressed object.
        target: Target,
    },
    /// Write a position.
    SetPos {
        /// Addressed object.
        target: Target,
        /// New position.
        pos: Pos,
    },
    /// Read crop margins.
    GetCrop {
        /// Addressed object.
        target: Target,
    },
    /// Write crop margins.
    SetCrop {
        /// Addressed object.
        target: Target,
        /// New margins.
        crop: Crop,
    },
    /// Read-modify-write crop margins in one host step.
    AdjustCrop {
        /// Addressed object.
        target: Target,
        /// Signed change per margin.
        delta: Crop,
    },
    /// Read the sync offset.
    GetSyncOffset {
        /// Source name.
        source: String,
    },
    /// Write the sync offset.
    SetSyncOffset {
        /// Source name.
        source: String,
        /// Offset in nanoseconds.
        offset_ns: i64,
    },
    /// Render a frame.
    CaptureFrame {
        /// Source name.
        source: String,
    },
    /// Release a frame.
    ReleaseFrame {
        /// Frame to release.
        frame: FrameId,
    },
}

impl SourceCommand {
    /// Static label used for logs and error reports.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::GetType { .. } => "source_get_type",
            Self::GetProperties { .. } => "source_get_properties",
            Self::UpdateProperties { .. } => "source_update_properties",
            Self::IncRef {
                kind: RefKind::Showing,
                ..
            } => "source_inc_showing",
            Self::IncRef {
                kind: RefKind::Active,
                ..
            } => "source_inc_active",
            Self::DecRef {
                kind: RefKind::Showing,
                ..
            } => "source_dec_showing",
            Self::DecRef {
                kind: RefKind::Active,
                ..
            } => "source_dec_active",
            Self::GetPos { .. } => "get_pos",
            Self::SetPos { .. } => "set_pos",
            Self::GetCrop { .. } => "get_crop",
            Self::SetCrop { .. } => "set_crop",
            Self::AdjustCrop { .. } => "adjust_crop",
            Self::GetSyncOffset { .. } => "source_get_sync_offset",
            Self::SetSyncOffset { .. } => "source_set_sync_offset",
            Self::CaptureFrame { .. } => "source_capture_frame",
            Self::ReleaseFrame { .. } => "release_frame",
        }
    }

    /// Runs the command against the host API.
    pub fn apply<A: SourceApi + ?Sized>(self, api: &A) -> Result<Reply> {
        match self {
            Self::GetType { source } => api.source_type(&source).map(Reply::Text),
            Self::GetProperties { source } => {
                api.source_properties(&source).map(Reply::Properties)
            }
            Self::UpdateProperties { source, values } => {
                api.update_source(&source, &values).map(|()| Reply::Unit)
            }
            Self::IncRef { source, kind } => api.inc_ref(&source, kind).map(|()| Reply::Unit),
            Self::DecRef { source, kind } => api.dec_ref(&source, kind).map(|()| Reply::Unit),
            Self::GetPos { target } => api.pos(&target).map(Reply::Pos),
            Self::SetPos { target, pos } => api.set_pos(&target, pos).map(|()| Reply::Unit),
            Self::GetCrop { target } => api.crop(&target).map(Reply::Crop),
            Self::SetCrop { target, crop } => api.set_crop(&target, crop).map(|()| Reply::Unit),
            Self::AdjustCrop { target, delta } => {
                let crop = api.crop(&target)?.adjusted(delta);
                api.set_crop(&target, crop)?;
                Ok(Reply::Crop(crop))
            }
            Self::GetSyncOffset { source } => api.sync_offset(&source).map(Reply::SyncOffset),
            Self::SetSyncOffset { source, offset_ns } => api
                .set_sync_offset(&source, offset_ns)
                .map(|()| Reply::Unit),
            Self::CaptureFrame { source } => api.capture_frame(&source).map(Reply::Frame),
            Self::ReleaseFrame { frame } => api.release_frame(frame).map(|()| Reply::Unit),
        }
    }
}

/// The value a [`SourceCommand`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// No value.
    Unit,
    /// A string (source type).
    Text(String),
    /// Settings.
    Properties(Properties),
    /// A position.
    Pos(Pos),
    /// Crop margins.
    Crop(Crop),
    /// A sync offset in nanoseconds.
    SyncOffset(i64),
    /// A captured frame.
    Frame(FrameData),
}

impl Reply {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Text(_) => "text",
            Self::Properties(_) => "properties",
            Self::Pos(_) => "pos",
            Self::Crop(_) => "crop",
            Self::SyncOffset(_) => "sync offset",
            Self::Frame(_) => "frame",
        }
    }

    fn mismatch(self, expected: &str) -> Error {
        Error::internal(format!("expected {expected} reply, got {}", self.kind()))
    }

    /// Extracts a text reply.
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(v) => Ok(v),
            other => Err(other.mismatch("text")),
        }
    }

    /// Extracts a properties reply.
    pub fn into_properties(self) -> Result<Properties> {
        match self {
            Self::Properties(v) => Ok(v),
            other => Err(other.mismatch("properties")),
        }
    }

    /// Extracts a position reply.
    pub fn into_pos(self) -> Result<Pos> {
        match self {
            Self::Pos(v) => Ok(v),
            other => Err(other.mismatch("pos")),
        }
    }

    /// Extracts a crop reply.
    pub fn into_crop(self) -> Result<Crop> {
        match self {
            Self::Crop(v) => Ok(v),
            other => Err(other.mismatch("crop")),
        }
    }

    /// Extracts a sync offset reply.
    pub fn into_sync_offset(self) -> Result<i64> {
        match self {
            Self::SyncOffset(v) => Ok(v),
            other => Err(other.mismatch("sync offset")),
        }
    }

    /// Extracts a frame reply.
    pub fn into_frame(self) -> Result<FrameData> {
        match self {
            Self::Frame(v) => Ok(v),
            other => Err(other.mismatch("frame")),
        }
    }
}
