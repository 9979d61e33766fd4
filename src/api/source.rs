//! Source and scene item proxies.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::api::frame::Frame;
use crate::api::{Crop, Pos, Properties, RefKind, Reply, SourceApi, SourceCommand, Target, Value};
use crate::cx::Cx;
use crate::dispatch::Bridge;
use crate::error::Result;
use crate::future::Future;

/// Queues `command` and returns the future for its reply.
fn request<H: SourceApi>(
    bridge: &Bridge<H>,
    cx: &Cx,
    command: SourceCommand,
) -> Result<Future<Reply>> {
    let label = command.label();
    bridge.schedule(cx, label, move |host: &H| command.apply(host))
}

/// Queues `command` and waits for its reply.
fn query<H: SourceApi>(bridge: &Bridge<H>, cx: &Cx, command: SourceCommand) -> Result<Reply> {
    request(bridge, cx, command)?.result_in(cx)
}

/// Queues `command` without waiting.
fn send<H: SourceApi>(bridge: &Bridge<H>, cx: &Cx, command: SourceCommand) -> Result<()> {
    let label = command.label();
    bridge.post(cx, label, move |host: &H| command.apply(host))
}

/// A host source, addressed by name.
///
/// Queries block until the host thread answers; setters return as soon as
/// the command is queued. Commands from one thread reach the host in the
/// order they were issued.
pub struct Source<H: SourceApi> {
    bridge: Bridge<H>,
    name: String,
}

impl<H: SourceApi> Source<H> {
    /// Creates a proxy for the source called `name`.
    ///
    /// The name is not checked until the first command runs.
    #[must_use]
    pub fn new(bridge: &Bridge<H>, name: impl Into<String>) -> Self {
        Self {
            bridge: bridge.clone(),
            name: name.into(),
        }
    }

    /// Returns the source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> Target {
        Target::Source(self.name.clone())
    }

    /// Returns the source type identifier.
    pub fn get_type(&self, cx: &Cx) -> Result<String> {
        query(
            &self.bridge,
            cx,
            SourceCommand::GetType {
                source: self.name.clone(),
            },
        )?
        .into_text()
    }

    /// Returns all current settings.
    pub fn properties(&self, cx: &Cx) -> Result<Properties> {
        query(
            &self.bridge,
            cx,
            SourceCommand::GetProperties {
                source: self.name.clone(),
            },
        )?
        .into_properties()
    }

    /// Returns one setting, or `None` if it is not set.
    pub fn get(&self, cx: &Cx, key: &str) -> Result<Option<Value>> {
        Ok(self.properties(cx)?.remove(key))
    }

    /// Sets one setting. `Value::Null` erases it.
    pub fn set(&self, cx: &Cx, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let mut values = Properties::new();
        values.insert(key.into(), value.into());
        self.update(cx, values)
    }

    /// Merges several settings in one host update.
    pub fn update<K, V, I>(&self, cx: &Cx, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let values: Properties = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        send(
            &self.bridge,
            cx,
            SourceCommand::UpdateProperties {
                source: self.name.clone(),
                values,
            },
        )
    }

    /// Increments the showing counter.
    pub fn inc_showing(&self, cx: &Cx) -> Result<()> {
        self.adjust_ref(cx, RefKind::Showing, true)
    }

    /// Decrements the showing counter.
    pub fn dec_showing(&self, cx: &Cx) -> Result<()> {
        self.adjust_ref(cx, RefKind::Showing, false)
    }

    /// Increments the active counter.
    pub fn inc_active(&self, cx: &Cx) -> Result<()> {
        self.adjust_ref(cx, RefKind::Active, true)
    }

    /// Decrements the active counter.
    pub fn dec_active(&self, cx: &Cx) -> Result<()> {
        self.adjust_ref(cx, RefKind::Active, false)
    }

    fn adjust_ref(&self, cx: &Cx, kind: RefKind, increment: bool) -> Result<()> {
        let source = self.name.clone();
        let command = if increment {
            SourceCommand::IncRef { source, kind }
        } else {
            SourceCommand::DecRef { source, kind }
        };
        send(&self.bridge, cx, command)
    }

    /// Returns the source position.
    pub fn get_pos(&self, cx: &Cx) -> Result<Pos> {
        query(&self.bridge, cx, SourceCommand::GetPos { target: self.target() })?.into_pos()
    }

    /// Moves the source.
    pub fn set_pos(&self, cx: &Cx, x: f64, y: f64) -> Result<()> {
        send(
            &self.bridge,
            cx,
            SourceCommand::SetPos {
                target: self.target(),
                pos: Pos { x, y },
            },
        )
    }

    /// Returns the crop margins.
    pub fn get_crop(&self, cx: &Cx) -> Result<Crop> {
        query(&self.bridge, cx, SourceCommand::GetCrop { target: self.target() })?.into_crop()
    }

    /// Sets the crop margins.
    pub fn set_crop(&self, cx: &Cx, crop: Crop) -> Result<()> {
        send(
            &self.bridge,
            cx,
            SourceCommand::SetCrop {
                target: self.target(),
                crop,
            },
        )
    }

    /// Changes each crop margin by a signed delta.
    ///
    /// The read and the write happen in one host command, so concurrent
    /// adjustments never lose an update.
    pub fn adjust_crop(&self, cx: &Cx, delta: Crop) -> Result<()> {
        send(
            &self.bridge,
            cx,
            SourceCommand::AdjustCrop {
                target: self.target(),
                delta,
            },
        )
    }

    /// Returns the sync offset in nanoseconds.
    pub fn get_sync_offset(&self, cx: &Cx) -> Result<i64> {
        query(
            &self.bridge,
            cx,
            SourceCommand::GetSyncOffset {
                source: self.name.clone(),
            },
        )?
        .into_sync_offset()
    }

    /// Sets the sync offset in nanoseconds.
    pub fn set_sync_offset(&self, cx: &Cx, offset_ns: i64) -> Result<()> {
        send(
            &self.bridge,
            cx,
            SourceCommand::SetSyncOffset {
                source: self.name.clone(),
                offset_ns,
            },
        )
    }

    /// Requests a frame capture.
    ///
    /// Returns without waiting; the frame's accessors block until the
    /// capture has run.
    pub fn get_frame(&self, cx: &Cx) -> Result<Frame<H>> {
        Frame::capture(&self.bridge, cx, self.name.clone())
    }
}

impl<H: SourceApi> Clone for Source<H> {
    fn clone(&self) -> Self {
        Self {
            bridge: self.bridge.clone(),
            name: self.name.clone(),
        }
    }
}

impl<H: SourceApi> PartialEq for Source<H> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<H: SourceApi> Eq for Source<H> {}

impl<H: SourceApi> Hash for Source<H> {
    fn hash<S: Hasher>(&self, state: &mut S) {
        self.name.hash(state);
    }
}

impl<H: SourceApi> fmt::Debug for Source<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source").field("name", &self.name).finish()
    }
}

/// A source placed in a scene.
pub struct SceneItem<H: SourceApi> {
    scene: String,
    source: Source<H>,
}

impl<H: SourceApi> SceneItem<H> {
    /// Creates a proxy for `source` in `scene`.
    #[must_use]
    pub fn new(bridge: &Bridge<H>, scene: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            scene: scene.into(),
            source: Source::new(bridge, source),
        }
    }

    /// Returns the scene name.
    #[must_use]
    pub fn scene(&self) -> &str {
        &self.scene
    }

    /// Returns the source proxy.
    #[must_use]
    pub fn source(&self) -> &Source<H> {
        &self.source
    }

    fn target(&self) -> Target {
        Target::SceneItem {
            scene: self.scene.clone(),
            source: self.source.name.clone(),
        }
    }

    /// Returns the item position within the scene.
    pub fn get_pos(&self, cx: &Cx) -> Result<Pos> {
        query(&self.source.bridge, cx, SourceCommand::GetPos { target: self.target() })?
            .into_pos()
    }

    /// Moves the item within the scene.
    pub fn set_pos(&self, cx: &Cx, x: f64, y: f64) -> Result<()> {
        send(
            &self.source.bridge,
            cx,
            SourceCommand::SetPos {
                target: self.target(),
                pos: Pos { x, y },
            },
        )
    }

    /// Returns the item crop.
    pub fn get_crop(&self, cx: &Cx) -> Result<Crop> {
        query(&self.source.bridge, cx, SourceCommand::GetCrop { target: self.target() })?
            .into_crop()
    }

    /// Sets the item crop.
    pub fn set_crop(&self, cx: &Cx, crop: Crop) -> Result<()> {
        send(
            &self.source.bridge,
            cx,
            SourceCommand::SetCrop {
                target: self.target(),
                crop,
            },
        )
    }
}

impl<H: SourceApi> Clone for SceneItem<H> {
    fn clone(&self) -> Self {
        Self {
            scene: self.scene.clone(),
            source: self.source.clone(),
        }
    }
}

impl<H: SourceApi> PartialEq for SceneItem<H> {
    fn eq(&self, other: &Self) -> bool {
        self.scene == other.scene && self.source == other.source
    }
}

impl<H: SourceApi> Eq for SceneItem<H> {}

impl<H: SourceApi> Hash for SceneItem<H> {
    fn hash<S: Hasher>(&self, state: &mut S) {
        self.scene.hash(state);
        self.source.hash(state);
    }
}

impl<H: SourceApi> fmt::Display for SceneItem<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} in {:?}", self.source.name, self.scene)
    }
}

impl<H: SourceApi> fmt::Debug for SceneItem<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneItem")
            .field("scene", &self.scene)
            .field("source", &self.source.name)
            .finish()
    }
}
