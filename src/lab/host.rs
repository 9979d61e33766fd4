//! In-memory host.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;

use crate::api::{merge_properties, Crop, FrameData, Pos, Properties, RefKind, SourceApi, Target};
use crate::dispatch::Host;
use crate::error::{Error, Result};
use crate::tracing_compat::warn;
use crate::types::FrameId;

/// One recorded host API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCall {
    /// The API method or label recorded.
    pub label: String,
    /// The thread the call ran on.
    pub thread: ThreadId,
}

#[derive(Debug, Clone)]
struct SimSource {
    kind: String,
    properties: Properties,
    showing: u32,
    active: u32,
    sync_offset: i64,
    pos: Pos,
    crop: Crop,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone, Default)]
struct SimItem {
    pos: Pos,
    crop: Crop,
}

#[derive(Debug, Default)]
struct SimState {
    tick_interval: Option<Duration>,
    registrations: usize,
    unregistrations: usize,
    errors: Vec<String>,
    calls: Vec<HostCall>,
    sources: BTreeMap<String, SimSource>,
    items: BTreeMap<(String, String), SimItem>,
    frames: BTreeSet<FrameId>,
}

impl SimState {
    fn source(&mut self, name: &str) -> Result<&mut SimSource> {
        self.sources
            .get_mut(name)
            .ok_or_else(|| Error::user(format!("no source named {name:?}")))
    }

    fn item(&mut self, scene: &str, source: &str) -> Result<&mut SimItem> {
        self.items
            .get_mut(&(scene.to_string(), source.to_string()))
            .ok_or_else(|| Error::user(format!("no item {source:?} in scene {scene:?}")))
    }

    fn placement(&mut self, target: &Target) -> Result<(&mut Pos, &mut Crop)> {
        match target {
            Target::Source(name) => {
                let source = self.source(name)?;
                Ok((&mut source.pos, &mut source.crop))
            }
            Target::SceneItem { scene, source } => {
                let item = self.item(scene, source)?;
                Ok((&mut item.pos, &mut item.crop))
            }
        }
    }
}

/// An in-memory host.
///
/// Sources and scene items are declared up front with
/// [`SimHost::with_source`] and [`SimHost::with_scene_item`]. Unknown names
/// fail the command the way a real host lookup would.
#[derive(Debug, Default)]
pub struct SimHost {
    state: Mutex<SimState>,
}

impl SimHost {
    /// Creates a host with no sources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source of type `kind` whose frames are `width` x `height`.
    #[must_use]
    pub fn with_source(self, name: &str, kind: &str, width: u32, height: u32) -> Self {
        self.state.lock().sources.insert(
            name.to_string(),
            SimSource {
                kind: kind.to_string(),
                properties: Properties::new(),
                showing: 0,
                active: 0,
                sync_offset: 0,
                pos: Pos::default(),
                crop: Crop::default(),
                width,
                height,
            },
        );
        self
    }

    /// Places `source` in `scene`.
    #[must_use]
    pub fn with_scene_item(self, scene: &str, source: &str) -> Self {
        self.state
            .lock()
            .items
            .insert((scene.to_string(), source.to_string()), SimItem::default());
        self
    }

    /// Wraps the host for sharing with the test body.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Records a call made by a test command.
    pub fn record(&self, label: &str) {
        self.state.lock().calls.push(HostCall {
            label: label.to_string(),
            thread: thread::current().id(),
        });
    }

    /// Returns every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.state.lock().calls.clone()
    }

    /// Returns the labels of every recorded call, in order.
    #[must_use]
    pub fn call_labels(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .map(|c| c.label.clone())
            .collect()
    }

    /// Returns every error reported through [`Host::report_error`].
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.state.lock().errors.clone()
    }

    /// Number of `register_tick` calls.
    #[must_use]
    pub fn registrations(&self) -> usize {
        self.state.lock().registrations
    }

    /// Number of `unregister_tick` calls.
    #[must_use]
    pub fn unregistrations(&self) -> usize {
        self.state.lock().unregistrations
    }

    /// Returns true while a tick is registered.
    #[must_use]
    pub fn is_tick_registered(&self) -> bool {
        self.state.lock().tick_interval.is_some()
    }

    /// The registered tick interval.
    #[must_use]
    pub fn tick_interval(&self) -> Option<Duration> {
        self.state.lock().tick_interval
    }

    /// Returns a source's reference counter.
    #[must_use]
    pub fn ref_count(&self, source: &str, kind: RefKind) -> Option<u32> {
        let state = self.state.lock();
        let source = state.sources.get(source)?;
        Some(match kind {
            RefKind::Showing => source.showing,
            RefKind::Active => source.active,
        })
    }

    /// Returns a copy of a source's settings.
    #[must_use]
    pub fn properties_of(&self, source: &str) -> Option<Properties> {
        self.state
            .lock()
            .sources
            .get(source)
            .map(|s| s.properties.clone())
    }

    /// Number of captured frames not yet released.
    #[must_use]
    pub fn live_frames(&self) -> usize {
        self.state.lock().frames.len()
    }

    fn call(&self, label: &str) -> parking_lot::MutexGuard<'_, SimState> {
        let mut state = self.state.lock();
        state.calls.push(HostCall {
            label: label.to_string(),
            thread: thread::current().id(),
        });
        state
    }
}

impl Host for SimHost {
    fn register_tick(&self, interval: Duration) {
        let mut state = self.state.lock();
        state.registrations += 1;
        state.tick_interval = Some(interval);
    }

    fn unregister_tick(&self) {
        let mut state = self.state.lock();
        state.unregistrations += 1;
        state.tick_interval = None;
    }

    fn report_error(&self, label: &str, err: &Error) {
        warn!(label, error = %err, "simulated host received error report");
        self.state.lock().errors.push(format!("{label}: {err}"));
    }
}

impl SourceApi for SimHost {
    fn source_type(&self, source: &str) -> Result<String> {
        Ok(self.call("source_type").source(source)?.kind.clone())
    }

    fn source_properties(&self, source: &str) -> Result<Properties> {
        Ok(self
            .call("source_properties")
            .source(source)?
            .properties
            .clone())
    }

    fn update_source(&self, source: &str, values: &Properties) -> Result<()> {
        let mut state = self.call("update_source");
        merge_properties(&mut state.source(source)?.properties, values);
        Ok(())
    }

    fn inc_ref(&self, source: &str, kind: RefKind) -> Result<()> {
        let mut state = self.call("inc_ref");
        let source = state.source(source)?;
        match kind {
            RefKind::Showing => source.showing += 1,
            RefKind::Active => source.active += 1,
        }
        Ok(())
    }

    fn dec_ref(&self, source: &str, kind: RefKind) -> Result<()> {
        let mut state = self.call("dec_ref");
        let name = source;
        let source = state.source(name)?;
        let counter = match kind {
            RefKind::Showing => &mut source.showing,
            RefKind::Active => &mut source.active,
        };
        *counter = counter
            .checked_sub(1)
            .ok_or_else(|| Error::user(format!("{kind:?} count of {name:?} is already zero")))?;
        Ok(())
    }

    fn pos(&self, target: &Target) -> Result<Pos> {
        let mut state = self.call("pos");
        let (pos, _) = state.placement(target)?;
        Ok(*pos)
    }

    fn set_pos(&self, target: &Target, new_pos: Pos) -> Result<()> {
        let mut state = self.call("set_pos");
        let (pos, _) = state.placement(target)?;
        *pos = new_pos;
        Ok(())
    }

    fn crop(&self, target: &Target) -> Result<Crop> {
        let mut state = self.call("crop");
        let (_, crop) = state.placement(target)?;
        Ok(*crop)
    }

    fn set_crop(&self, target: &Target, new_crop: Crop) -> Result<()> {
        let mut state = self.call("set_crop");
        let (_, crop) = state.placement(target)?;
        *crop = new_crop;
        Ok(())
    }

    fn sync_offset(&self, source: &str) -> Result<i64> {
        Ok(self.call("sync_offset").source(source)?.sync_offset)
    }

    fn set_sync_offset(&self, source: &str, offset_ns: i64) -> Result<()> {
        self.call("set_sync_offset").source(source)?.sync_offset = offset_ns;
        Ok(())
    }

    fn capture_frame(&self, source: &str) -> Result<FrameData> {
        let mut state = self.call("capture_frame");
        let (width, height) = {
            let source = state.source(source)?;
            (source.width, source.height)
        };
        let depth = 4_u32;
        let len = width as usize * height as usize * depth as usize;
        let pixels: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let id = FrameId::next();
        state.frames.insert(id);
        Ok(FrameData {
            id,
            width,
            height,
            depth,
            pixels: pixels.into(),
        })
    }

    fn release_frame(&self, frame: FrameId) -> Result<()> {
        let mut state = self.call("release_frame");
        if state.frames.remove(&frame) {
            Ok(())
        } else {
            Err(Error::user(format!("{frame} is not a live frame")))
        }
    }
}
