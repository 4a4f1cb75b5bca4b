//! Realtime channel stub.
//!
//! Callers can build, subscribe and remove channels exactly as they would
//! against a live backend, but no events are ever delivered. The registry
//! only tracks which channels are open.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::debug;
use serde::{Deserialize, Serialize};

/// Change filter as passed to `on`, e.g. table `notifications` filtered on
/// `user_id=eq.<id>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFilter {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub filter: Option<String>,
}

/// Handle returned by `channel(name)`. Equality is by handle identity.
#[derive(Debug, Clone)]
pub struct Channel {
    id: u64,
    name: String,
    bindings: Vec<(String, ChannelFilter)>,
    registry: Weak<ChannelRegistry>,
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Channel {}

impl Channel {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records the binding. The callback is dropped unused.
    pub fn on<F>(mut self, event_type: &str, filter: ChannelFilter, _callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        debug!("Channel {} bound to {event_type} on {:?}", self.name, filter.table);
        self.bindings.push((event_type.to_string(), filter));
        self
    }

    pub fn bindings(&self) -> &[(String, ChannelFilter)] {
        &self.bindings
    }

    /// Adds the channel to the open set of the client that created it.
    pub fn subscribe(self) -> Self {
        if let Some(registry) = self.registry.upgrade() {
            registry.open(&self);
        }
        self
    }
}

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    next_id: AtomicU64,
    open: Mutex<BTreeMap<u64, String>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(self: &Arc<Self>, name: &str) -> Channel {
        Channel {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            bindings: Vec::new(),
            registry: Arc::downgrade(self),
        }
    }

    fn open(&self, channel: &Channel) {
        self.lock().insert(channel.id, channel.name.clone());
        debug!("Channel {} ({}) subscribed", channel.name, channel.id);
    }

    /// Returns `false` if the channel was not open.
    pub fn remove(&self, channel: &Channel) -> bool {
        let removed = self.lock().remove(&channel.id).is_some();
        if removed {
            debug!("Channel {} ({}) removed", channel.name, channel.id);
        }
        removed
    }

    /// Names of open channels in the order they were created.
    pub fn open_channels(&self) -> Vec<String> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, String>> {
        self.open.lock().unwrap_or_else(|e| e.into_inner())
    }
}
