use std::sync::Arc;

use log::info;

use crate::auth::{Auth, ListenerRegistry};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::local_db_state::AppDbState;
use crate::query::{QueryRequest, QueryResponse, TableQuery};
use crate::realtime::{Channel, ChannelRegistry};
use crate::storage::{KeyValueStore, MemoryStore, StorageKeys};

/// The local stand-in for a hosted data/auth client.
///
/// Construct one per application instance and pass it by reference. All
/// state lives in the store `S`; listeners and channels live in the client.
pub struct LocalClient<S: KeyValueStore> {
    store: S,
    keys: StorageKeys,
    listeners: Arc<ListenerRegistry>,
    channels: Arc<ChannelRegistry>,
}

pub type MemoryClient = LocalClient<MemoryStore>;
pub type LmdbClient = LocalClient<AppDbState>;

impl<S: KeyValueStore> LocalClient<S> {
    pub fn new(store: S) -> Self {
        Self::with_keys(store, StorageKeys::default())
    }

    pub fn with_keys(store: S, keys: StorageKeys) -> Self {
        Self {
            store,
            keys,
            listeners: Arc::new(ListenerRegistry::new()),
            channels: Arc::new(ChannelRegistry::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn auth(&self) -> Auth<'_, S> {
        Auth::new(&self.store, &self.keys, &self.listeners)
    }

    pub fn from(&self, table: impl AsRef<str>) -> TableQuery<'_, S> {
        let table = table.as_ref();
        TableQuery::new(&self.store, self.keys.table(table), table)
    }

    /// Runs a query described as data.
    pub fn run(&self, request: QueryRequest) -> Result<QueryResponse> {
        let query = self.from(&request.table);
        request.apply(query)
    }

    /// Removes an auth listener by subscription id.
    pub fn unsubscribe(&self, subscription_id: u64) -> bool {
        self.listeners.unsubscribe(subscription_id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn channel(&self, name: &str) -> Channel {
        self.channels.channel(name)
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    pub fn remove_channel(&self, channel: &Channel) -> bool {
        self.channels.remove(channel)
    }

    pub fn open_channels(&self) -> Vec<String> {
        self.channels.open_channels()
    }
}

impl MemoryClient {
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl LmdbClient {
    /// Opens (or creates) the LMDB environment described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let state = AppDbState::init(config)?;
        info!("Local client ready with key prefix {}", config.key_prefix);
        Ok(Self::with_keys(state, StorageKeys::new(config.key_prefix.clone())))
    }
}
