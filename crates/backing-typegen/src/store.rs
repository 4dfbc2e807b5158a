//! Per-schema typegen configuration, keyed by schema identity.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::config::TypegenConfig;
use crate::error::TypegenError;
use crate::schema::{Schema, SchemaId};

/// Holds the [`TypegenConfig`] attached to each finalized schema.
///
/// A config is attached once and is immutable afterwards.
#[derive(Debug, Default)]
pub struct SchemaMetadataStore {
    configs: DashMap<SchemaId, Arc<TypegenConfig>>,
}

impl SchemaMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `config` to `schema`.
    ///
    /// # Errors
    ///
    /// Fails if the schema already has a config.
    pub fn attach(
        &self,
        schema: &Schema,
        config: TypegenConfig,
    ) -> Result<Arc<TypegenConfig>, TypegenError> {
        match self.configs.entry(schema.id()) {
            Entry::Occupied(_) => Err(TypegenError::AlreadyAttached(schema.id())),
            Entry::Vacant(vacant) => {
                let config = Arc::new(config);
                vacant.insert(Arc::clone(&config));
                debug!(schema = %schema.id(), sources = config.sources.len(), "Attached typegen config");
                Ok(config)
            }
        }
    }

    pub fn get(&self, id: SchemaId) -> Option<Arc<TypegenConfig>> {
        self.configs.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove the config of a schema that is no longer in use.
    pub fn detach(&self, id: SchemaId) -> Option<Arc<TypegenConfig>> {
        self.configs.remove(&id).map(|(_, config)| config)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}
