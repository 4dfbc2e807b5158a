//! AutoConfig: matching schema type names against exports of configured sources.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashSet;
use tracing::{debug, warn};

use crate::aliases::module_key;
use crate::config::SourceConfig;
use crate::introspect::ExportCache;

/// A source export whose name equals a schema type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoConfigMatch {
    pub alias: String,
    pub exported_name: String,
}

/// Searches sources in declared order for an export named like a schema type.
///
/// Matching is exact and case-sensitive. Unreadable sources count as "no
/// match"; each one is warned about once and then skipped.
#[derive(Debug)]
pub struct AutoConfigResolver {
    cache: Arc<ExportCache>,
    unreadable: DashSet<PathBuf>,
}

impl AutoConfigResolver {
    pub fn new(cache: Arc<ExportCache>) -> Self {
        Self {
            cache,
            unreadable: DashSet::new(),
        }
    }

    /// Introspect all sources concurrently so later lookups hit the cache.
    pub async fn prefetch(&self, sources: &[SourceConfig]) {
        self.cache
            .prefetch(sources.iter().map(|s| s.module_path.as_path()))
            .await;
    }

    /// The first source exporting `type_name`, if any.
    pub async fn find_match(
        &self,
        type_name: &str,
        sources: &[SourceConfig],
    ) -> Option<AutoConfigMatch> {
        for source in sources {
            let key = module_key(&source.module_path);
            if self.unreadable.contains(&key) {
                continue;
            }
            match self.cache.exports(&source.module_path).await {
                Ok(exports) if exports.contains(type_name) => {
                    debug!(type_name, alias = %source.alias, "AutoConfig match");
                    return Some(AutoConfigMatch {
                        alias: source.alias.clone(),
                        exported_name: type_name.to_string(),
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        alias = %source.alias,
                        error = %e,
                        "AutoConfig source is unreadable, treating it as exporting nothing"
                    );
                    self.unreadable.insert(key);
                }
            }
        }
        None
    }
}
