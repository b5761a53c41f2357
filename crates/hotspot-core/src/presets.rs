//! Named configuration snapshots.
//!
//! A preset is written once and never edited; to change one, save a new one
//! and delete the old.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::Result;
use crate::types::AccessPointConfiguration;

/// An immutable, named access point configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Preset {
    /// Opaque identifier.
    pub id: Uuid,

    /// User-supplied name.
    #[schema(example = "Travel")]
    pub name: String,

    /// When the preset was saved (UTC).
    pub created_at: DateTime<Utc>,

    /// The saved configuration.
    pub configuration: AccessPointConfiguration,
}

impl Preset {
    /// Snapshot `configuration` under `name`, stamped with the current time.
    pub fn new(name: impl Into<String>, configuration: AccessPointConfiguration) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            created_at: Utc::now(),
            configuration,
        }
    }
}

/// Persistence for presets.
#[async_trait]
pub trait PresetStore: Send + Sync {
    /// Store a new preset.
    async fn insert(&self, preset: Preset) -> Result<()>;

    /// Remove a preset. Fails with `PresetNotFound` if it doesn't exist.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// All presets, most recently created first.
    async fn list(&self) -> Result<Vec<Preset>>;
}

/// Sort presets most recent first, in place.
pub fn sort_by_recency(presets: &mut [Preset]) {
    presets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_preset_gets_unique_id() {
        let a = Preset::new("a", AccessPointConfiguration::default());
        let b = Preset::new("a", AccessPointConfiguration::default());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_sort_by_recency() {
        let mut old = Preset::new("old", AccessPointConfiguration::default());
        old.created_at -= Duration::hours(1);
        let new = Preset::new("new", AccessPointConfiguration::default());

        let mut presets = vec![old, new];
        sort_by_recency(&mut presets);
        assert_eq!(presets[0].name, "new");
        assert_eq!(presets[1].name, "old");
    }
}
