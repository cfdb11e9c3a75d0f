//! Shared value types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Loose reference to the record a workflow instance was started for.
///
/// The engine never assumes referential integrity with collaborator tables:
/// the referenced record may have been deleted since, in which case the
/// instance is orphaned - still visible in audit queries, no longer
/// actionable by its origin module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: Uuid,
}

impl EntityRef {
    #[must_use]
    pub fn new(entity_type: impl Into<String>, entity_id: Uuid) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_id)
    }
}
