//! Structure model - a health structure listed in the directory.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// The ownership view of a structure that gates need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub structure_id: Uuid,
    pub owner_user_id: UserId,
}

impl Structure {
    pub fn new(owner_user_id: UserId) -> Self {
        Self {
            structure_id: Uuid::new_v4(),
            owner_user_id,
        }
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_user_id == user_id
    }
}
