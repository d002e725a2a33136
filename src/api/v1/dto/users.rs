/*
 * Responsibility
 * - Users request DTO
 * - validate() for shape checks before calling the user directory
 */
use serde::Deserialize;

const MAX_BATCH: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUsersRequest {
    pub user_ids: Vec<String>,
}

impl BatchUsersRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.user_ids.is_empty() {
            return Err("userIds is required");
        }
        if self.user_ids.len() > MAX_BATCH {
            return Err("userIds must contain at most 100 ids");
        }
        if self.user_ids.iter().any(|id| id.trim().is_empty()) {
            return Err("userIds must not contain blank ids");
        }
        Ok(())
    }
}
