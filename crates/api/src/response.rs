//! Shared response envelope types for API handlers.
//!
//! All API responses use a `{ "data": ... }` envelope. Use [`DataResponse`]
//! instead of ad-hoc `serde_json::json!({ "data": ... })`.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: items }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Result of an edit that may have removed the entity entirely.
///
/// Serialises as the entity itself, or as `{ "deleted": true, "id": .. }`
/// when the last item of an invoice went away.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MaybeDeleted<T: Serialize> {
    Kept(T),
    Deleted { deleted: bool, id: roomkeep_core::types::DbId },
}

impl<T: Serialize> MaybeDeleted<T> {
    pub fn deleted(id: roomkeep_core::types::DbId) -> Self {
        MaybeDeleted::Deleted { deleted: true, id }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, MaybeDeleted::Deleted { .. })
    }
}
