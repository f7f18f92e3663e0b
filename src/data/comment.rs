//! Comments left on a lead's activity feed

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub lead_id: String,
    pub content: String,
    pub author: String,
    pub created_at: String,
}
