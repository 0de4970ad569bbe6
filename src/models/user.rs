use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sanitized user view. The read model may carry more account columns, but
/// nothing beyond id and name ever crosses this boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
}
