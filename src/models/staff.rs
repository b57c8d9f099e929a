use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::StaffRole;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffAccount {
    pub id: Uuid,
    pub display_name: String,
    pub role: StaffRole,
    pub practitioner_id: Option<Uuid>,
    pub is_active: bool,
}
