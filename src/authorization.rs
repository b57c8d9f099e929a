//! Role-based access control for staff accounts.
//!
//! Default-deny: an action is allowed only when the role's row in
//! [`is_permitted`] lists it. Admin is allowed everything.
//!
//! | Role         | Schedule | Status | Beds | Admissions | Notes | Prescribe | Dispense | Stock |
//! |--------------|----------|--------|------|------------|-------|-----------|----------|-------|
//! | Doctor       | rw       | ✓      | r    | ✓          | ✓     | ✓         |          | r     |
//! | Nurse        | r        | ✓      | rw   | ✓          | ✓     |           |          | r     |
//! | Receptionist | rw       | ✓      | r    |            |       |           |          |       |
//! | Pharmacist   |          |        |      |            |       |           | ✓        | rw    |

use serde::{Deserialize, Serialize};

use crate::models::enums::StaffRole;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Operations guarded at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewSchedule,
    ManageAppointments,
    UpdateAppointmentStatus,
    ViewBeds,
    ManageBeds,
    ViewAdmissions,
    ManageAdmissions,
    RecordNursingNotes,
    Prescribe,
    ViewPharmacy,
    Dispense,
    ManageInventory,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewSchedule => "view_schedule",
            Self::ManageAppointments => "manage_appointments",
            Self::UpdateAppointmentStatus => "update_appointment_status",
            Self::ViewBeds => "view_beds",
            Self::ManageBeds => "manage_beds",
            Self::ViewAdmissions => "view_admissions",
            Self::ManageAdmissions => "manage_admissions",
            Self::RecordNursingNotes => "record_nursing_notes",
            Self::Prescribe => "prescribe",
            Self::ViewPharmacy => "view_pharmacy",
            Self::Dispense => "dispense",
            Self::ManageInventory => "manage_inventory",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("Role {role} may not {action}")]
    Forbidden { role: StaffRole, action: Action },
}

// ═══════════════════════════════════════════════════════════
// Authorization check
// ═══════════════════════════════════════════════════════════

pub fn is_permitted(role: StaffRole, action: Action) -> bool {
    use Action::*;

    match role {
        StaffRole::Admin => true,
        StaffRole::Doctor => matches!(
            action,
            ViewSchedule
                | ManageAppointments
                | UpdateAppointmentStatus
                | ViewBeds
                | ViewAdmissions
                | ManageAdmissions
                | RecordNursingNotes
                | Prescribe
                | ViewPharmacy
        ),
        StaffRole::Nurse => matches!(
            action,
            ViewSchedule
                | UpdateAppointmentStatus
                | ViewBeds
                | ManageBeds
                | ViewAdmissions
                | ManageAdmissions
                | RecordNursingNotes
                | ViewPharmacy
        ),
        StaffRole::Receptionist => matches!(
            action,
            ViewSchedule | ManageAppointments | UpdateAppointmentStatus | ViewBeds
        ),
        StaffRole::Pharmacist => matches!(action, ViewPharmacy | Dispense | ManageInventory),
    }
}

/// Check a role against an action, logging denials.
pub fn authorize(role: StaffRole, action: Action) -> Result<(), AuthorizationError> {
    if is_permitted(role, action) {
        return Ok(());
    }
    tracing::warn!(role = %role, action = %action, "Access denied");
    Err(AuthorizationError::Forbidden { role, action })
}
