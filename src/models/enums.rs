use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Confirmed => "confirmed",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
    NoShow => "no_show",
});

impl AppointmentStatus {
    /// No further transitions or edits are accepted from these states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    /// Whether an appointment in this state holds its time slot.
    pub fn blocks_slot(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::NoShow)
    }
}

str_enum!(AppointmentType {
    Consultation => "consultation",
    FollowUp => "follow_up",
    Emergency => "emergency",
    Checkup => "checkup",
});

str_enum!(BedType {
    Standard => "standard",
    Icu => "icu",
    Isolation => "isolation",
    Vip => "vip",
});

str_enum!(BedStatus {
    Available => "available",
    Occupied => "occupied",
    Maintenance => "maintenance",
    Reserved => "reserved",
});

str_enum!(AdmissionStatus {
    Admitted => "admitted",
    Discharged => "discharged",
    Transferred => "transferred",
});

str_enum!(PrescriptionStatus {
    Pending => "pending",
    Dispensed => "dispensed",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(StaffRole {
    Admin => "admin",
    Doctor => "doctor",
    Nurse => "nurse",
    Receptionist => "receptionist",
    Pharmacist => "pharmacist",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn appointment_status_round_trip() {
        for (variant, s) in [
            (AppointmentStatus::Scheduled, "scheduled"),
            (AppointmentStatus::Confirmed, "confirmed"),
            (AppointmentStatus::InProgress, "in_progress"),
            (AppointmentStatus::Completed, "completed"),
            (AppointmentStatus::Cancelled, "cancelled"),
            (AppointmentStatus::NoShow, "no_show"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(AppointmentStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(AppointmentStatus::NoShow.is_terminal());
        assert!(!AppointmentStatus::InProgress.is_terminal());
    }

    #[test]
    fn cancelled_and_no_show_release_slot() {
        assert!(!AppointmentStatus::Cancelled.blocks_slot());
        assert!(!AppointmentStatus::NoShow.blocks_slot());
        assert!(AppointmentStatus::Confirmed.blocks_slot());
    }

    #[test]
    fn invalid_enum_returns_error() {
        let err = BedStatus::from_str("broken").unwrap_err();
        assert!(err.to_string().contains("BedStatus"));
    }

    #[test]
    fn serde_uses_storage_names() {
        let json = serde_json::to_string(&AppointmentType::FollowUp).unwrap();
        assert_eq!(json, "\"follow_up\"");
        let parsed: BedType = serde_json::from_str("\"icu\"").unwrap();
        assert_eq!(parsed, BedType::Icu);
    }
}
