use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::{Pg, PgValue},
    prelude::*,
    serialize::{self, Output, ToSql},
    sql_types::Text,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref DOSAGE_RE: Regex = Regex::new(
        r"^\d+(\.\d+)?\s?(mg|mcg|g|ml|IU|units?|tablets?|capsules?|puffs?|drops?)$"
    )
    .expect("dosage pattern is valid");
    static ref LICENSE_RE: Regex =
        Regex::new(r"^[A-Z]{2,4}\d{3,8}$").expect("license pattern is valid");
    static ref PHONE_RE: Regex =
        Regex::new(r"^\+?[0-9 ()-]{7,20}$").expect("phone pattern is valid");
}

/// Declares a status-like enum stored as its variant name in a `TEXT` column.
macro_rules! text_enum {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression,
            FromSqlRow,
        )]
        #[diesel(sql_type = diesel::sql_types::Text)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $(stringify!($variant) => Ok($name::$variant),)+
                    other => Err(format!("Unknown {} '{other}'", stringify!($name))),
                }
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let value = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                Ok(value.parse()?)
            }
        }
    };
}

text_enum!(Role { Admin, Doctor, Patient });

text_enum!(AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Rescheduled,
    Completed,
    Cancelled,
});

text_enum!(RenewalStatus {
    None,
    Requested,
    Approved,
    Rejected,
});

text_enum!(NotificationKind {
    AppointmentConfirmation,
    Reminder,
    Cancellation,
    Approval,
    Rejection,
    Reschedule,
    Completion,
    Prescription,
    PrescriptionRenewal,
    RenewalApproved,
    RenewalRejected,
    SystemNotification,
});

text_enum!(DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
});

impl AppointmentStatus {
    /// Whether an appointment in this status may move to `next`.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Approved | Rejected | Cancelled)
                | (Approved, Completed | Cancelled | Rescheduled)
                | (Rescheduled, Approved | Completed | Cancelled | Rescheduled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected
                | AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
        )
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = crate::schema::patients)]
#[diesel(treat_none_as_null = true)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
    pub date_of_birth: Option<NaiveDate>,
    pub blood_type: String,
    pub allergies: String,
    pub medical_history: String,
    pub insurance_info: String,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = crate::schema::doctors)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub specialization: String,
    pub license_number: String,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A recurring weekly availability window of a doctor.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = crate::schema::schedules)]
pub struct Schedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_appointments: i32,
}

impl Schedule {
    /// True if `[start, end)` on the window's weekday lies inside the window.
    pub fn covers(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        DayOfWeek::from(start.weekday()) == self.day_of_week
            && start.date_naive() == end.date_naive()
            && self.start_time <= start.time()
            && end.time() <= self.end_time
    }
}

#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = crate::schema::appointments)]
#[diesel(treat_none_as_null = true)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    #[diesel(column_name = start_time)]
    pub start: DateTime<Utc>,
    #[diesel(column_name = end_time)]
    pub end: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// Half-open interval overlap: `[s1, e1)` and `[s2, e2)` overlap iff `s1 < e2 && s2 < e1`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }

    /// Whether the appointment still occupies its time range.
    pub fn blocks_slot(&self) -> bool {
        !self.deleted && self.status != AppointmentStatus::Cancelled
    }
}

#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = crate::schema::prescriptions)]
#[diesel(treat_none_as_null = true)]
pub struct Prescription {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub duration_days: i32,
    pub instructions: Option<String>,
    pub allow_refills: bool,
    pub refills_allowed: i32,
    pub prescribed_date: DateTime<Utc>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub renewal_status: RenewalStatus,
    pub renewal_note: Option<String>,
}

impl Prescription {
    pub fn can_refill(&self) -> bool {
        self.allow_refills && self.refills_allowed > 0
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < now)
    }

    /// A fresh copy for the next period with one refill consumed.
    pub fn renewed(&self, now: DateTime<Utc>) -> Prescription {
        Prescription {
            id: Uuid::new_v4(),
            prescribed_date: now,
            expiry_date: Some(now + Duration::days(self.duration_days.into())),
            refills_allowed: self.refills_allowed - 1,
            renewal_status: RenewalStatus::None,
            renewal_note: None,
            ..self.clone()
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = crate::schema::notifications)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub kind: NotificationKind,
    pub related_entity_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UserDraft {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub role: Role,
}

impl UserDraft {
    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            role: self.role,
            active: true,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DoctorDraft {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(regex(path = *PHONE_RE))]
    pub phone_number: String,
    #[validate(length(min = 1, max = 100))]
    pub specialization: String,
    #[validate(regex(path = *LICENSE_RE))]
    pub license_number: String,
}

impl DoctorDraft {
    pub fn into_doctor(self) -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone_number: self.phone_number,
            specialization: self.specialization,
            license_number: self.license_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PatientDraft {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(regex(path = *PHONE_RE))]
    pub phone_number: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub blood_type: String,
    #[serde(default)]
    pub allergies: String,
    #[serde(default)]
    pub medical_history: String,
    #[serde(default)]
    pub insurance_info: String,
}

impl PatientDraft {
    /// Builds a patient record, keeping `id` when updating an existing one.
    pub fn into_patient(self, id: Uuid) -> Patient {
        Patient {
            id,
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone_number: self.phone_number,
            address: self.address,
            date_of_birth: self.date_of_birth,
            blood_type: self.blood_type,
            allergies: self.allergies,
            medical_history: self.medical_history,
            insurance_info: self.insurance_info,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScheduleDraft {
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[validate(range(min = 1))]
    pub max_appointments: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PrescriptionDraft {
    pub appointment_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub medication: String,
    #[validate(length(max = 50), regex(path = *DOSAGE_RE))]
    pub dosage: String,
    #[validate(length(min = 1, max = 50))]
    pub frequency: String,
    #[validate(range(min = 1, max = 365))]
    pub duration_days: i32,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub allow_refills: bool,
    #[validate(range(min = 0, max = 12))]
    #[serde(default)]
    pub refills_allowed: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PrescriptionDraft {
    pub fn into_prescription(
        self,
        doctor_id: Uuid,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Prescription {
        Prescription {
            id: Uuid::new_v4(),
            appointment_id: self.appointment_id,
            doctor_id,
            patient_id,
            medication: self.medication,
            dosage: self.dosage,
            frequency: self.frequency,
            duration_days: self.duration_days,
            instructions: self.instructions,
            allow_refills: self.allow_refills,
            refills_allowed: self.refills_allowed,
            prescribed_date: now,
            expiry_date: Some(now + Duration::days(self.duration_days.into())),
            notes: self.notes,
            renewal_status: RenewalStatus::None,
            renewal_note: None,
        }
    }
}
