use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use self::user::Role;

pub mod client;
pub mod session;
pub mod user;

pub type MemberId = u64;
pub type PackageId = u64;
pub type UserId = u64;

/// Membership state of a member. Anything the backend sends besides
/// `active` or `inactive` (including null or an empty string) is `Unknown`.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Inactive,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MembershipStatus {
    /// Badge text shown in tables.
    pub fn label(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "ACTIVE",
            MembershipStatus::Inactive => "INACTIVE",
            MembershipStatus::Unknown => "UNKNOWN",
        }
    }
}

fn status_or_unknown<'de, D>(deserializer: D) -> Result<MembershipStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<MembershipStatus>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}

/// Package details embedded in a member record. This is a copy taken when the
/// member was loaded, not a live reference to the package catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSnapshot {
    #[serde(default)]
    pub id: Option<PackageId>,
    pub name: String,
    pub price: f64,
}

/// Member object returned by `/management/members`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    #[serde(default, deserialize_with = "status_or_unknown")]
    pub membership_status: MembershipStatus,
    /// When the current subscription ends. Null for members without a plan.
    #[serde(default)]
    pub sub_end_date: Option<DateTime<Utc>>,
    /// Path relative to the API base URL, e.g. `/uploads/171_me.png`.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub package: Option<PackageSnapshot>,
}

impl Member {
    /// Absolute URL of the member's picture, if one was uploaded.
    pub fn profile_picture_url(&self, base_url: &str) -> Option<String> {
        self.profile_picture
            .as_ref()
            .map(|path| format!("{}{}", base_url.trim_end_matches('/'), path))
    }

    pub fn plan_label(&self) -> &str {
        self.package.as_ref().map_or("-", |p| p.name.as_str())
    }

    pub fn sub_end_label(&self) -> String {
        self.sub_end_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

/// Membership plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    pub duration_days: u32,
    pub price: f64,
    #[serde(default)]
    pub description: String,
}

/// The person who checked in, as embedded in an attendance log.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "status_or_unknown")]
    pub membership_status: MembershipStatus,
}

/// The staff member who scanned the check-in.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scanner {
    #[serde(default)]
    pub name: String,
}

/// Attendance log entry returned by `/management/attendance`. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceLog {
    pub id: u64,
    #[serde(default)]
    pub trainer: Attendee,
    pub scanned_by: UserId,
    #[serde(default)]
    pub admin: Option<Scanner>,
    pub scan_time: DateTime<Utc>,
}

impl AttendanceLog {
    pub fn attendee_name(&self) -> &str {
        if self.trainer.name.is_empty() {
            "Unknown"
        } else {
            &self.trainer.name
        }
    }

    pub fn scanned_by_label(&self) -> String {
        match &self.admin {
            Some(admin) if !admin.name.is_empty() => admin.name.clone(),
            _ => format!("Admin #{}", self.scanned_by),
        }
    }
}

/// Counters shown on the dashboard overview.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_members: u64,
    pub active_members: u64,
    #[serde(default)]
    pub total_trainers: u64,
    pub estimated_revenue: f64,
    pub today_attendance: u64,
}

/// One bar of the seven-day attendance chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub count: u64,
}

/// Every read endpoint wraps its payload in `data`. Paginated endpoints also
/// send `total`. The backend serializes empty collections as `null`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: Option<T>,
    pub total: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Data returned by the server after a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Profile,
}

/// Profile of the signed-in account, returned by login and `/auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, deserialize_with = "status_or_unknown")]
    pub membership_status: MembershipStatus,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileEnvelope {
    pub user: Profile,
}

/// Body of `POST /management/members/subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub member_id: MemberId,
    pub package_id: PackageId,
}

/// Body of `PUT /admin/members/:id`. `package_id` is always sent so that
/// `null` reaches the backend when no plan is selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberUpdate {
    pub name: String,
    pub email: String,
    pub package_id: Option<PackageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Body of `POST /admin/users`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: user::StaffRole,
}

/// Body of `PUT /admin/users/:id`. A missing password leaves it unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserUpdate {
    pub name: String,
    pub email: String,
    pub role: user::StaffRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Body of `POST /admin/packages` and `PUT /admin/packages/:id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageInput {
    pub name: String,
    pub duration_days: u32,
    pub price: f64,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn member_tolerates_backend_nulls() {
        let member: Member = serde_json::from_value(json!({
            "id": 4,
            "name": "Rina",
            "email": "rina@gym.test",
            "membership_status": null,
            "sub_end_date": null,
            "profile_picture": "",
        }))
        .unwrap();

        assert_eq!(member.membership_status, MembershipStatus::Unknown);
        assert_eq!(member.profile_picture, None);
        assert_eq!(member.plan_label(), "-");
        assert_eq!(member.sub_end_label(), "-");
    }

    #[test]
    fn member_with_plan() {
        let member: Member = serde_json::from_value(json!({
            "id": 5,
            "name": "Budi",
            "email": "budi@gym.test",
            "membership_status": "active",
            "sub_end_date": "2024-03-01T10:00:00+07:00",
            "profile_picture": "/uploads/1_budi.png",
            "package": { "id": 2, "name": "Monthly", "price": 30.0 }
        }))
        .unwrap();

        assert_eq!(member.membership_status, MembershipStatus::Active);
        assert_eq!(member.plan_label(), "Monthly");
        assert_eq!(member.sub_end_label(), "2024-03-01");
        assert_eq!(
            member.profile_picture_url("http://localhost:8080/api/").as_deref(),
            Some("http://localhost:8080/api/uploads/1_budi.png")
        );
    }

    #[test]
    fn unknown_status_strings_fall_back() {
        let attendee: Attendee =
            serde_json::from_value(json!({ "name": "A", "membership_status": "frozen" })).unwrap();
        assert_eq!(attendee.membership_status, MembershipStatus::Unknown);
        assert_eq!(attendee.membership_status.label(), "UNKNOWN");
    }

    #[test]
    fn attendance_labels() {
        let log: AttendanceLog = serde_json::from_value(json!({
            "id": 1,
            "trainer": { "name": "", "email": "" },
            "scanned_by": 9,
            "admin": { "name": "" },
            "scan_time": "2024-01-05T08:30:00Z"
        }))
        .unwrap();

        assert_eq!(log.attendee_name(), "Unknown");
        assert_eq!(log.scanned_by_label(), "Admin #9");
    }

    #[test]
    fn member_update_sends_null_package_and_skips_blank_password() {
        let body = serde_json::to_value(MemberUpdate {
            name: "Rina".into(),
            email: "rina@gym.test".into(),
            package_id: None,
            password: None,
        })
        .unwrap();

        assert_eq!(
            body,
            json!({ "name": "Rina", "email": "rina@gym.test", "package_id": null })
        );
    }
}
