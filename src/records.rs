//! Typed LifeLink rows.
//!
//! Tables store [`Row`]s; these structs are the shapes the application
//! writes, validated with serde when converting in either direction.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::local_db_model::{Row, TableName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Donor,
    Seeker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Donor => "donor",
            Role::Seeker => "seeker",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "donor" => Ok(Role::Donor),
            "seeker" => Ok(Role::Seeker),
            other => Err(StoreError::InvalidRecord {
                table: TableName::UserRoles.to_string(),
                reason: format!("unknown role '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodType {
    pub const ALL: [BloodType; 8] = [
        BloodType::APositive,
        BloodType::ANegative,
        BloodType::BPositive,
        BloodType::BNegative,
        BloodType::AbPositive,
        BloodType::AbNegative,
        BloodType::OPositive,
        BloodType::ONegative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodType::APositive => "A+",
            BloodType::ANegative => "A-",
            BloodType::BPositive => "B+",
            BloodType::BNegative => "B-",
            BloodType::AbPositive => "AB+",
            BloodType::AbNegative => "AB-",
            BloodType::OPositive => "O+",
            BloodType::ONegative => "O-",
        }
    }
}

impl Display for BloodType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        BloodType::ALL
            .into_iter()
            .find(|blood_type| blood_type.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StoreError::InvalidRecord {
                table: TableName::DonorProfiles.to_string(),
                reason: format!("unknown blood type '{s}'"),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Fulfilled,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Fulfilled => "fulfilled",
            RequestStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
}

/// A table-backed record that converts to and from [`Row`].
pub trait Record: Serialize + DeserializeOwned {
    const TABLE: TableName;

    fn to_row(&self) -> Result<Row> {
        let value = serde_json::to_value(self)?;
        Row::from_value(value).ok_or_else(|| StoreError::InvalidRecord {
            table: Self::TABLE.to_string(),
            reason: "record did not serialize to an object".to_string(),
        })
    }

    fn from_row(row: &Row) -> Result<Self> {
        serde_json::from_value(row.clone().into_value()).map_err(|e| StoreError::InvalidRecord {
            table: Self::TABLE.to_string(),
            reason: e.to_string(),
        })
    }
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRole {
    pub user_id: String,
    pub role: Role,
}

impl Record for UserRole {
    const TABLE: TableName = TableName::UserRoles;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonorProfile {
    pub id: String,
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub blood_type: Option<BloodType>,
    #[serde(default = "available_by_default")]
    pub is_available: bool,
    #[serde(default)]
    pub location_address: Option<String>,
    #[serde(default)]
    pub location_lat: Option<f64>,
    #[serde(default)]
    pub location_lng: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn available_by_default() -> bool {
    true
}

impl DonorProfile {
    /// The profile created alongside a donor account. Id is `profile_<user_id>`.
    pub fn initial(user_id: &str, full_name: &str, email: &str) -> Self {
        Self {
            id: format!("profile_{user_id}"),
            user_id: user_id.to_string(),
            full_name: full_name.to_string(),
            email: email.to_string(),
            phone: None,
            blood_type: None,
            is_available: true,
            location_address: None,
            location_lat: None,
            location_lng: None,
            created_at: Some(now_rfc3339()),
        }
    }

    pub fn location(&self) -> Option<crate::geo::Coordinates> {
        match (self.location_lat, self.location_lng) {
            (Some(lat), Some(lng)) => Some(crate::geo::Coordinates::new(lat, lng)),
            _ => None,
        }
    }
}

impl Record for DonorProfile {
    const TABLE: TableName = TableName::DonorProfiles;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeekerProfile {
    pub id: String,
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub blood_type_needed: Option<BloodType>,
    #[serde(default)]
    pub urgency_level: Option<UrgencyLevel>,
    #[serde(default)]
    pub location_address: Option<String>,
    #[serde(default)]
    pub location_lat: Option<f64>,
    #[serde(default)]
    pub location_lng: Option<f64>,
    #[serde(default)]
    pub needs_by: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl SeekerProfile {
    /// The profile created alongside a seeker account. Id is `seeker_<user_id>`.
    pub fn initial(user_id: &str, full_name: &str, email: &str) -> Self {
        Self {
            id: format!("seeker_{user_id}"),
            user_id: user_id.to_string(),
            full_name: full_name.to_string(),
            email: email.to_string(),
            phone: None,
            blood_type_needed: None,
            urgency_level: None,
            location_address: None,
            location_lat: None,
            location_lng: None,
            needs_by: None,
            message: None,
            created_at: Some(now_rfc3339()),
        }
    }
}

impl Record for SeekerProfile {
    const TABLE: TableName = TableName::SeekerProfiles;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodRequest {
    /// Assigned on insert when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub seeker_id: String,
    pub donor_id: String,
    pub blood_type: BloodType,
    #[serde(default)]
    pub message: String,
    pub urgency_level: UrgencyLevel,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Record for BloodRequest {
    const TABLE: TableName = TableName::BloodRequests;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Record for Notification {
    const TABLE: TableName = TableName::Notifications;
}

/// Profile details held for an email until its account can be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingProfile {
    pub full_name: String,
    pub email: String,
}
