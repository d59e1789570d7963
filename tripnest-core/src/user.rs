use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::post::Location;
use crate::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Host,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Host => "host",
            Role::Admin => "admin",
        }
    }

    /// Hosts and admins may publish commercial listings.
    pub fn can_host(&self) -> bool {
        matches!(self, Role::Host | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(Role::Guest),
            "host" => Ok(Role::Host),
            "admin" => Ok(Role::Admin),
            other => Err(CoreError::ValidationError(format!("Invalid role '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub is_verified: bool,
    pub avatar: Option<String>,
    pub description: String,
    pub location: Option<UserLocation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        firstname: String,
        lastname: String,
        email: String,
        password_hash: String,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            firstname,
            lastname,
            email,
            password_hash,
            role,
            is_verified: false,
            avatar: None,
            description: String::new(),
            location: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            firstname: self.firstname.clone(),
            lastname: self.lastname.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// Where a user is: a pinned coordinate plus the place it names.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    #[serde(flatten)]
    pub place: Location,
    pub last_updated: Option<DateTime<Utc>>,
}

impl UserLocation {
    pub fn pinned(
        latitude: Option<f64>,
        longitude: Option<f64>,
        address: Option<String>,
        place: Location,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            return Err(CoreError::ValidationError(
                "Latitude and longitude are required".to_string(),
            ));
        };
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoreError::ValidationError(
                "Latitude must be between -90 and 90".to_string(),
            ));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoreError::ValidationError(
                "Longitude must be between -180 and 180".to_string(),
            ));
        }
        Ok(Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            address,
            place,
            last_updated: Some(now),
        })
    }
}

/// The slice of a user embedded in bookings and notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub avatar: Option<String>,
}
