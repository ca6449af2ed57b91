use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::validation::{
    sanitize_string, validate_max_len, validate_phone, validate_required, ValidationError,
    DISPLAY_NAME_MAX_LEN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Active,
    Suspended,
    Exited,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Suspended => "suspended",
            MemberStatus::Exited => "exited",
        }
    }
}

impl FromStr for MemberStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MemberStatus::Active),
            "suspended" => Ok(MemberStatus::Suspended),
            "exited" => Ok(MemberStatus::Exited),
            other => Err(format!("unknown member status '{}'", other)),
        }
    }
}

/// A farmer-group participant. Everything but `status` is fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub phone: String,
    pub status: MemberStatus,
    pub created_at: DateTime<Utc>,
}

impl Member {
    pub fn new(group_id: Uuid, name: &str, phone: &str) -> Result<Self, ValidationError> {
        let name = sanitize_string(name);
        validate_required("name", &name)?;
        validate_max_len("name", &name, DISPLAY_NAME_MAX_LEN)?;
        validate_phone(phone)?;

        Ok(Self {
            id: Uuid::new_v4(),
            group_id,
            name,
            phone: sanitize_string(phone),
            status: MemberStatus::Active,
            created_at: Utc::now(),
        })
    }
}
