use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::identity::Identity;

/// Creator recorded on passes made without a signed-in user
pub const ANONYMOUS_CREATOR: &str = "anonymous";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PassValidationError {
    #[error("Student name is required")]
    MissingStudentName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassStatus {
    Active,
    Returned,
}

impl PassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassStatus::Active => "active",
            PassStatus::Returned => "returned",
        }
    }
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PassStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PassStatus::Active),
            "returned" => Ok(PassStatus::Returned),
            other => Err(format!("unknown pass status: {}", other)),
        }
    }
}

/// Where the student is headed. The five categories come from the kiosk
/// picker; anything else typed into the form is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Destination {
    Bathroom,
    Guidance,
    Nurse,
    Office,
    Other,
    Custom(String),
}

impl Destination {
    pub const CATEGORIES: [Destination; 5] = [
        Destination::Bathroom,
        Destination::Guidance,
        Destination::Nurse,
        Destination::Office,
        Destination::Other,
    ];

    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Destination::Other;
        }

        Self::CATEGORIES
            .iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(trimmed))
            .cloned()
            .unwrap_or_else(|| Destination::Custom(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Destination::Bathroom => "Bathroom",
            Destination::Guidance => "Guidance",
            Destination::Nurse => "Nurse",
            Destination::Office => "Office",
            Destination::Other => "Other",
            Destination::Custom(text) => text,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Destination {
    fn from(value: String) -> Self {
        Destination::parse(&value)
    }
}

impl From<Destination> for String {
    fn from(value: Destination) -> Self {
        value.as_str().to_string()
    }
}

/// A single hall pass.
///
/// `returned_at` is `Some` exactly when `status` is `Returned`; stores check
/// this when loading records and [`Pass::mark_returned`] is the only way a
/// pass changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pass {
    pub id: String,
    pub student_name: String,
    pub teacher: String,
    pub destination: Destination,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: PassStatus,
    pub created_by: String,
}

impl Pass {
    pub fn is_active(&self) -> bool {
        self.status == PassStatus::Active
    }

    /// Moves an active pass to `returned`. A pass that is already returned
    /// comes back untouched, so racing clients cannot rewrite `returned_at`.
    pub fn mark_returned(mut self, now: DateTime<Utc>) -> Pass {
        if self.status == PassStatus::Active {
            self.status = PassStatus::Returned;
            self.returned_at = Some(now);
        }
        self
    }

    /// Whether `status` and `returned_at` agree
    pub fn is_consistent(&self) -> bool {
        match self.status {
            PassStatus::Active => self.returned_at.is_none(),
            PassStatus::Returned => self.returned_at.is_some(),
        }
    }
}

/// Raw form or JSON input for a new pass
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassFields {
    #[serde(default, alias = "student_name")]
    pub student_name: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A validated pass that has not been stored yet; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPass {
    pub student_name: String,
    pub teacher: String,
    pub destination: Destination,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl NewPass {
    pub fn create(
        fields: PassFields,
        creator: Option<&Identity>,
        now: DateTime<Utc>,
    ) -> Result<Self, PassValidationError> {
        let student_name = fields.student_name.trim();
        if student_name.is_empty() {
            return Err(PassValidationError::MissingStudentName);
        }

        let reason = fields
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        let created_by = creator
            .and_then(|identity| identity.email.as_deref())
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .unwrap_or(ANONYMOUS_CREATOR)
            .to_string();

        Ok(Self {
            student_name: student_name.to_string(),
            teacher: fields.teacher.trim().to_string(),
            destination: Destination::parse(&fields.destination),
            reason,
            created_at: now,
            created_by,
        })
    }

    pub fn into_pass(self, id: String) -> Pass {
        Pass {
            id,
            student_name: self.student_name,
            teacher: self.teacher,
            destination: self.destination,
            reason: self.reason,
            created_at: self.created_at,
            returned_at: None,
            status: PassStatus::Active,
            created_by: self.created_by,
        }
    }
}
