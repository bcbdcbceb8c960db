use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Server-side lifecycle of a session identity. `absent` is the lack of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "session_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Reserved,
    Complete,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Reserved => write!(f, "reserved"),
            SessionStatus::Complete => write!(f, "complete"),
        }
    }
}

/// One row of the `sessions` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SessionRecord {
    pub id: Uuid,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// `status` field of session endpoint responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Collision,
    Invalid,
}

/// Response of `/session/generate-uuid` and `/session/complete`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub status: ResponseStatus,
    /// Canonical lowercase session id
    pub uuid: String,
    pub message: String,
}

/// Request to check a cached or self-generated session id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ValidateUuidRequest {
    /// Session id as held by the client; format is checked server-side
    #[validate(length(max = 64, message = "uuid must be at most 64 characters"))]
    pub uuid: String,
    /// True when the client generated the id itself and the server never accepted it
    #[serde(default)]
    pub fresh: bool,
}

/// Response of `/session/validate-uuid`.
///
/// On `collision`, `uuid` is the replacement and `previous_uuid` the rejected id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidateUuidResponse {
    pub status: ResponseStatus,
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_uuid: Option<String>,
    pub message: String,
}

/// Hand-off from the external verification service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CompleteSessionRequest {
    #[validate(length(max = 64, message = "uuid must be at most 64 characters"))]
    pub uuid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_request_defaults_to_not_fresh() {
        let req: ValidateUuidRequest =
            serde_json::from_str(r#"{"uuid":"3f2504e0-4f89-41d3-9a0c-0305e82c3301"}"#).unwrap();
        assert!(!req.fresh);
    }

    #[test]
    fn collision_response_shape() {
        let resp = ValidateUuidResponse {
            status: ResponseStatus::Collision,
            uuid: "new".to_string(),
            previous_uuid: Some("old".to_string()),
            message: "replaced".to_string(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "collision");
        assert_eq!(json["previous_uuid"], "old");
    }
}
