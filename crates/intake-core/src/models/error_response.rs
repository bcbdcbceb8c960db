use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of every non-2xx response except the session-validation outcomes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_type: Option<String>,
    pub code: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub suggested_action: Option<String>,
}
