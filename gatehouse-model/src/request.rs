//! API request models.

use serde::{Deserialize, Serialize};

/// Request body for the `POST /verify/process` endpoint.
///
/// All fields are optional on the wire so a missing code can be reported
/// with a proper error instead of a deserialization failure.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct VerifyRequest {
    /// The authorization code Discord appended to the callback URL.
    #[serde(default)]
    pub code: Option<String>,
    /// The `state` Discord echoed back, if any.
    #[serde(default)]
    pub state: Option<String>,
    /// When the callback page received the code, as reported by the page.
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
}
