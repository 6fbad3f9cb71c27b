//! API response models.

use serde::{Deserialize, Serialize};

/// A successful response from `POST /verify/process`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct VerifyResponse {
    /// A user-friendly status message.
    pub message: String,
    pub username: String,
    pub discriminator: String,
}
