//! Provider API response DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account fields exposed to our own clients
///
/// Projection of the provider's `GET /account` resource. Recomputed on every
/// request and never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountProjection {
    pub email: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}
