use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lenient;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateNotificationRequest {
    #[serde(default, deserialize_with = "lenient::text")]
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
}
