use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: i64,
    pub last_login: Option<i64>,
    pub is_active: bool,
}

impl User {
    pub fn new(email: String, name: String, password_hash: String) -> Self {
        Self {
            id: None,
            email,
            name,
            password_hash,
            created_at: chrono::Utc::now().timestamp_millis(),
            last_login: None,
            is_active: true,
        }
    }

    pub fn update_last_login(&mut self) {
        self.last_login = Some(chrono::Utc::now().timestamp_millis());
    }
}
