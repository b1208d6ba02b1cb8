use serde::{Deserialize, Serialize};

/// A persisted book record. The id is assigned by the store on creation and
/// never changes; there is no update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub author: Option<String>,
    pub title: Option<String>,
    pub publisher: Option<String>,
}

/// Payload for POST /api/create_books. Every field is optional; absence is
/// stored as NULL, distinct from the empty string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBook {
    pub author: Option<String>,
    pub title: Option<String>,
    pub publisher: Option<String>,
}

/// Payload for POST /api/user/register. Only the email is validated (it must
/// be non-empty); the password is hashed before it reaches the store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

/// Response envelope: `{"message": ..., "data"?: ...}`. The data key is
/// omitted entirely for message-only replies.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> Envelope<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
        }
    }
}
