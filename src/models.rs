use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Stored Records ---

/// User
///
/// The canonical identity record in the `users` table. Created on the first
/// successful sign-in through any provider.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    // Avatar URL reported by the identity provider.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user from a provider profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// Account
///
/// Links a `User` to one identity at one provider. `(provider, provider_account_id)`
/// is unique; signing in again refreshes the token fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Account {
    pub provider: String,
    pub provider_account_id: String,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

// --- API Schemas ---

/// SessionUser
///
/// The public view of the signed-in user returned by `GET /api/session`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

impl From<User> for SessionUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            image: user.image,
        }
    }
}

/// SessionResponse
///
/// Response body of `GET /api/session`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
pub struct SessionResponse {
    pub user: SessionUser,
}
