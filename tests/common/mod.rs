//! Common test utilities: an in-memory repository and state builders.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use session_gate::{
    AppState,
    config::AppConfig,
    models::{Account, NewUser, User},
    repository::{Repository, RepositoryState},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-session-secret-value-1234567890";

/// In-memory `Repository`. With `fail` set, every call returns a database error.
#[derive(Default)]
pub struct MockRepo {
    pub users: Mutex<HashMap<Uuid, User>>,
    pub accounts: Mutex<Vec<Account>>,
    pub fail: bool,
}

impl MockRepo {
    pub fn with_user(user: User) -> Self {
        let repo = Self::default();
        repo.users.lock().unwrap().insert(user.id, user);
        repo
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn remove_user(&self, id: Uuid) {
        self.users.lock().unwrap().remove(&id);
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), sqlx::Error> {
        if self.fail {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Repository for MockRepo {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        self.check()?;
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        self.check()?;
        let user_id = self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.provider == provider && a.provider_account_id == provider_account_id)
            .map(|a| a.user_id);
        Ok(user_id.and_then(|id| self.users.lock().unwrap().get(&id).cloned()))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, sqlx::Error> {
        self.check()?;
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            image: user.image,
            created_at: Utc::now(),
        };
        self.users
            .lock()
            .unwrap()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn link_account(&self, account: Account) -> Result<(), sqlx::Error> {
        self.check()?;
        let mut accounts = self.accounts.lock().unwrap();
        match accounts.iter_mut().find(|a| {
            a.provider == account.provider && a.provider_account_id == account.provider_account_id
        }) {
            Some(existing) => {
                existing.access_token = account.access_token;
                existing.token_type = account.token_type;
                existing.scope = account.scope;
            }
            None => accounts.push(account),
        }
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        self.check()
    }
}

pub fn test_user(id: Uuid) -> User {
    User {
        id,
        name: Some("Test User".to_string()),
        email: Some("test@example.com".to_string()),
        image: None,
        created_at: Utc::now(),
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        session_secret: TEST_SECRET.to_string(),
        ..AppConfig::default()
    }
}

/// Production-wired state (real resolver, policy and providers) over `repo`.
pub fn test_state(config: AppConfig, repo: Arc<MockRepo>) -> AppState {
    AppState::new(config, repo as RepositoryState).expect("default routes form a valid policy")
}

/// Session cookie header value for `user`, signed with the test secret.
pub fn session_cookie_for(user: &User) -> String {
    let token = session_gate::auth::issue_session_token(user, TEST_SECRET, 3600).unwrap();
    format!("session={token}")
}
