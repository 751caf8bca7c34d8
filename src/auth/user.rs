use std::collections::HashMap;
use std::sync::Arc;

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand::RngCore;
use tokio::sync::RwLock;

use crate::{Error, Result};

/// A registered identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    /// Unique login name.
    pub username: String,
    /// Argon2 hash of the password in PHC string format.
    pub hashed_password: String,
    /// Role claimed in issued tokens.
    pub role: String,
}

impl User {
    /// Creates a user, hashing `password` with a fresh random salt.
    pub fn new(username: &str, password: &str, role: &str) -> Result<Self> {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt)?;

        let hashed_password = Argon2::default()
            .hash_password(password.as_bytes(), &salt)?
            .to_string();

        Ok(Self {
            username: username.to_string(),
            hashed_password,
            role: role.to_string(),
        })
    }

    /// Checks `password` against the stored hash.
    pub fn is_correct_password(&self, password: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.hashed_password) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

/// In-memory registry of users keyed by username.
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `user`; fails if the username is taken.
    pub async fn save(&self, user: User) -> Result<()> {
        let mut users = self.users.write().await;

        if users.contains_key(&user.username) {
            return Err(Error::AlreadyExists(format!(
                "user '{}' already registered",
                user.username
            )));
        }

        users.insert(user.username.clone(), user);
        Ok(())
    }

    /// Looks up a user by username.
    pub async fn find(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(username).cloned())
    }

    /// Number of registered users.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Whether no users are registered.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}
