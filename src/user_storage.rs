use crate::user_models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

const USERS_FILE: &str = "users.json";

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn insert(&self, user: User) -> Result<User>;
    async fn update(&self, user: User) -> Result<Option<User>>;
}

pub struct FileUserStore {
    path: PathBuf,
    users: RwLock<Vec<User>>,
}

impl FileUserStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;
        let path = data_dir.join(USERS_FILE);

        let users = if path.exists() {
            let data = fs::read_to_string(&path).context("Failed to read users file")?;
            serde_json::from_str(&data).context("Failed to parse users file")?
        } else {
            fs::write(&path, "[]").context("Failed to write users file")?;
            Vec::new()
        };

        Ok(Self {
            path,
            users: RwLock::new(users),
        })
    }

    fn save_to_disk(&self, users: &[User]) -> Result<()> {
        let json = serde_json::to_string_pretty(users).context("Failed to serialize users")?;
        fs::write(&self.path, json).context("Failed to write users file")?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for FileUserStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let needle = email.trim().to_lowercase();
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == needle).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn insert(&self, user: User) -> Result<User> {
        let mut users = self.users.write().await;
        users.push(user.clone());
        self.save_to_disk(&users)?;
        Ok(user)
    }

    async fn update(&self, user: User) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(slot) => {
                *slot = user.clone();
                self.save_to_disk(&users)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let needle = email.trim().to_lowercase();
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == needle).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn insert(&self, user: User) -> Result<User> {
        let mut users = self.users.write().await;
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn update(&self, user: User) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Ok(None);
        }
        users.insert(user.id.clone(), user.clone());
        Ok(Some(user))
    }
}

/// Same selection policy as the component store: one backend, chosen once.
pub fn select_user_store(data_dir: &Path) -> (Arc<dyn UserStore>, bool) {
    match FileUserStore::open(data_dir) {
        Ok(store) => (Arc::new(store), true),
        Err(err) => {
            tracing::warn!(error = %err, "user store unavailable, using in-memory fallback");
            (Arc::new(MemoryUserStore::new()), false)
        }
    }
}
