use crate::models::UiComponent;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

const COMPONENTS_FILE: &str = "components.json";

/// Storage contract for UI components. Exactly one backend is selected at
/// startup; handlers never branch on connectivity themselves.
#[async_trait]
pub trait ComponentStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<UiComponent>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<UiComponent>>;
    async fn insert(&self, component: UiComponent) -> Result<UiComponent>;
    /// Replaces the stored record with the same id. Returns `None` when the
    /// id is absent.
    async fn update(&self, component: UiComponent) -> Result<Option<UiComponent>>;
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Document store backed by a JSON collection file, persisted on every write.
pub struct DocumentStore {
    path: PathBuf,
    components: RwLock<Vec<UiComponent>>,
}

impl DocumentStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;
        let path = data_dir.join(COMPONENTS_FILE);

        let components = if path.exists() {
            let data = fs::read_to_string(&path).context("Failed to read components file")?;
            serde_json::from_str(&data).context("Failed to parse components file")?
        } else {
            // Probe writability up front so an unusable volume degrades the
            // process to the in-memory store instead of failing per request.
            fs::write(&path, "[]").context("Failed to write components file")?;
            Vec::new()
        };

        Ok(Self {
            path,
            components: RwLock::new(components),
        })
    }

    fn save_to_disk(&self, components: &[UiComponent]) -> Result<()> {
        let json =
            serde_json::to_string_pretty(components).context("Failed to serialize components")?;
        fs::write(&self.path, json).context("Failed to write components file")?;
        Ok(())
    }
}

#[async_trait]
impl ComponentStore for DocumentStore {
    async fn find_all(&self) -> Result<Vec<UiComponent>> {
        let components = self.components.read().await;
        Ok(components.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UiComponent>> {
        let components = self.components.read().await;
        Ok(components.iter().find(|c| c.id == id).cloned())
    }

    async fn insert(&self, component: UiComponent) -> Result<UiComponent> {
        let mut components = self.components.write().await;
        components.push(component.clone());
        self.save_to_disk(&components)?;
        Ok(component)
    }

    async fn update(&self, component: UiComponent) -> Result<Option<UiComponent>> {
        let mut components = self.components.write().await;
        match components.iter_mut().find(|c| c.id == component.id) {
            Some(slot) => {
                *slot = component.clone();
                self.save_to_disk(&components)?;
                Ok(Some(component))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut components = self.components.write().await;
        let before = components.len();
        components.retain(|c| c.id != id);
        let removed = components.len() < before;
        if removed {
            self.save_to_disk(&components)?;
        }
        Ok(removed)
    }
}

/// In-process fallback store. Nothing survives a restart and it is never
/// reconciled with the document store.
#[derive(Default)]
pub struct MemoryStore {
    components: RwLock<HashMap<String, UiComponent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ComponentStore for MemoryStore {
    async fn find_all(&self) -> Result<Vec<UiComponent>> {
        let components = self.components.read().await;
        Ok(components.values().cloned().collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UiComponent>> {
        let components = self.components.read().await;
        Ok(components.get(id).cloned())
    }

    async fn insert(&self, component: UiComponent) -> Result<UiComponent> {
        let mut components = self.components.write().await;
        components.insert(component.id.clone(), component.clone());
        Ok(component)
    }

    async fn update(&self, component: UiComponent) -> Result<Option<UiComponent>> {
        let mut components = self.components.write().await;
        if !components.contains_key(&component.id) {
            return Ok(None);
        }
        components.insert(component.id.clone(), component.clone());
        Ok(Some(component))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut components = self.components.write().await;
        Ok(components.remove(id).is_some())
    }
}

/// Probes the document store once at startup and falls back to the in-memory
/// store when it is unusable. The second element reports which one won, for
/// the health endpoint.
pub fn select_component_store(data_dir: &Path) -> (Arc<dyn ComponentStore>, bool) {
    match DocumentStore::open(data_dir) {
        Ok(store) => (Arc::new(store), true),
        Err(err) => {
            tracing::warn!(error = %err, "document store unavailable, using in-memory fallback");
            (Arc::new(MemoryStore::new()), false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CodeBundle, CreateComponentRequest, UiComponent};

    fn sample(category: Category) -> UiComponent {
        UiComponent::new(
            CreateComponentRequest {
                title: Some("Sample".into()),
                description: Some("A sample".into()),
                category,
                code: CodeBundle {
                    html: "<div/>".into(),
                    css: ".x{}".into(),
                    js: String::new(),
                },
                preview: None,
                tags: Some(vec!["sample".into()]),
                use_tailwind: false,
                is_public: None,
            },
            "author-1".into(),
        )
    }

    async fn exercise_store(store: &dyn ComponentStore) {
        let created = store.insert(sample(Category::Buttons)).await.unwrap();
        let fetched = store.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Sample");

        let mut changed = fetched.clone();
        changed.title = "Renamed".into();
        let updated = store.update(changed).await.unwrap().unwrap();
        assert_eq!(updated.title, "Renamed");

        assert!(store.delete(&created.id).await.unwrap());
        assert!(!store.delete(&created.id).await.unwrap());
        assert!(store.find_by_id(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_crud() {
        exercise_store(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn document_store_crud() {
        let dir = tempfile::tempdir().unwrap();
        exercise_store(&DocumentStore::open(dir.path()).unwrap()).await;
    }

    #[tokio::test]
    async fn document_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let created = {
            let store = DocumentStore::open(dir.path()).unwrap();
            store.insert(sample(Category::Cards)).await.unwrap()
        };

        let reopened = DocumentStore::open(dir.path()).unwrap();
        let fetched = reopened.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.category, Category::Cards);
    }

    #[tokio::test]
    async fn update_of_missing_id_is_none() {
        let store = MemoryStore::new();
        let ghost = sample(Category::Loaders);
        assert!(store.update(ghost).await.unwrap().is_none());
    }

    #[test]
    fn selection_falls_back_when_dir_is_unusable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A plain file cannot be a data dir, so create_dir_all fails.
        let (_store, connected) = select_component_store(file.path());
        assert!(!connected);
    }
}
