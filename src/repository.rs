use crate::error::ApiError;
use crate::models::{
    Category, ComponentPage, ComponentView, CreateComponentRequest, UiComponent,
    UpdateComponentRequest,
};
use crate::storage::ComponentStore;
use chrono::Utc;
use rand::seq::SliceRandom;
use std::sync::Arc;

pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Canonical data-access layer for UI components. All handlers go through
/// here; the repository only ever sees the one store selected at startup.
#[derive(Clone)]
pub struct ComponentRepository {
    store: Arc<dyn ComponentStore>,
}

/// Category filter as given by the client. "All" (or nothing) means the
/// unscoped browse view, which gets the shuffled single-page treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        match raw {
            None | Some("") | Some("All") => Ok(CategoryFilter::All),
            Some(other) => Category::parse(other)
                .map(CategoryFilter::Only)
                .ok_or_else(|| ApiError::Validation(format!("Unknown category: {other}"))),
        }
    }
}

impl ComponentRepository {
    pub fn new(store: Arc<dyn ComponentStore>) -> Self {
        Self { store }
    }

    /// Listing pipeline: category filter, search filter, Forms partition,
    /// shuffle of the non-Forms slice, Forms concatenated last, then
    /// pagination (skipped entirely for the "All" view).
    pub async fn list(
        &self,
        filter: CategoryFilter,
        search: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<ComponentPage, ApiError> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let mut components: Vec<UiComponent> = self
            .store
            .find_all()
            .await?
            .into_iter()
            .filter(|c| c.is_public)
            .collect();

        if let CategoryFilter::Only(category) = filter {
            components.retain(|c| c.category == category);
        }

        if let Some(text) = search.map(str::trim).filter(|t| !t.is_empty()) {
            let needle = text.to_lowercase();
            components.retain(|c| matches_search(c, &needle));
        }

        let (forms, mut non_forms): (Vec<_>, Vec<_>) = components
            .into_iter()
            .partition(|c| c.category == Category::Forms);
        non_forms.shuffle(&mut rand::thread_rng());
        non_forms.extend(forms);
        let ordered = non_forms;

        let total = ordered.len();
        let (components, total_pages) = match filter {
            // The unscoped browse view is served whole; every request gets a
            // fresh permutation, so slicing it would tear stable pages apart.
            CategoryFilter::All => (ordered, 1),
            CategoryFilter::Only(_) => {
                // Widen before multiplying: page and page_size are
                // caller-controlled and their u32 product can overflow.
                let skip = (page as usize - 1) * page_size as usize;
                let items: Vec<UiComponent> = ordered
                    .into_iter()
                    .skip(skip)
                    .take(page_size as usize)
                    .collect();
                (items, total.div_ceil(page_size as usize) as u32)
            }
        };

        Ok(ComponentPage {
            components,
            total_pages,
            current_page: page,
            total,
        })
    }

    pub async fn get_by_id(
        &self,
        id: &str,
        caller: Option<&str>,
    ) -> Result<ComponentView, ApiError> {
        let component = self.require(id).await?;
        Ok(ComponentView::for_caller(component, caller))
    }

    pub async fn create(
        &self,
        payload: CreateComponentRequest,
        author_id: &str,
    ) -> Result<UiComponent, ApiError> {
        if payload.title.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return Err(ApiError::Validation("Title is required".into()));
        }
        if payload
            .description
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .is_empty()
        {
            return Err(ApiError::Validation("Description is required".into()));
        }
        validate_code(&payload.code, payload.use_tailwind)?;

        let component = UiComponent::new(payload, author_id.to_string());
        Ok(self.store.insert(component).await?)
    }

    pub async fn update(
        &self,
        id: &str,
        author_id: &str,
        patch: UpdateComponentRequest,
    ) -> Result<UiComponent, ApiError> {
        let mut component = self.require_owned(id, author_id).await?;

        if let Some(title) = patch.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(ApiError::Validation("Title cannot be blank".into()));
            }
            component.title = title;
        }
        if let Some(description) = patch.description {
            let description = description.trim().to_string();
            if description.is_empty() {
                return Err(ApiError::Validation("Description cannot be blank".into()));
            }
            component.description = description;
        }
        if let Some(category) = patch.category {
            component.category = category;
        }
        if let Some(code) = patch.code {
            component.code = code;
        }
        if let Some(preview) = patch.preview {
            component.preview = preview;
        }
        if let Some(tags) = patch.tags {
            component.tags = tags;
        }
        if let Some(use_tailwind) = patch.use_tailwind {
            component.use_tailwind = use_tailwind;
        }
        if let Some(is_public) = patch.is_public {
            component.is_public = is_public;
        }

        validate_code(&component.code, component.use_tailwind)?;
        component.updated_at = Utc::now();
        self.persist(component).await
    }

    pub async fn delete(&self, id: &str, author_id: &str) -> Result<(), ApiError> {
        self.require_owned(id, author_id).await?;
        if !self.store.delete(id).await? {
            return Err(ApiError::NotFound("Component not found".into()));
        }
        Ok(())
    }

    /// Idempotent toggle: a second call with the same user undoes the first.
    pub async fn toggle_like(&self, id: &str, user_id: &str) -> Result<UiComponent, ApiError> {
        let mut component = self.require(id).await?;

        if let Some(pos) = component.likes.iter().position(|u| u == user_id) {
            component.likes.remove(pos);
        } else {
            component.likes.push(user_id.to_string());
        }
        component.updated_at = Utc::now();
        self.persist(component).await
    }

    pub async fn increment_download(&self, id: &str) -> Result<UiComponent, ApiError> {
        let mut component = self.require(id).await?;
        component.downloads += 1;
        component.updated_at = Utc::now();
        self.persist(component).await
    }

    async fn require(&self, id: &str) -> Result<UiComponent, ApiError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Component not found".into()))
    }

    async fn require_owned(&self, id: &str, author_id: &str) -> Result<UiComponent, ApiError> {
        let component = self.require(id).await?;
        if component.author != author_id {
            return Err(ApiError::Forbidden(
                "Only the author can modify this component".into(),
            ));
        }
        Ok(component)
    }

    async fn persist(&self, component: UiComponent) -> Result<UiComponent, ApiError> {
        self.store
            .update(component)
            .await?
            .ok_or_else(|| ApiError::NotFound("Component not found".into()))
    }
}

fn matches_search(component: &UiComponent, needle: &str) -> bool {
    component.title.to_lowercase().contains(needle)
        || component.description.to_lowercase().contains(needle)
        || component
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(needle))
}

fn validate_code(code: &crate::models::CodeBundle, use_tailwind: bool) -> Result<(), ApiError> {
    if code.html.trim().is_empty() {
        return Err(ApiError::Validation("HTML code is required".into()));
    }
    if !use_tailwind && code.css.trim().is_empty() {
        return Err(ApiError::Validation(
            "CSS code is required unless the component uses Tailwind".into(),
        ));
    }
    Ok(())
}
