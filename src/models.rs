use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The closed set of component categories. "All" is a filter sentinel used in
/// listing queries only and is never stored on a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Buttons,
    Checkboxes,
    #[serde(rename = "Toggle switches")]
    ToggleSwitches,
    Cards,
    Loaders,
    Inputs,
    #[serde(rename = "Radio buttons")]
    RadioButtons,
    Forms,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Buttons,
        Category::Checkboxes,
        Category::ToggleSwitches,
        Category::Cards,
        Category::Loaders,
        Category::Inputs,
        Category::RadioButtons,
        Category::Forms,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Buttons" => Some(Category::Buttons),
            "Checkboxes" => Some(Category::Checkboxes),
            "Toggle switches" => Some(Category::ToggleSwitches),
            "Cards" => Some(Category::Cards),
            "Loaders" => Some(Category::Loaders),
            "Inputs" => Some(Category::Inputs),
            "Radio buttons" => Some(Category::RadioButtons),
            "Forms" => Some(Category::Forms),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Buttons => "Buttons",
            Category::Checkboxes => "Checkboxes",
            Category::ToggleSwitches => "Toggle switches",
            Category::Cards => "Cards",
            Category::Loaders => "Loaders",
            Category::Inputs => "Inputs",
            Category::RadioButtons => "Radio buttons",
            Category::Forms => "Forms",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeBundle {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub js: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiComponent {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub code: CodeBundle,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub use_tailwind: bool,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub likes: Vec<String>,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl UiComponent {
    pub fn new(payload: CreateComponentRequest, author: String) -> Self {
        let now = Utc::now();
        let category = payload.category;

        let title = match payload.title.map(|t| t.trim().to_string()) {
            Some(t) if !t.is_empty() => t,
            _ => format!("Component {}", now.timestamp_millis()),
        };
        let description = match payload.description.map(|d| d.trim().to_string()) {
            Some(d) if !d.is_empty() => d,
            _ => format!("UI Component in {} category", category),
        };

        Self {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            category,
            code: payload.code,
            preview: payload.preview.unwrap_or_default(),
            tags: payload.tags.unwrap_or_default(),
            use_tailwind: payload.use_tailwind,
            is_public: payload.is_public.unwrap_or(true),
            downloads: 0,
            likes: Vec::new(),
            author,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComponentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Category,
    pub code: CodeBundle,
    pub preview: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub use_tailwind: bool,
    pub is_public: Option<bool>,
}

/// Partial update applied by the component's author. Absent fields are left
/// untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateComponentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub code: Option<CodeBundle>,
    pub preview: Option<String>,
    pub tags: Option<Vec<String>>,
    pub use_tailwind: Option<bool>,
    pub is_public: Option<bool>,
}

/// A component as returned to clients, with per-caller access flags attached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentView {
    #[serde(flatten)]
    pub component: UiComponent,
    pub is_owner: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl ComponentView {
    pub fn for_caller(component: UiComponent, caller: Option<&str>) -> Self {
        let is_owner = caller.is_some_and(|id| id == component.author);
        Self {
            component,
            is_owner,
            can_edit: is_owner,
            can_delete: is_owner,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentPage {
    pub components: Vec<UiComponent>,
    pub total_pages: u32,
    pub current_page: u32,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
