use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const SESSION_FILE: &str = ".uiforge-session";

fn api_url() -> String {
    std::env::var("UIFORGE_API").unwrap_or_else(|_| "http://localhost:5002".to_string())
}

#[derive(Parser)]
#[command(name = "uiforge")]
#[command(about = "A CLI client for the UI Forge component library", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a new account")]
    Signup {
        #[arg(long, help = "Full name")]
        name: String,
        #[arg(short, long, help = "Username")]
        username: String,
        #[arg(short, long, help = "Email address")]
        email: String,
        #[arg(short, long, help = "Password")]
        password: String,
    },

    #[command(about = "Log in to your account")]
    Login {
        #[arg(short, long, help = "Email address")]
        email: String,
        #[arg(short, long, help = "Password")]
        password: String,
    },

    #[command(about = "Log out of your account")]
    Logout,

    #[command(about = "Show the logged-in user")]
    Whoami,

    #[command(about = "Browse published components")]
    Browse {
        #[arg(short, long, help = "Category filter (e.g. Buttons, Forms, All)")]
        category: Option<String>,
        #[arg(short, long, help = "Free-text search")]
        search: Option<String>,
        #[arg(short, long, default_value_t = 1, help = "Page number")]
        page: u32,
        #[arg(short, long, default_value_t = 12, help = "Page size")]
        limit: u32,
    },

    #[command(about = "Show one component, code included")]
    View {
        #[arg(help = "Component id")]
        id: String,
    },

    #[command(about = "Upload a component from files on disk")]
    Upload {
        #[arg(short, long, help = "Component title")]
        title: String,
        #[arg(short, long, help = "Component description")]
        description: String,
        #[arg(short, long, help = "Category (e.g. Buttons, Cards)")]
        category: String,
        #[arg(long, help = "Path to the HTML file")]
        html: String,
        #[arg(long, help = "Path to the CSS file")]
        css: Option<String>,
        #[arg(long, help = "Path to the JS file")]
        js: Option<String>,
        #[arg(long, help = "The component relies on Tailwind instead of bundled CSS")]
        tailwind: bool,
        #[arg(long, value_delimiter = ',', help = "Comma-separated tags")]
        tags: Vec<String>,
    },

    #[command(about = "Like or unlike a component")]
    Like {
        #[arg(help = "Component id")]
        id: String,
    },

    #[command(about = "Download a component's code into the current directory")]
    Download {
        #[arg(help = "Component id")]
        id: String,
    },

    #[command(about = "Delete one of your components")]
    Delete {
        #[arg(help = "Component id")]
        id: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Session {
    token: String,
    username: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    user: Profile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    id: String,
    username: String,
    email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeBundle {
    #[serde(default)]
    html: String,
    #[serde(default)]
    css: String,
    #[serde(default)]
    js: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Component {
    id: String,
    title: String,
    description: String,
    category: String,
    code: CodeBundle,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    likes: Vec<String>,
    #[serde(default)]
    downloads: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComponentPage {
    components: Vec<Component>,
    total_pages: u32,
    current_page: u32,
    total: usize,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Signup {
            name,
            username,
            email,
            password,
        } => signup(name, username, email, password).await,
        Commands::Login { email, password } => login(email, password).await,
        Commands::Logout => logout(),
        Commands::Whoami => whoami(),
        Commands::Browse {
            category,
            search,
            page,
            limit,
        } => browse(category, search, page, limit).await,
        Commands::View { id } => view(id).await,
        Commands::Upload {
            title,
            description,
            category,
            html,
            css,
            js,
            tailwind,
            tags,
        } => upload(title, description, category, html, css, js, tailwind, tags).await,
        Commands::Like { id } => like(id).await,
        Commands::Download { id } => download(id).await,
        Commands::Delete { id } => delete(id).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

fn save_session(auth: &AuthResponse) -> Result<()> {
    let session = Session {
        token: auth.token.clone(),
        username: auth.user.username.clone(),
        user_id: auth.user.id.clone(),
    };
    let json = serde_json::to_string_pretty(&session).context("Failed to serialize session")?;
    fs::write(SESSION_FILE, json).context("Failed to write session file")?;
    Ok(())
}

fn load_session() -> Result<Session> {
    if !Path::new(SESSION_FILE).exists() {
        bail!("Not logged in. Run `uiforge login` first.");
    }
    let data = fs::read_to_string(SESSION_FILE).context("Failed to read session file")?;
    serde_json::from_str(&data).context("Failed to parse session file")
}

async fn fail_with_message(response: reqwest::Response, what: &str) -> anyhow::Error {
    let status = response.status();
    let message = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| status.to_string());
    anyhow::anyhow!("{what}: {message}")
}

async fn signup(name: String, username: String, email: String, password: String) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/auth/signup", api_url()))
        .json(&serde_json::json!({
            "fullName": name,
            "username": username,
            "email": email,
            "password": password,
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(fail_with_message(response, "Signup failed").await);
    }

    let auth: AuthResponse = response.json().await?;
    save_session(&auth)?;
    println!("✅ Account created. Logged in as {}", auth.user.username);
    Ok(())
}

async fn login(email: String, password: String) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/auth/login", api_url()))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(fail_with_message(response, "Login failed").await);
    }

    let auth: AuthResponse = response.json().await?;
    save_session(&auth)?;
    println!("✅ Logged in as {} ({})", auth.user.username, auth.user.email);
    Ok(())
}

fn logout() -> Result<()> {
    if Path::new(SESSION_FILE).exists() {
        fs::remove_file(SESSION_FILE).context("Failed to remove session file")?;
        println!("✅ Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

fn whoami() -> Result<()> {
    let session = load_session()?;
    println!("Logged in as {} (id {})", session.username, session.user_id);
    Ok(())
}

async fn browse(
    category: Option<String>,
    search: Option<String>,
    page: u32,
    limit: u32,
) -> Result<()> {
    let client = reqwest::Client::new();
    let mut query: Vec<(&str, String)> =
        vec![("page", page.to_string()), ("limit", limit.to_string())];
    if let Some(category) = category {
        query.push(("category", category));
    }
    if let Some(search) = search {
        query.push(("search", search));
    }

    let response = client
        .get(format!("{}/api/ui-components", api_url()))
        .query(&query)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(fail_with_message(response, "Failed to fetch components").await);
    }

    let result: ComponentPage = response.json().await?;
    if result.components.is_empty() {
        println!("📭 No components found.");
        return Ok(());
    }

    println!(
        "\n📋 Components (page {}/{}, {} total)\n",
        result.current_page,
        result.total_pages.max(1),
        result.total
    );

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Title"),
        Cell::new("Category"),
        Cell::new("Likes"),
        Cell::new("Downloads"),
        Cell::new("Tags"),
    ]));

    for component in result.components {
        table.add_row(Row::new(vec![
            Cell::new(&component.id[..component.id.len().min(8)]),
            Cell::new(&component.title),
            Cell::new(&component.category),
            Cell::new(&component.likes.len().to_string()),
            Cell::new(&component.downloads.to_string()),
            Cell::new(&component.tags.join(", ")),
        ]));
    }

    table.printstd();
    println!();
    Ok(())
}

async fn view(id: String) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/api/ui-components/{id}", api_url()))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(fail_with_message(response, "Failed to fetch component").await);
    }

    let component: Component = response.json().await?;
    println!("\n🧩 {} [{}]", component.title, component.category);
    println!("   {}", component.description);
    println!(
        "   ❤ {}  ⬇ {}  tags: {}",
        component.likes.len(),
        component.downloads,
        component.tags.join(", ")
    );
    println!("\n--- HTML ---\n{}", component.code.html);
    if !component.code.css.is_empty() {
        println!("\n--- CSS ---\n{}", component.code.css);
    }
    if !component.code.js.is_empty() {
        println!("\n--- JS ---\n{}", component.code.js);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn upload(
    title: String,
    description: String,
    category: String,
    html: String,
    css: Option<String>,
    js: Option<String>,
    tailwind: bool,
    tags: Vec<String>,
) -> Result<()> {
    let session = load_session()?;

    let html_code = fs::read_to_string(&html)
        .with_context(|| format!("Failed to read HTML file {html}"))?;
    let css_code = match &css {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Failed to read CSS file {path}"))?
        }
        None => String::new(),
    };
    let js_code = match &js {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Failed to read JS file {path}"))?
        }
        None => String::new(),
    };

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/ui-components", api_url()))
        .bearer_auth(&session.token)
        .json(&serde_json::json!({
            "title": title,
            "description": description,
            "category": category,
            "code": { "html": html_code, "css": css_code, "js": js_code },
            "useTailwind": tailwind,
            "tags": tags,
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(fail_with_message(response, "Upload failed").await);
    }

    let component: Component = response.json().await?;
    println!("✅ Uploaded \"{}\"", component.title);
    println!("   ID: {}", component.id);
    Ok(())
}

async fn like(id: String) -> Result<()> {
    let session = load_session()?;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/ui-components/{id}/like", api_url()))
        .bearer_auth(&session.token)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(fail_with_message(response, "Like failed").await);
    }

    let component: Component = response.json().await?;
    let state = if component.likes.contains(&session.user_id) {
        "liked"
    } else {
        "unliked"
    };
    println!(
        "✅ You {state} \"{}\" ({} likes now)",
        component.title,
        component.likes.len()
    );
    Ok(())
}

async fn download(id: String) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/ui-components/{id}/download", api_url()))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(fail_with_message(response, "Download failed").await);
    }

    let component: Component = response.json().await?;
    let stem = component
        .title
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric(), "-");

    fs::write(format!("{stem}.html"), &component.code.html)?;
    println!("✅ Wrote {stem}.html");
    if !component.code.css.is_empty() {
        fs::write(format!("{stem}.css"), &component.code.css)?;
        println!("✅ Wrote {stem}.css");
    }
    if !component.code.js.is_empty() {
        fs::write(format!("{stem}.js"), &component.code.js)?;
        println!("✅ Wrote {stem}.js");
    }
    Ok(())
}

async fn delete(id: String) -> Result<()> {
    let session = load_session()?;
    let client = reqwest::Client::new();
    let response = client
        .delete(format!("{}/api/ui-components/{id}", api_url()))
        .bearer_auth(&session.token)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(fail_with_message(response, "Delete failed").await);
    }

    println!("✅ Component deleted.");
    Ok(())
}
