use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;

use bytes::Bytes;
use client::{format_bytes, AppState, Dashboard, PdfUpload, RegistryConfig};
use comfy_table::{presets::UTF8_HORIZONTAL_ONLY, Attribute, Cell, ContentArrangement, Table};
use kernel::{StoredFile, UsageStats};
use provider::{connect, HttpAuth, HttpFetcher, HttpStorage};

use super::error::CliError;
use super::settings::{Settings, PASSWORD_ENV};

type App = Dashboard<HttpAuth, HttpStorage, HttpFetcher>;

const TABLE_WIDTH: u16 = 120;
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Connects to the backend and restores the remembered session, loading its
/// files and stats. A session that cannot be restored leaves the app signed
/// out.
pub async fn open(settings: &Settings) -> Result<App, CliError> {
    let backend = connect(&settings.provider_config())?;
    let app = Dashboard::new(
        backend.auth,
        backend.storage,
        backend.fetcher,
        RegistryConfig::default(),
    );
    if let Err(e) = app.start().await {
        tracing::warn!("{e}");
    }
    Ok(app)
}

pub async fn sign_up(app: &App, email: &str, password: Option<&str>) -> Result<(), CliError> {
    let password = read_password(password)?;
    let outcome = app.sign_up(email, &password).await?;
    match &app.snapshot().notice {
        Some(notice) => println!("{notice}"),
        None => println!("Account {} registered", outcome.email),
    }
    Ok(())
}

pub async fn sign_in(app: &App, email: &str, password: Option<&str>) -> Result<(), CliError> {
    let password = read_password(password)?;
    let identity = app.sign_in(email, &password).await?;
    println!("Signed in as {}", identity.email);
    print_files(&app.snapshot().files);
    Ok(())
}

pub async fn sign_out(app: &App) -> Result<(), CliError> {
    app.sign_out().await?;
    println!("Signed out");
    Ok(())
}

pub fn who_am_i(app: &App) {
    match &app.snapshot().identity {
        Some(identity) => println!("{} ({})", identity.email, identity.id),
        None => println!("Not signed in"),
    }
}

pub fn list(app: &App) -> Result<(), CliError> {
    let state = app.snapshot();
    loaded(&state)?;
    print_files(&state.files);
    Ok(())
}

pub async fn upload(app: &App, file: &str) -> Result<(), CliError> {
    let path = Path::new(file);
    let data = tokio::fs::read(path).await.map_err(|source| CliError::Io {
        path: file.to_owned(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_owned();

    let stored = app
        .upload(Some(PdfUpload {
            file_name,
            content_type,
            data: Bytes::from(data),
        }))
        .await?;
    println!(
        "file {file} stored as {} ({})",
        stored.name,
        size(stored.size_bytes)
    );
    Ok(())
}

pub async fn import(app: &App, url: &str) -> Result<(), CliError> {
    let stored = app.import_from_url(url).await?;
    println!("{url} stored as {} ({})", stored.name, size(stored.size_bytes));
    Ok(())
}

pub async fn rename(app: &App, name: &str, to: &str) -> Result<(), CliError> {
    let file = find(app, name).await?;
    let renamed = app.rename(&file, to).await?;
    println!("{name} renamed to {}", renamed.name);
    Ok(())
}

pub async fn delete(app: &App, name: &str, yes: bool) -> Result<(), CliError> {
    let file = find(app, name).await?;
    let deleted = if yes {
        app.delete(&file, &|_: &str| true).await?
    } else {
        app.delete(&file, &ask).await?
    };
    if deleted {
        println!("{name} deleted");
    } else {
        println!("{name} kept");
    }
    Ok(())
}

pub fn stats(app: &App) -> Result<(), CliError> {
    let state = app.snapshot();
    loaded(&state)?;
    print_stats(&state.stats);
    Ok(())
}

async fn find(app: &App, name: &str) -> Result<StoredFile, CliError> {
    ensure_signed_in(app)?;
    if let Some(file) = app.find(name) {
        return Ok(file);
    }
    // the file may sit beyond the first page
    let mut offset = app.snapshot().files.len();
    loop {
        let page = app.registry().list_page(offset).await?;
        if page.is_empty() {
            return Err(CliError::NotFound(name.to_owned()));
        }
        offset += page.len();
        if let Some(file) = page.into_iter().find(|f| f.name == name) {
            return Ok(file);
        }
    }
}

fn ensure_signed_in(app: &App) -> Result<(), CliError> {
    if app.snapshot().is_signed_in() {
        Ok(())
    } else {
        Err(client::Error::NotAuthenticated.into())
    }
}

/// Files and stats were loaded by [`open`]; a failed load is reported
/// instead of fetching again.
fn loaded(state: &AppState) -> Result<(), CliError> {
    if !state.is_signed_in() {
        return Err(client::Error::NotAuthenticated.into());
    }
    match &state.last_error {
        Some(message) => Err(client::Error::Provider(message.clone()).into()),
        None => Ok(()),
    }
}

/// Password from the command line, then the environment, then stdin.
fn read_password(given: Option<&str>) -> Result<String, CliError> {
    if let Some(password) = pick_password(given, env::var(PASSWORD_ENV).ok()) {
        return Ok(password);
    }
    let stdin_error = |source| CliError::Io {
        path: String::from("stdin"),
        source,
    };
    eprint!("Password: ");
    io::stderr().flush().map_err(stdin_error)?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).map_err(stdin_error)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

fn pick_password(given: Option<&str>, from_env: Option<String>) -> Option<String> {
    given
        .map(str::to_owned)
        .filter(|p| !p.is_empty())
        .or_else(|| from_env.filter(|p| !p.is_empty()))
}

fn ask(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    is_yes(&answer)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn size(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    format_bytes(bytes as f64, 2)
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_HORIZONTAL_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(TABLE_WIDTH)
        .set_header(
            header
                .into_iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<Cell>>(),
        );
    table
}

fn print_files(files: &[StoredFile]) {
    if files.is_empty() {
        println!("No PDFs stored yet");
        return;
    }
    let mut table = new_table(vec!["Name", "Size", "Uploaded", "URL"]);
    for f in files {
        let uploaded = f
            .created_at
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&f.name),
            Cell::new(size(f.size_bytes)),
            Cell::new(uploaded),
            Cell::new(&f.url),
        ]);
    }
    println!("{table}");
}

fn print_stats(stats: &UsageStats) {
    let mut table = new_table(vec!["Total files", "Total storage", "Average size", "Last upload"]);
    let last_upload = stats
        .last_upload
        .map_or_else(|| String::from("-"), |d| d.format(DATE_FORMAT).to_string());
    table.add_row(vec![
        Cell::new(stats.total_files),
        Cell::new(size(stats.total_storage)),
        Cell::new(format_bytes(stats.avg_file_size, 2)),
        Cell::new(last_upload),
    ]);
    println!("{table}");
}
