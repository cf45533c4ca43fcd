use clap::{Parser, ValueEnum};
use std::time::Duration;

/// Columns the demo people table can be sorted by
pub const SORT_FIELDS: [&str; 3] = ["id", "name", "age"];

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// SQLite database through sqlx
    Sqlite,
    /// In-process document collection
    Memory,
}

/// listquery - paginated list queries over pluggable backends
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Storage backend to query
    #[arg(
        short = 'b',
        long,
        value_enum,
        env = "LISTQUERY_BACKEND",
        default_value = "sqlite"
    )]
    pub backend: BackendKind,

    /// SQLite connection URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite::memory:")]
    pub database_url: String,

    /// Offset of the first row
    #[arg(short = 's', long, default_value = "0")]
    pub start: u32,

    /// Page size; values below 1 fall back to the default page size
    #[arg(short = 'l', long, default_value = "10")]
    pub limit: u32,

    /// Skip the total count query
    #[arg(long)]
    pub no_total: bool,

    /// Return every matching row instead of one page
    #[arg(long)]
    pub no_pagination: bool,

    /// Only people with exactly this name
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Only people at least this old
    #[arg(long)]
    pub min_age: Option<u32>,

    /// Sort field (id, name or age)
    #[arg(long, default_value = "id")]
    pub sort: String,

    /// Sort descending
    #[arg(short = 'd', long)]
    pub descending: bool,

    /// Query timeout in milliseconds
    #[arg(long, env = "LISTQUERY_TIMEOUT_MS", default_value = "5000")]
    pub timeout_ms: u64,

    /// Turn task panics into empty results instead of errors
    #[arg(long)]
    pub absorb_panics: bool,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend == BackendKind::Sqlite {
            validate_database_url(&self.database_url)?;
        }

        validate_sort_field(&self.sort)?;

        if let Some(ref name) = self.name {
            validate_name(name)?;
        }

        if self.timeout_ms == 0 {
            anyhow::bail!("Timeout must be greater than 0");
        }

        Ok(())
    }

    /// Get query timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Validate the SQLite connection URL scheme
pub fn validate_database_url(url: &str) -> anyhow::Result<()> {
    if url.is_empty() {
        anyhow::bail!("Database URL cannot be empty");
    }

    if !url.starts_with("sqlite:") {
        anyhow::bail!("Database URL must use the sqlite: scheme");
    }

    Ok(())
}

/// Validate a sort field against the known columns
pub fn validate_sort_field(field: &str) -> anyhow::Result<()> {
    if !SORT_FIELDS.contains(&field) {
        anyhow::bail!(
            "Unknown sort field '{}', expected one of: {}",
            field,
            SORT_FIELDS.join(", ")
        );
    }

    Ok(())
}

/// Validate a name filter
pub fn validate_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() {
        anyhow::bail!("Name filter cannot be empty");
    }

    if name.len() > 64 {
        anyhow::bail!("Name filter cannot exceed 64 characters");
    }

    // Check for control characters
    if name.chars().any(|c| c.is_control()) {
        anyhow::bail!("Name filter contains invalid characters");
    }

    Ok(())
}
