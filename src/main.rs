//! drive_api CLI - Folder-aware operations on Google Drive.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glob::glob;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use drive_api::{
    Authenticator, DriveClient, DriveError, MoveMode, RemoteObject, TransferHandle,
};

/// CLI tool for folder-aware operations on Google Drive.
#[derive(Parser)]
#[command(name = "drive_api")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a service account or authorized user JSON credentials file.
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Pre-obtained OAuth2 access token; takes precedence over --credentials.
    #[arg(long, env = "DRIVE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every file visible to the account.
    List,

    /// List the files inside a folder.
    Ls {
        /// Folder name (case-insensitive).
        folder: String,
    },

    /// Upload files, optionally into a folder.
    Upload {
        /// Files or glob patterns to upload (e.g. *.pdf).
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Destination folder name.
        #[arg(long, short = 't')]
        to: Option<String>,
    },

    /// Download a file to the local filesystem.
    Download {
        #[command(flatten)]
        target: FileTarget,

        /// Local destination directory.
        #[arg(long, short = 't', default_value = ".")]
        to: PathBuf,
    },

    /// Place a file from one folder into another.
    Copy {
        /// Source folder name.
        from: String,
        /// Destination folder name.
        to: String,
        /// File name inside the source folder.
        file: String,

        #[arg(long, value_enum, default_value_t = ModeArg::Add)]
        mode: ModeArg,
    },

    /// Show a file's metadata and parent folders.
    Info {
        #[command(flatten)]
        target: FileTarget,
    },

    /// Find files whose name, id, type, extension or creation time occur in the query.
    Search {
        query: String,
    },

    /// Replace a file's content and name with a local file.
    Update {
        /// Id of the file to replace.
        file_id: String,
        /// Local file with the new content.
        path: PathBuf,
    },
}

#[derive(clap::Args)]
#[group(required = true, multiple = false)]
struct FileTarget {
    /// File name (case-insensitive).
    #[arg(long)]
    name: Option<String>,

    /// File id.
    #[arg(long)]
    id: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Keep the file in the source folder and add the destination.
    Add,
    /// Remove the file from the source folder.
    Replace,
    /// Create a separate copy in the destination.
    Duplicate,
}

impl From<ModeArg> for MoveMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Add => MoveMode::AddParent,
            ModeArg::Replace => MoveMode::ReplaceParent,
            ModeArg::Duplicate => MoveMode::Duplicate,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

fn authenticator(cli: &Cli) -> Result<Authenticator> {
    if let Some(token) = &cli.access_token {
        return Ok(Authenticator::from_access_token(token.clone()));
    }

    let path = cli.credentials.as_ref().ok_or_else(|| {
        DriveError::MissingEnvVar("GOOGLE_APPLICATION_CREDENTIALS or DRIVE_ACCESS_TOKEN".to_string())
    })?;

    Authenticator::from_file(path)
        .with_context(|| format!("Failed to load credentials from {:?}", path))
}

fn print_objects(objects: &[RemoteObject]) {
    println!("{:<44} {:>10} {:<30} {}", "ID", "SIZE", "TYPE", "NAME");
    println!("{}", "-".repeat(100));
    for object in objects {
        println!("{}", object);
    }
}

/// Expand the upload arguments into the list of local files to send.
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        let matches: Vec<PathBuf> = glob(pattern)
            .with_context(|| format!("Invalid glob pattern: {}", pattern))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();

        if matches.is_empty() {
            tracing::warn!(pattern = %pattern, "no files matched");
        }
        files.extend(matches);
    }

    files.sort();
    files.dedup();
    Ok(files)
}

async fn wait_reporting<T>(label: &str, handle: TransferHandle<T>) -> drive_api::Result<T>
where
    T: Send + 'static,
{
    let mut progress = handle.subscribe();
    let label = label.to_string();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let p = *progress.borrow_and_update();
            if let Some(total) = p.total_bytes.filter(|t| *t > 0) {
                tracing::debug!(
                    file = %label,
                    percent = p.bytes_transferred * 100 / total,
                    "transfer progress"
                );
            }
            if p.is_terminal() {
                break;
            }
        }
    });

    let result = handle.wait().await;
    reporter.abort();
    result
}

/// Upload every file in turn, reporting each outcome.
///
/// Keeps going after a failure and errors at the end if any upload failed.
async fn upload_all(client: &DriveClient, files: &[PathBuf], to: Option<&str>) -> Result<()> {
    let total = files.len();
    let mut failed = 0;

    for (idx, path) in files.iter().enumerate() {
        let label = path.display().to_string();
        println!("[{}/{}] Uploading {}...", idx + 1, total, label);

        let handle = match to {
            Some(folder) => client.upload_file_to_folder(folder, path).await,
            None => client.upload_file(path).await,
        };

        let uploaded = match handle {
            Ok(handle) => wait_reporting(&label, handle).await,
            Err(e) => Err(e),
        };
        match uploaded {
            Ok(created) => println!("  OK ({})", created.id),
            Err(e) => {
                tracing::error!(file = %label, error = %e, "upload failed");
                eprintln!("  FAILED: {}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} uploads failed", failed, total);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let client = DriveClient::new(authenticator(&cli)?);

    match cli.command {
        Commands::List => {
            let files = client.list_files().await.context("Failed to list files")?;
            if files.is_empty() {
                println!("No files found.");
            } else {
                print_objects(&files);
            }
        }

        Commands::Ls { folder } => {
            let files = client
                .list_folder(&folder)
                .await
                .with_context(|| format!("Failed to list folder: {}", folder))?;
            print_objects(&files);
        }

        Commands::Upload { patterns, to } => {
            let files = expand_patterns(&patterns)?;
            if files.is_empty() {
                anyhow::bail!("No files to upload");
            }

            upload_all(&client, &files, to.as_deref()).await?;
            println!("Done.");
        }

        Commands::Download { target, to } => {
            tokio::fs::create_dir_all(&to)
                .await
                .with_context(|| format!("Failed to create directory: {:?}", to))?;

            let (label, handle) = match (target.name, target.id) {
                (Some(name), _) => {
                    let handle = client.download_by_name(&name, &to).await;
                    (name, handle)
                }
                (None, Some(id)) => {
                    let handle = client.download_by_id(&id, &to).await;
                    (id, handle)
                }
                (None, None) => anyhow::bail!("Either --name or --id is required"),
            };

            let handle = handle.with_context(|| format!("Failed to locate file: {}", label))?;
            let path = wait_reporting(&label, handle)
                .await
                .with_context(|| format!("Failed to download file: {}", label))?;

            println!("Saved to: {:?}", path);
        }

        Commands::Copy {
            from,
            to,
            file,
            mode,
        } => {
            let object = client
                .move_file_with(&from, &to, &file, mode.into())
                .await
                .with_context(|| format!("Failed to copy {} from {} to {}", file, from, to))?;

            println!("{}", object);
            println!("Parents: {}", object.parents.join(", "));
        }

        Commands::Info { target } => {
            let metadata = match (target.name, target.id) {
                (Some(name), _) => client.describe_by_name(&name).await,
                (None, Some(id)) => client.describe_by_id(&id).await,
                (None, None) => anyhow::bail!("Either --name or --id is required"),
            }
            .context("Failed to describe file")?;

            println!("{}", metadata);
        }

        Commands::Search { query } => {
            let files = client
                .search(&query)
                .await
                .with_context(|| format!("Search failed: {}", query))?;
            print_objects(&files);
        }

        Commands::Update { file_id, path } => {
            let handle = client
                .update_file(&file_id, &path)
                .await
                .with_context(|| format!("Failed to update file: {}", file_id))?;

            let updated = wait_reporting(&path.display().to_string(), handle)
                .await
                .with_context(|| format!("Failed to upload new content for: {}", file_id))?;

            println!("{}", updated);
        }
    }

    Ok(())
}
