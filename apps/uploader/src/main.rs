//! Command-line uploader for the coaching library.

mod config;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use coachlib_protocol::types::Category;
use coachlib_transfer::{ResourceMetadata, default_title};
use coachlib_upload::{
    HttpBackend, HttpTransporter, UploadError, UploadEvent, UploadFailure, UploadOrchestrator,
    UploadOutcome, UploadRequest,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use config::UploaderConfig;

#[derive(Debug, Parser)]
#[command(name = "coachlib-uploader", version, about = "Upload a file to the coaching library")]
struct Args {
    /// File to upload.
    file: PathBuf,

    /// Library section: videos, images, articles or sounds.
    #[arg(short, long, default_value = "videos")]
    category: Category,

    /// Resource title. Defaults to the file name up to its first '.'.
    #[arg(long)]
    title: Option<String>,

    #[arg(long, default_value = "")]
    description: String,

    /// Only recorded for articles.
    #[arg(long, default_value = "")]
    author: String,

    #[arg(long)]
    folder_id: Option<String>,

    /// Overrides the type guessed from the file extension.
    #[arg(long)]
    mime_type: Option<String>,

    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    max_parallel: Option<usize>,

    #[arg(long)]
    max_retries: Option<u32>,

    /// Config file (default: <config dir>/coachlib/uploader.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply_overrides(&self, cfg: &mut UploaderConfig) {
        if let Some(url) = &self.base_url {
            cfg.base_url = url.clone();
        }
        if let Some(n) = self.max_parallel {
            cfg.max_parallel = n;
        }
        if let Some(n) = self.max_retries {
            cfg.max_retries = n;
        }
    }

    fn upload_request(&self) -> UploadRequest {
        let title = self.title.clone().unwrap_or_else(|| {
            let name = self
                .file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            default_title(&name)
        });
        UploadRequest {
            file: Some(self.file.clone()),
            mime_type: self.mime_type.clone(),
            category: self.category,
            metadata: ResourceMetadata {
                title,
                description: self.description.clone(),
                author: self.author.clone(),
                folder_id: self.folder_id.clone(),
            },
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info,coachlib=debug" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut cfg = UploaderConfig::load(args.config.as_deref());
    args.apply_overrides(&mut cfg);

    let backend = HttpBackend::new(&cfg.base_url, cfg.auth_token.as_deref(), cfg.api_timeout())
        .context("failed to create backend client")?;
    let mut orch = UploadOrchestrator::new(
        Arc::new(backend),
        Arc::new(HttpTransporter::new()),
        cfg.upload_config(),
    );

    let events = orch.take_events().context("event receiver already taken")?;
    let printer = tokio::spawn(print_events(events));

    let cancel = orch.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling upload");
            cancel.cancel();
        }
    });

    let outcome = orch.run(args.upload_request()).await;

    let outcome = match outcome {
        UploadOutcome::Failed(UploadFailure {
            error: UploadError::Completion { message, pending },
            retries,
        }) => {
            eprintln!("{message}");
            eprintln!("All bytes are stored; resubmitting finalize.");
            match orch.retry_finalize(*pending).await {
                Ok(resource) => UploadOutcome::Succeeded(resource),
                Err(error) => UploadOutcome::Failed(UploadFailure { error, retries }),
            }
        }
        other => other,
    };

    drop(orch);
    let _ = printer.await;

    match outcome {
        UploadOutcome::Succeeded(resource) => {
            println!("{}", resource.url);
            Ok(())
        }
        UploadOutcome::Cancelled => anyhow::bail!("Upload cancelled"),
        UploadOutcome::Failed(failure) => anyhow::bail!("{failure}"),
    }
}

async fn print_events(mut rx: mpsc::Receiver<UploadEvent>) {
    let mut stderr = std::io::stderr();
    while let Some(event) = rx.recv().await {
        match event {
            UploadEvent::StateChanged(status) => {
                let _ = writeln!(stderr, "\n[{status}]");
            }
            UploadEvent::Progress { percent } => {
                let _ = write!(stderr, "\r{percent:6.1}%");
                let _ = stderr.flush();
            }
            UploadEvent::Retrying {
                step,
                attempt,
                max_retries,
                delay,
            } => {
                let _ = writeln!(
                    stderr,
                    "\n{step}: retrying {attempt}/{max_retries} in {}ms",
                    delay.as_millis()
                );
            }
            UploadEvent::PartCompleted { part_number } => {
                tracing::debug!(part_number, "part stored");
            }
            UploadEvent::Finished(_) => {
                let _ = writeln!(stderr);
            }
        }
    }
}
