//! Command-line interface for signal-ingress.
//!
//! Each subcommand is one user-triggered batch job. Failures are recovered
//! here at the stage boundary: reported with counts, stage aborted, flags
//! left in whatever state the last completed store call produced. Every
//! stage is independently restartable from the persisted flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config;
use crate::core::{DispatchEngine, MergeEngine, StageLog};
use crate::domain::schema::{
    COL_MERGE_STATUS_TAG, COL_MERGE_STATUS_TRANSCRIBE, COL_RECORD_ID, COL_SENT_FLAG,
    TABLE_MERGED, TABLE_TAG, TABLE_TRANSCRIBE,
};
use crate::domain::{MergeStatus, SendStatus};
use crate::ingest::{IngestStage, TranscriptFormatter, WhisperTranscriber};
use crate::notify::{GmailConfig, GmailSender};
use crate::store::{FileRowStore, RowStore};
use crate::tagging::{TagSession, TagStage};

/// signal-ingress - transcript ingestion, tagging, merge and dispatch
#[derive(Parser, Debug)]
#[command(name = "signal-ingress")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe media files and log them in the transcription stage log
    Ingest {
        /// Audio/video files to transcribe
        files: Vec<PathBuf>,

        /// Skip the LLM cleanup pass over the raw transcription
        #[arg(long)]
        raw: bool,
    },

    /// Record one tagging session for a transcript
    Tag {
        /// Record identifier of the tagged transcript
        record_id: String,

        /// Transcript title
        #[arg(short, long)]
        title: String,

        /// Who recorded, as `Name [ID]`
        #[arg(short, long, default_value = "")]
        who: String,

        /// Action items (newline-separated)
        #[arg(short, long, default_value = "")]
        actions: String,

        /// Existing contacts linked, each as `Name [ID]`
        #[arg(long)]
        contact: Vec<String>,

        /// Existing companies linked, each as `Name [ID]`
        #[arg(long)]
        company: Vec<String>,

        /// Newly created contacts, each as `Name [ID]`
        #[arg(long)]
        new_contact: Vec<String>,

        /// Newly created companies, each as `Name [ID]`
        #[arg(long)]
        new_company: Vec<String>,
    },

    /// Merge unmerged transcription/tagging pairs into the merged log
    Merge,

    /// Send one report covering every unsent merged row
    Report {
        /// Run a merge pass first, like the legacy one-button flow
        #[arg(long)]
        merge_first: bool,
    },

    /// Show per-log row and flag counts
    Status,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Ingest { files, raw } => cmd_ingest(files, *raw).await,
            Commands::Tag {
                record_id,
                title,
                who,
                actions,
                contact,
                company,
                new_contact,
                new_company,
            } => {
                cmd_tag(TagSession {
                    record_id: record_id.clone(),
                    transcript_title: title.clone(),
                    who_recorded: who.clone(),
                    action_items: actions.clone(),
                    contacts_linked: contact.clone(),
                    companies_linked: company.clone(),
                    contacts_created: new_contact.clone(),
                    companies_created: new_company.clone(),
                })
                .await
            }
            Commands::Merge => cmd_merge().await,
            Commands::Report { merge_first } => cmd_report(*merge_first).await,
            Commands::Status => cmd_status().await,
            Commands::Config => cmd_config(),
        }
    }
}

async fn open_store() -> Result<FileRowStore> {
    let dir = config::store_dir()?;
    FileRowStore::open(dir)
        .await
        .context("failed to open the row store")
}

async fn cmd_ingest(files: &[PathBuf], raw: bool) -> Result<()> {
    if files.is_empty() {
        anyhow::bail!("no files given");
    }

    let cfg = config::config()?;
    let store = open_store().await?;
    let stage = IngestStage::new(&store, config::transcripts_dir()?);
    let transcriber = WhisperTranscriber::new(&cfg.transcription.model);

    let formatter = if raw {
        None
    } else {
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY is not set (use --raw to skip formatting)")?;
        Some(TranscriptFormatter::new(api_key, &cfg.transcription.format_model))
    };

    let mut ok = 0usize;
    let mut failed = 0usize;
    for file in files {
        match stage
            .process_file(file, &transcriber, formatter.as_ref())
            .await
        {
            Ok(record) => {
                ok += 1;
                println!(
                    "Transcribed {} -> {} ({}s, transcript: {})",
                    file.display(),
                    record.record_id,
                    record.seconds_transcribed,
                    record.transcript_doc_link
                );
            }
            Err(e) => {
                failed += 1;
                eprintln!("Failed to ingest {}: {:#}", file.display(), e);
            }
        }
    }

    println!("{} transcription(s) complete, {} failed.", ok, failed);
    if failed > 0 {
        anyhow::bail!("{} file(s) failed to ingest", failed);
    }
    Ok(())
}

async fn cmd_tag(session: TagSession) -> Result<()> {
    let store = open_store().await?;
    let stage = TagStage::new(&store);
    let tagged_at = stage.record(&session).await?;
    println!(
        "Logged tagging session for {} at {}.",
        session.record_id, tagged_at
    );
    Ok(())
}

async fn cmd_merge() -> Result<()> {
    let store = open_store().await?;
    // The lock covers the whole read-modify-write cycle; the legacy
    // sheet-backed flow had no such guard and relied on one user at a time.
    let _guard = store.lock()?;

    let outcome = MergeEngine::new(&store).run().await?;
    if outcome.is_noop() {
        println!("No new data to merge.");
    } else {
        println!(
            "Merged {} pair(s) across {} identifier(s).",
            outcome.pairs_merged,
            outcome.identifiers.len()
        );
    }
    Ok(())
}

async fn cmd_report(merge_first: bool) -> Result<()> {
    let cfg = config::config()?;
    let store = open_store().await?;
    let _guard = store.lock()?;

    if merge_first {
        let outcome = MergeEngine::new(&store).run().await?;
        if !outcome.is_noop() {
            println!("Merged {} pair(s).", outcome.pairs_merged);
        }
    }

    let access_token = std::env::var("GMAIL_ACCESS_TOKEN")
        .context("GMAIL_ACCESS_TOKEN is not set")?;
    let sender = GmailSender::new(GmailConfig {
        access_token,
        sender: cfg.report.sender.clone(),
        recipient: cfg.report.recipient.clone(),
    });

    let engine = DispatchEngine::new(&store, &sender, &cfg.report.portal_id);
    let outcome = engine.run().await?;
    if outcome.is_noop() {
        println!("No new rows to send.");
    } else {
        println!("Email sent for {} entries.", outcome.sent);
    }
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let store = open_store().await?;

    let transcribe = StageLog::new(
        &store,
        TABLE_TRANSCRIBE,
        COL_RECORD_ID,
        COL_MERGE_STATUS_TRANSCRIBE,
    )
    .read_all()
    .await?;
    let tags = StageLog::new(&store, TABLE_TAG, COL_RECORD_ID, COL_MERGE_STATUS_TAG)
        .read_all()
        .await?;
    let merged = store.read_table(TABLE_MERGED).await?;

    let count_unmerged = |table: &crate::store::Table, flag: &str| {
        let idx = table.column_index(flag);
        table
            .rows
            .iter()
            .filter(|r| {
                MergeStatus::from_cell(idx.map(|i| r[i].as_str())) == MergeStatus::Unmerged
            })
            .count()
    };

    let sent_idx = merged.column_index(COL_SENT_FLAG);
    let unsent = merged
        .rows
        .iter()
        .filter(|r| {
            SendStatus::from_cell(sent_idx.map(|i| r[i].as_str())) == Some(SendStatus::Unsent)
        })
        .count();

    println!(
        "{}: {} row(s), {} unmerged",
        TABLE_TRANSCRIBE,
        transcribe.rows.len(),
        count_unmerged(&transcribe, COL_MERGE_STATUS_TRANSCRIBE)
    );
    println!(
        "{}: {} row(s), {} unmerged",
        TABLE_TAG,
        tags.rows.len(),
        count_unmerged(&tags, COL_MERGE_STATUS_TAG)
    );
    println!(
        "{}: {} row(s), {} unsent",
        TABLE_MERGED,
        merged.rows.len(),
        unsent
    );
    Ok(())
}

fn cmd_config() -> Result<()> {
    let cfg = config::config()?;
    println!("home:      {}", cfg.home.display());
    println!("store:     {}", cfg.store.display());
    match &cfg.config_file {
        Some(path) => println!("config:    {}", path.display()),
        None => println!("config:    (none found, using defaults)"),
    }
    println!("sender:    {}", cfg.report.sender);
    println!("recipient: {}", cfg.report.recipient);
    println!("portal:    {}", cfg.report.portal_id);
    println!("model:     {}", cfg.transcription.model);
    Ok(())
}
