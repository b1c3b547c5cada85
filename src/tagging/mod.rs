//! Tagging stage: records human tagging sessions against transcripts.
//!
//! One log row is appended per tagging session. A transcript may be tagged
//! more than once; each session is its own row and its own join candidate
//! in the merge, so every tagging pass produces its own report entry.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::domain::schema::{TABLE_TAG, TAG_HEADER, TIMESTAMP_FORMAT};
use crate::domain::FLAG_UNSET;
use crate::ingest::ensure_table;
use crate::store::RowStore;

/// One human tagging session for a transcript.
///
/// Entity fields hold `Name [ID]` strings, matching the CRM-linked format
/// the report renderer parses back out.
#[derive(Debug, Clone, Default)]
pub struct TagSession {
    /// Record identifier of the tagged transcript
    pub record_id: String,

    pub transcript_title: String,
    pub who_recorded: String,
    pub action_items: String,
    pub contacts_linked: Vec<String>,
    pub companies_linked: Vec<String>,
    pub contacts_created: Vec<String>,
    pub companies_created: Vec<String>,
}

/// Tagging stage over a row store
pub struct TagStage<'a, S: RowStore> {
    store: &'a S,
}

impl<'a, S: RowStore> TagStage<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Append one tagging-session row to the stage log.
    /// Returns the session timestamp written to `datetime_tagged`.
    pub async fn record(&self, session: &TagSession) -> Result<String> {
        if session.record_id.is_empty() {
            anyhow::bail!("tagging session has no record identifier");
        }

        ensure_table(self.store, TABLE_TAG, TAG_HEADER).await?;

        let datetime_tagged = Utc::now().format(TIMESTAMP_FORMAT).to_string();

        let mut cells = HashMap::new();
        cells.insert("gd_transcript_file_id".to_string(), session.record_id.clone());
        cells.insert("datetime_tagged".to_string(), datetime_tagged.clone());
        cells.insert(
            "transcript_title".to_string(),
            session.transcript_title.clone(),
        );
        cells.insert("who_recorded".to_string(), session.who_recorded.clone());
        cells.insert("action_items".to_string(), session.action_items.clone());
        cells.insert(
            "contacts_linked".to_string(),
            session.contacts_linked.join(", "),
        );
        cells.insert(
            "companies_linked".to_string(),
            session.companies_linked.join(", "),
        );
        cells.insert(
            "contacts_created".to_string(),
            session.contacts_created.join(", "),
        );
        cells.insert(
            "companies_created".to_string(),
            session.companies_created.join(", "),
        );
        cells.insert("merge_status_tag".to_string(), FLAG_UNSET.to_string());
        cells.insert(
            "num_contacts_linked".to_string(),
            session.contacts_linked.len().to_string(),
        );
        cells.insert(
            "num_companies_linked".to_string(),
            session.companies_linked.len().to_string(),
        );
        cells.insert(
            "num_contacts_created".to_string(),
            session.contacts_created.len().to_string(),
        );
        cells.insert(
            "num_companies_created".to_string(),
            session.companies_created.len().to_string(),
        );

        let row = TAG_HEADER
            .iter()
            .map(|c| cells.remove(*c).unwrap_or_default())
            .collect();

        self.store
            .append_rows(TABLE_TAG, vec![row])
            .await
            .context("failed to append tagging row")?;
        info!(table = TABLE_TAG, record_id = %session.record_id, "tagging session logged");

        Ok(datetime_tagged)
    }
}
