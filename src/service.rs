use chrono::{DateTime, Utc};

use crate::error::DataLoadError;
use crate::filter;
use crate::normalize;
use crate::store::models::{EmailRecord, FilterCriteria, LoadSummary, ResponseRecord};
use crate::store::{RawDocument, ResultStore};

/// Owner of the in-memory record collections. Every other component
/// receives borrowed slices or copies, never mutable access.
pub struct DataService {
    store: ResultStore,
    responses: Vec<ResponseRecord>,
    emails: Vec<EmailRecord>,
    criteria: FilterCriteria,
    filtered: Option<Vec<ResponseRecord>>,
}

impl DataService {
    pub fn new(store: ResultStore) -> Self {
        Self {
            store,
            responses: Vec::new(),
            emails: Vec::new(),
            criteria: FilterCriteria::default(),
            filtered: None,
        }
    }

    /// Reload both record kinds from disk.
    ///
    /// Normalization happens before anything is swapped in, so consumers
    /// never observe a half-updated state. Fails only when both stores
    /// fail outright; a single failed store keeps its last-known-good
    /// collection and is logged.
    pub async fn load_data(&mut self) -> Result<LoadSummary, DataLoadError> {
        let read_at = Utc::now();

        let raw_responses = self.store.load_responses().await;
        let raw_emails = self.store.load_emails().await;

        let (raw_responses, raw_emails) = match (raw_responses, raw_emails) {
            (Err(responses), Err(emails)) => return Err(DataLoadError { responses, emails }),
            (responses, emails) => (responses, emails),
        };

        let mut rejected_emails = 0usize;

        let responses = match raw_responses {
            Ok(documents) => Some(normalize_responses(&documents, read_at)),
            Err(err) => {
                log::warn!("response store unavailable, keeping previous data: {err}");
                None
            }
        };
        let emails = match raw_emails {
            Ok(documents) => Some(normalize_emails(&documents, read_at, &mut rejected_emails)),
            Err(err) => {
                log::warn!("email store unavailable, keeping previous data: {err}");
                None
            }
        };

        if let Some(responses) = responses {
            self.responses = responses;
        }
        if let Some(emails) = emails {
            self.emails = emails;
        }
        self.filtered = None;

        let summary = LoadSummary {
            responses: self.responses.len(),
            emails: self.emails.len(),
            rejected_emails,
        };
        log::info!(
            "loaded {} responses and {} email records ({} rejected)",
            summary.responses,
            summary.emails,
            summary.rejected_emails
        );
        Ok(summary)
    }

    /// Full unfiltered set, in file-listing order.
    pub fn raw_data(&self) -> &[ResponseRecord] {
        &self.responses
    }

    pub fn email_data(&self) -> &[EmailRecord] {
        &self.emails
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Replace the active criteria. The filtered-view cache is
    /// invalidated synchronously, so an immediately following
    /// `filtered_data` reflects the new criteria.
    pub fn set_filters(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
        self.filtered = None;
    }

    /// Current filtered view; recomputed lazily, cached until the next
    /// `set_filters` or `load_data`. An empty result is valid output.
    pub fn filtered_data(&mut self) -> &[ResponseRecord] {
        if self.filtered.is_none() {
            let filtered: Vec<ResponseRecord> = self
                .responses
                .iter()
                .filter(|record| filter::matches(record, &self.criteria))
                .cloned()
                .collect();
            self.filtered = Some(filtered);
        }
        self.filtered.as_deref().unwrap_or_default()
    }

    /// Distinct survey titles across the raw data, first-seen order.
    pub fn survey_versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = Vec::new();
        for record in &self.responses {
            if !versions.contains(&record.survey_title) {
                versions.push(record.survey_title.clone());
            }
        }
        versions
    }
}

fn normalize_responses(documents: &[RawDocument], read_at: DateTime<Utc>) -> Vec<ResponseRecord> {
    documents
        .iter()
        .map(|document| normalize::normalize_response(&document.value, &document.id_hint, read_at))
        .collect()
}

fn normalize_emails(
    documents: &[RawDocument],
    read_at: DateTime<Utc>,
    rejected: &mut usize,
) -> Vec<EmailRecord> {
    let mut records = Vec::with_capacity(documents.len());
    for document in documents {
        match normalize::normalize_email(&document.value, &document.id_hint, read_at) {
            Ok(record) => records.push(record),
            Err(err) => {
                *rejected += 1;
                log::warn!("excluding email record: {err}");
            }
        }
    }
    records
}
