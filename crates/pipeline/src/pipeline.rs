//! One end-to-end run: export → normalize → exclude → allocate → reconcile → dispatch.

use std::collections::BTreeMap;

use cohort_core::{allocate, normalize_export, ContactId, PipelineVariant};
use cohort_storage::AssignmentStore;
use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::crm::{exclude_coded, CrmRecords};
use crate::dispatch::{DigestMailer, DispatchReport, Dispatcher, VendorEnroller};
use crate::error::PipelineError;
use crate::export::{fetch_export, ExportSource, ExportWindow, PollSettings};
use crate::reconcile::reconcile;

/// Run-wide knobs that do not vary between experiments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub seed: u64,
    pub window_hours: u32,
    pub poll: PollSettings,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            seed: cohort_core::DEFAULT_SEED,
            window_hours: 24,
            poll: PollSettings::default(),
        }
    }
}

/// The external systems a run may touch. Only `store` is always required.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub store: &'a dyn AssignmentStore,
    pub export: Option<&'a dyn ExportSource>,
    pub crm: Option<&'a dyn CrmRecords>,
    pub vendor: Option<&'a dyn VendorEnroller>,
    pub mailer: Option<&'a dyn DigestMailer>,
}

impl<'a> Collaborators<'a> {
    pub fn with_store(store: &'a dyn AssignmentStore) -> Self {
        Collaborators {
            store,
            export: None,
            crm: None,
            vendor: None,
            mailer: None,
        }
    }
}

/// Where the export CSV comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportInput {
    /// Submit and poll a job against the configured [`ExportSource`].
    Remote,
    /// An export file already on hand.
    Csv(String),
}

/// Per-invocation inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Run date. Contacts created the day before are processed.
    pub today: Date,
    /// End of the export window.
    pub now: OffsetDateTime,
    pub input: ExportInput,
    /// Allocate and diff, but write nothing and dispatch nothing.
    pub dry_run: bool,
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub variant: String,
    pub run_date: String,
    pub eligible: usize,
    /// Allocated members per label, before reconciliation.
    pub allocated: BTreeMap<String, usize>,
    pub new_assignments: usize,
    pub already_recorded: usize,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchReport>,
}

pub struct Pipeline<'a> {
    variant: &'a PipelineVariant,
    settings: &'a RunSettings,
    collaborators: Collaborators<'a>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        variant: &'a PipelineVariant,
        settings: &'a RunSettings,
        collaborators: Collaborators<'a>,
    ) -> Self {
        Pipeline {
            variant,
            settings,
            collaborators,
        }
    }

    pub async fn run(&self, request: RunRequest) -> Result<RunSummary, PipelineError> {
        let labels = self.variant.labels()?;
        tracing::info!(variant = %self.variant.name, today = %request.today, groups = labels.len(), "starting run");

        let csv_text = match request.input {
            ExportInput::Csv(text) => text,
            ExportInput::Remote => {
                let source = self.collaborators.export.ok_or_else(|| {
                    PipelineError::Config("no export source configured".to_string())
                })?;
                let window = ExportWindow::ending_at(request.now, self.settings.window_hours);
                fetch_export(source, &window, &self.settings.poll).await?
            }
        };

        let mut contacts = normalize_export(&csv_text, request.today, &self.variant.eligibility)?;

        if let Some(code) = self.variant.eligibility.exclude_code.as_deref() {
            let crm = self.collaborators.crm.ok_or_else(|| {
                PipelineError::Config(format!(
                    "variant excludes code '{code}' but no CRM record API is configured"
                ))
            })?;
            contacts = exclude_coded(contacts, crm, code).await?;
        }

        let ids: Vec<ContactId> = contacts.iter().map(|c| c.id.clone()).collect();
        let batch = allocate(&ids, &labels, self.settings.seed)?;
        let allocated = batch
            .group_sizes()
            .into_iter()
            .map(|(label, size)| (label.to_string(), size))
            .collect();

        let reconciliation = reconcile(
            self.collaborators.store,
            &batch,
            request.today,
            !request.dry_run,
        )
        .await?;

        let dispatch = if request.dry_run {
            tracing::info!("dry run; skipping persistence and dispatch");
            None
        } else {
            let dispatcher = Dispatcher {
                vendor: self.collaborators.vendor,
                crm: self.collaborators.crm,
                mailer: self.collaborators.mailer,
            };
            let report = dispatcher
                .dispatch(self.variant, &reconciliation.fresh_batch(), &contacts)
                .await;
            if !report.is_clean() {
                tracing::warn!(failures = report.failure_count(), "dispatch finished with failures");
            }
            Some(report)
        };

        Ok(RunSummary {
            variant: self.variant.name.clone(),
            run_date: request.today.to_string(),
            eligible: contacts.len(),
            allocated,
            new_assignments: reconciliation.fresh.len(),
            already_recorded: reconciliation.already_recorded,
            dry_run: request.dry_run,
            dispatch,
        })
    }
}
