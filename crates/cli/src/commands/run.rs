//! `cohort run`: one full pipeline pass.

use std::path::Path;
use std::process;
use std::time::Duration;

use cohort_core::ChannelKind;
use cohort_pipeline::adapter::{EveryActionClient, SendGridMailer, StriveEnroller};
use cohort_pipeline::{
    Collaborators, CrmRecords, DigestMailer, ExportInput, ExportSource, Pipeline, PipelineError,
    PollSettings, RunRequest, RunSettings, RunSummary, VendorEnroller,
};
use cohort_storage::JsonLinesStore;
use time::OffsetDateTime;

use crate::config::{read_config, validate_config};
use crate::context::{parse_date, Credentials, RunContext};
use crate::{report_error, OutputFormat};

/// Exit code for a run that completed but had dispatch failures under `--strict`.
pub(crate) const EXIT_DISPATCH_FAILURES: i32 = 2;

pub(crate) struct RunOptions<'a> {
    pub config: &'a Path,
    pub today: Option<&'a str>,
    pub export_file: Option<&'a Path>,
    pub dry_run: bool,
    pub strict: bool,
}

enum RunFailure {
    Setup(String),
    Pipeline(PipelineError),
}

impl From<String> for RunFailure {
    fn from(msg: String) -> Self {
        RunFailure::Setup(msg)
    }
}

impl From<PipelineError> for RunFailure {
    fn from(e: PipelineError) -> Self {
        RunFailure::Pipeline(e)
    }
}

pub(crate) fn cmd_run(
    opts: RunOptions<'_>,
    credentials: Credentials,
    output: OutputFormat,
    quiet: bool,
) {
    let ctx = match prepare(&opts, credentials) {
        Ok(ctx) => ctx,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let input = match opts.export_file {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => ExportInput::Csv(text),
            Err(e) => {
                let msg = format!("error reading export file '{}': {}", path.display(), e);
                report_error(&msg, output, quiet);
                process::exit(1);
            }
        },
        None => ExportInput::Remote,
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start runtime: {}", e), output, quiet);
            process::exit(1);
        }
    };

    match rt.block_on(execute(&ctx, input, opts.dry_run)) {
        Ok(summary) => {
            print_summary(&summary, output, quiet);
            let failures = summary
                .dispatch
                .as_ref()
                .map_or(0, |report| report.failure_count());
            if opts.strict && failures > 0 {
                process::exit(EXIT_DISPATCH_FAILURES);
            }
        }
        Err(RunFailure::Pipeline(e)) if e.is_no_data() => {
            tracing::info!(reason = %e, "nothing to process");
            print_no_data(&e, output, quiet);
        }
        Err(RunFailure::Pipeline(e)) => {
            report_error(&format!("run failed: {}", e), output, quiet);
            process::exit(1);
        }
        Err(RunFailure::Setup(msg)) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

fn prepare(opts: &RunOptions<'_>, credentials: Credentials) -> Result<RunContext, String> {
    let config = read_config(opts.config)?;
    if let Err(errors) = validate_config(&config) {
        return Err(format!("invalid config:\n  - {}", errors.join("\n  - ")));
    }
    let today = opts.today.map(parse_date).transpose()?;
    RunContext::new(
        opts.config,
        config,
        credentials,
        OffsetDateTime::now_utc(),
        today,
    )
}

fn everyaction(ctx: &RunContext) -> Result<EveryActionClient, String> {
    let export = &ctx.config.export;
    let application = export
        .application_name
        .as_deref()
        .ok_or_else(|| "[export] application_name is required to reach the CRM".to_string())?;
    Ok(EveryActionClient::new(
        &export.base_url,
        application,
        ctx.credentials.van_api_key()?,
        export.db_mode,
    )
    .with_requested_fields(export.requested_fields.clone()))
}

async fn execute(
    ctx: &RunContext,
    input: ExportInput,
    dry_run: bool,
) -> Result<RunSummary, RunFailure> {
    let variant = &ctx.config.variant;
    let channels = variant.dispatch_channels();

    let needs_crm = input == ExportInput::Remote
        || variant.eligibility.exclude_code.is_some()
        || (!dry_run && channels.contains(&ChannelKind::TagApply));
    let van = if needs_crm {
        Some(everyaction(ctx)?)
    } else {
        None
    };

    let strive = match (&ctx.config.vendor, dry_run) {
        (Some(vendor), false) if channels.contains(&ChannelKind::VendorEnroll) => Some(
            StriveEnroller::new(&vendor.base_url, ctx.credentials.strive_api_key()?, vendor.campaign_id),
        ),
        _ => None,
    };

    let mailer = match (&ctx.config.email, dry_run) {
        (Some(email), false) if channels.contains(&ChannelKind::DigestEmail) => Some(
            SendGridMailer::new(ctx.credentials.sendgrid_api_key()?, &email.from, &email.html_body),
        ),
        _ => None,
    };

    let store = JsonLinesStore::new(&ctx.store_path);
    let collaborators = Collaborators {
        store: &store,
        export: van.as_ref().map(|c| c as &dyn ExportSource),
        crm: van.as_ref().map(|c| c as &dyn CrmRecords),
        vendor: strive.as_ref().map(|c| c as &dyn VendorEnroller),
        mailer: mailer.as_ref().map(|c| c as &dyn DigestMailer),
    };

    let settings = RunSettings {
        seed: ctx.config.run.seed,
        window_hours: ctx.config.run.window_hours,
        poll: PollSettings {
            interval: Duration::from_secs(ctx.config.export.poll_interval_secs),
            timeout: Duration::from_secs(ctx.config.export.poll_timeout_secs),
        },
    };

    let summary = Pipeline::new(variant, &settings, collaborators)
        .run(RunRequest {
            today: ctx.today,
            now: ctx.now,
            input,
            dry_run,
        })
        .await?;
    Ok(summary)
}

fn print_summary(summary: &RunSummary, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(summary).unwrap_or_default()
            );
        }
        OutputFormat::Text => {
            if quiet {
                return;
            }
            println!("variant: {}", summary.variant);
            println!("run date: {}", summary.run_date);
            println!("eligible contacts: {}", summary.eligible);
            let sizes: Vec<String> = summary
                .allocated
                .iter()
                .map(|(label, n)| format!("{}={}", label, n))
                .collect();
            println!("allocated: {}", sizes.join(" "));
            println!(
                "new assignments: {} (already recorded: {})",
                summary.new_assignments, summary.already_recorded
            );
            match &summary.dispatch {
                None if summary.dry_run => println!("dry run: nothing recorded or dispatched"),
                None => {}
                Some(report) => {
                    println!(
                        "dispatch: {} delivered, {} failed",
                        report.delivered_count(),
                        report.failure_count()
                    );
                    for group in &report.groups {
                        println!(
                            "  {} ({}): {}/{} delivered",
                            group.label, group.channel, group.delivered, group.members
                        );
                        for failure in &group.failures {
                            match &failure.contact_id {
                                Some(id) => println!("    {}: {}", id, failure.message),
                                None => println!("    {}", failure.message),
                            }
                        }
                    }
                }
            }
        }
    }
}

fn print_no_data(reason: &PipelineError, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "status": "no_data",
                "reason": reason.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        OutputFormat::Text => {
            if !quiet {
                println!("nothing to do: {}", reason);
            }
        }
    }
}

