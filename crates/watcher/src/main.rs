//! `bizeval-watch` -- submit a business idea and follow its analysis.
//!
//! Reads a business-idea form from a JSON file, submits it, prints the
//! progress feed as it arrives and finishes with the report summary and
//! download links. Exits non-zero when the analysis fails.
//!
//! # Environment variables
//!
//! | Variable                   | Default                     | Description                  |
//! |----------------------------|-----------------------------|------------------------------|
//! | `BIZEVAL_API_URL`          | `http://localhost:8000/api` | REST base URL                |
//! | `BIZEVAL_WS_URL`           | `ws://localhost:8000`       | Push channel base URL        |
//! | `BIZEVAL_POLL_INTERVAL_MS` | `2000`                      | Milliseconds between polls   |
//! | `BIZEVAL_PUSH_ENABLED`     | `true`                      | `false` to rely on polling   |

use std::sync::Arc;

use anyhow::{bail, Context};
use bizeval_client::{BizEvalApi, JobTracker, SubmissionGateway, TrackerConfig};
use bizeval_core::form::BusinessIdeaForm;
use bizeval_core::job::{Job, JobStatus};
use bizeval_core::report::{DocumentKind, Report, Section};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bizeval_client=debug,bizeval_watch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: bizeval-watch <form.json>")?;
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let form: BusinessIdeaForm =
        serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;

    let config = TrackerConfig::from_env()?;
    tracing::info!(
        api_url = %config.api_url,
        push_enabled = config.push_enabled,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Starting bizeval-watch",
    );

    let api = Arc::new(BizEvalApi::new(config.api_url.clone()));
    let gateway = SubmissionGateway::new(api.clone());
    let mut session = gateway.start_session().await?;
    let job_id = gateway.submit(&session, &form).await?;
    println!("Submitted job {job_id}");

    let handle = JobTracker::new(api.clone(), &config).start(&mut session, job_id.clone());

    let mut updates = handle.subscribe();
    let mut printed = 0;
    let job = loop {
        let job = updates.borrow_and_update().clone();
        for note in &job.notes()[printed..] {
            println!("  {note}");
        }
        printed = job.notes().len();

        if job.is_terminal() || updates.changed().await.is_err() {
            break job;
        }
    };

    handle.shutdown().await;

    match job.status() {
        JobStatus::Done => {
            if let Some(report) = job.report() {
                print_report(report);
            }
            println!();
            for kind in [DocumentKind::Pdf, DocumentKind::Docx] {
                println!("{}: {}", kind.as_str(), api.download_url(&job_id, kind));
            }
            Ok(())
        }
        _ => bail!("analysis failed: {}", failure_reason(&job)),
    }
}

fn failure_reason(job: &Job) -> &str {
    job.failure().unwrap_or("tracking stopped before completion")
}

fn print_report(report: &Report) {
    let c = &report.consolidation;

    println!();
    match &c.overall_score {
        Section::Available(score) => println!("Overall score: {score:.1}/10"),
        Section::Unavailable => println!("Overall score: data unavailable"),
    }
    if let Section::Available(risk) = &c.risk_level {
        println!("Risk level: {risk:?}");
    }
    if let Some(label) = c.investment_readiness_label() {
        println!("Investment readiness: {label}");
    }
    if let Section::Available(summary) = &c.executive_summary {
        println!("\n{summary}");
    }

    println!("\nRecommendations:");
    for (priority, items) in c.recommendations_by_priority() {
        for item in items {
            println!("  [{priority:?}] {}", item.text);
        }
    }
    for item in c.unprioritized_recommendations() {
        println!("  - {}", item.text);
    }

    let missing = report.unavailable_sections();
    if !missing.is_empty() {
        println!("\nData unavailable: {}", missing.join(", "));
    }
}
