use anyhow::Context;
use occtax_core::{HttpOcctaxApi, RemoteClient, SyncEngine, SyncProgress, SyncReport};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::app_config::AppConfig;

pub async fn sync_cmd(config: &AppConfig) -> anyhow::Result<()> {
    let settings = config.server()?;

    let api = HttpOcctaxApi::new(settings).context("Failed to build HTTP client")?;
    let client = RemoteClient::new(api, settings.date);
    let engine = SyncEngine::new(config.store(), client, settings.sync.delay());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let printer = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            println!("{}", progress_line(&progress));
        }
    });

    // Ctrl-C stops the batch at the next record boundary.
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let report = engine.synchronize(tx, cancel).await;
    interrupt.abort();
    printer.await.context("Progress printer failed")?;

    summarize(&report?)
}

fn progress_line(progress: &SyncProgress) -> String {
    format!(
        "[{}] {} {}",
        progress.remaining, progress.internal_id, progress.status
    )
}

fn summarize(report: &SyncReport) -> anyhow::Result<()> {
    println!("Synchronized {} record(s)", report.synchronized.len());

    for failure in &report.failures {
        eprintln!("  {}: {}", failure.internal_id, failure.reason);
    }

    if report.cancelled {
        anyhow::bail!("Synchronization cancelled");
    }

    if !report.failures.is_empty() {
        anyhow::bail!(
            "Synchronization failed for {} record(s)",
            report.failures.len()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use occtax_core::{Status, SyncFailure};

    use super::*;

    #[test]
    fn test_progress_line() {
        let progress = SyncProgress {
            remaining: 3,
            internal_id: 1234,
            status: Status::SyncInProgress,
        };

        assert_eq!(progress_line(&progress), "[3] 1234 sync_in_progress");
    }

    #[test]
    fn test_summarize() {
        assert!(summarize(&SyncReport::default()).is_ok());

        let failed = SyncReport {
            synchronized: vec![1],
            failures: vec![SyncFailure {
                internal_id: 2,
                reason: "refused".to_string(),
            }],
            cancelled: false,
        };
        assert!(summarize(&failed).is_err());

        let cancelled = SyncReport {
            cancelled: true,
            ..SyncReport::default()
        };
        assert!(summarize(&cancelled).is_err());
    }
}
