//! Cron job that refreshes the toggle backup object.

use std::{str::FromStr, sync::Arc};

use apalis::prelude::*;
use apalis_cron::Schedule;

use crate::application::export::ExportService;

pub const BACKUP_ACTOR: &str = "scheduler";

/// Marker struct for the cron-triggered backup job.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct BackupExportJob;

impl From<chrono::DateTime<chrono::Utc>> for BackupExportJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

#[derive(Clone)]
pub struct BackupExportContext {
    pub exporter: Arc<ExportService>,
}

pub async fn process_backup_export_job(
    _job: BackupExportJob,
    ctx: Data<BackupExportContext>,
) -> Result<(), apalis::prelude::Error> {
    if let Err(err) = ctx.exporter.export_to_store(BACKUP_ACTOR).await {
        tracing::warn!(error = %err, "Scheduled backup export failed");
    }
    Ok(())
}

/// Parse a six-field cron expression (seconds first).
pub fn backup_schedule(expression: &str) -> Result<Schedule, String> {
    Schedule::from_str(expression).map_err(|err| format!("invalid cron expression: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_parses_correctly() {
        let schedule = backup_schedule("0 0 * * * *").expect("hourly schedule");
        let upcoming: Vec<_> = schedule.upcoming(chrono::Utc).take(3).collect();
        assert_eq!(upcoming.len(), 3);
    }

    #[test]
    fn invalid_schedule_is_rejected() {
        assert!(backup_schedule("every hour").is_err());
    }
}
