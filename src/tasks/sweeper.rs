use serde::Serialize;
use time::PrimitiveDateTime;

use crate::core::state::AppState;
use crate::services::errors::SessionError;
use crate::services::lifecycle::{self, ExpiryOutcome};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct SweepReport {
    pub(crate) scanned: usize,
    pub(crate) expired: usize,
    pub(crate) graded: usize,
    pub(crate) failed: usize,
}

/// Times out every in-progress session whose deadline is before `now`.
/// A failing session is logged and counted; the sweep carries on.
pub(crate) async fn sweep(
    state: &AppState,
    now: PrimitiveDateTime,
) -> Result<SweepReport, SessionError> {
    let candidates = lifecycle::list_expired(state, now).await?;
    let mut report = SweepReport { scanned: candidates.len(), ..SweepReport::default() };

    for session in candidates {
        match lifecycle::expire_if_past_deadline(state, &session.id, now).await {
            Ok(ExpiryOutcome::Expired { result, .. }) => {
                report.expired += 1;
                if result.is_some() {
                    report.graded += 1;
                }
            }
            Ok(ExpiryOutcome::Unchanged(_)) => {}
            Err(err) => {
                report.failed += 1;
                tracing::error!(session_id = %session.id, error = %err, "Failed to expire session");
            }
        }
    }

    if report.scanned > 0 {
        tracing::info!(
            scanned = report.scanned,
            expired = report.expired,
            graded = report.graded,
            failed = report.failed,
            "Expired sessions swept"
        );
    }
    metrics::counter!("sweep_runs_total").increment(1);

    Ok(report)
}
