//! Background inactivity sweep. Active accounts idle past the configured
//! threshold are auto-deactivated; expired one-time tokens are pruned.

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use pulseid_core::{AccountStore, AuthResult};

use crate::state::AppState;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub deactivated: u64,
    pub tokens_cleared: u64,
}

/// One sweep pass. Exposed separately from the loop so tests can drive it
/// directly.
///
/// The listing is only a candidate scan: the per-account transition re-checks
/// the idle condition at write time, so an account that logs in (and bumps
/// `last_activity`) between the scan and the write is left alone.
pub async fn sweep<A: AccountStore>(state: &AppState<A>) -> AuthResult<SweepOutcome> {
    let now = Utc::now();
    let cutoff = now - Duration::days(state.config.inactivity.threshold_days);

    let mut outcome = SweepOutcome::default();
    for account in state.account_store.list_inactive_since(cutoff).await? {
        if state
            .account_store
            .auto_deactivate_if_inactive(&account.id, cutoff)
            .await?
        {
            tracing::info!(user = %account.id, "auto-deactivated inactive account");
            outcome.deactivated += 1;
        }
    }

    outcome.tokens_cleared = state.account_store.clear_expired_tokens(now).await?;
    Ok(outcome)
}

/// Run the sweep on the configured interval, forever. Spawned once by the
/// binary at startup.
pub async fn run<A: AccountStore>(state: AppState<A>) {
    let mut ticker =
        tokio::time::interval(StdDuration::from_secs(state.config.inactivity.sweep_interval_secs));
    // The immediate first tick doubles as a startup sweep.
    loop {
        ticker.tick().await;
        match sweep(&state).await {
            Ok(outcome) if outcome.deactivated > 0 || outcome.tokens_cleared > 0 => {
                tracing::info!(
                    deactivated = outcome.deactivated,
                    tokens_cleared = outcome.tokens_cleared,
                    "inactivity sweep complete"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "inactivity sweep failed"),
        }
    }
}
