// ============================
// watchparty-backend/src/retention.rs
// ============================
//! Reclaims parties nobody has been connected to for a while.
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics::PARTY_REAPED;
use crate::party::PartyId;
use crate::AppState;

/// Retire and remove every party idle for at least `grace`. Returns the removed IDs.
pub async fn reap_idle_parties(state: &AppState, grace: Duration) -> Vec<PartyId> {
    let mut reaped = Vec::new();

    for party_id in state.parties.party_ids() {
        let Some(handle) = state.parties.get(&party_id) else {
            continue;
        };

        match handle.retire_if_idle(grace).await {
            Ok(true) => {},
            Ok(false) => continue,
            Err(e) => {
                warn!(%party_id, error = %e, "party actor unreachable, removing");
            },
        }

        state.parties.remove(&party_id);
        if let Err(e) = state.streams.discard(&party_id).await {
            warn!(%party_id, error = %e, "failed to delete stream output");
        }
        counter!(PARTY_REAPED).increment(1);
        reaped.push(party_id);
    }

    if !reaped.is_empty() {
        info!(count = reaped.len(), "reaped idle parties");
    }
    reaped
}

/// Run [`reap_idle_parties`] periodically. `None` when retention is disabled.
pub fn spawn_reaper(state: AppState) -> Option<JoinHandle<()>> {
    let grace = state.settings.retention.idle_grace()?;
    let period = state.settings.retention.reap_interval();

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let reaped = reap_idle_parties(&state, grace).await;
            debug!(reaped = reaped.len(), remaining = state.parties.len(), "reap pass done");
        }
    }))
}
