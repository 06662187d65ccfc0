use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::engine::AppointmentStore;
use crate::remote::JournalRemote;
use crate::revenue::week_monday;

/// Delete every dated appointment from before the current week. Weekday-only
/// rows have no week and are left alone. Returns how many were removed.
pub async fn roll_over(store: &AppointmentStore) -> usize {
    let monday = week_monday(store.today());
    let stale: Vec<Ulid> = store
        .appointments()
        .await
        .into_iter()
        .filter(|a| a.iso_date.is_some_and(|d| d < monday))
        .map(|a| a.id)
        .collect();

    let mut removed = 0;
    for id in stale {
        match store.delete(id).await {
            Ok(Some(_)) => removed += 1,
            Ok(None) => {}
            // Busy or remote failure: the next tick tries again.
            Err(e) => debug!("rollover skip {id}: {e}"),
        }
    }
    removed
}

/// Background task archiving past weeks on every tick.
pub async fn run_rollover(store: Arc<AppointmentStore>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let removed = roll_over(&store).await;
        if removed > 0 {
            info!("rollover removed {removed} appointments from past weeks");
        }
    }
}

/// Background task compacting the journal once enough appends pile up.
pub async fn run_compactor(remote: Arc<JournalRemote>, threshold: u64, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let appends = remote.appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match remote.compact().await {
            Ok(()) => info!("compacted journal after {appends} appends"),
            Err(e) => warn!("journal compaction failed: {e}"),
        }
    }
}
