// Copyright 2026 Anapaya Systems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The reservation manager.
//!
//! A periodic task looking after the health of the segment reservations.
//! Each tick joins five concurrent subtasks: the keeper, the expired-index
//! sweep, the expired-admission sweep, and two informational snapshot
//! reports. Every subtask maintains its own deadline; the manager wakes up
//! at the earliest of them. Subtask errors are logged and re-armed, never
//! propagated out of a tick.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use colibri_proto::{address::IsdAsn, dataplane::TransportPath, steps::PathSteps};
use tracing::instrument;

use crate::{
    config::ReservationsConfig,
    keeper::{Keeper, KeeperError},
    request::{Request, SetupRequest},
    segment::Reservation,
    traits::{ManagerApi, ReservationStore, StoreResponse, TransitPath, TransitRouter,
        TransportError},
};

/// How long to defer a tick when the store is not ready yet.
const STORE_NOT_READY_COOLDOWN: Duration = Duration::from_secs(2);
/// Interval of the segment reservation report.
const SEG_REPORT_INTERVAL: Duration = Duration::from_secs(10 * 60);
/// Interval of the E2E reservation report.
const E2E_REPORT_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Re-arm cooldown of the expired-state sweeps when the store names no
/// deadline of its own.
const SWEEP_COOLDOWN: Duration = Duration::from_secs(8);

/// The clock the manager and keeper run on, indirect so tests can pin it.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The collaborator bundle behind the [`ManagerApi`] surface: local AS,
/// store, router and clock.
pub struct ManagerHandle {
    local_ia: IsdAsn,
    store: Arc<dyn ReservationStore>,
    router: Arc<dyn TransitRouter>,
    clock: Clock,
}

#[async_trait]
impl ManagerApi for ManagerHandle {
    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn local_ia(&self) -> IsdAsn {
        self.local_ia
    }

    async fn paths_to(&self, dst: IsdAsn) -> Result<Vec<TransitPath>, TransportError> {
        let paths = self.router.paths_to(dst).await;
        match &paths {
            Ok(paths) => tracing::debug!(%dst, count = paths.len(), "requested transit paths"),
            Err(err) => tracing::debug!(%dst, %err, "requesting transit paths failed"),
        }
        paths
    }

    async fn reservations_at_source(&self) -> Result<Vec<Reservation>, TransportError> {
        self.store.reservations_at_source().await
    }

    async fn setup_request(&self, req: &mut SetupRequest) -> Result<(), TransportError> {
        self.store.init_segment_reservation(req).await?;
        let Some(rsv) = req.reservation.as_ref() else {
            return Err(TransportError::Store(
                "no reservation after segment setup".into(),
            ));
        };
        // confirm the new index
        let confirm = Request::new(self.now(), rsv.id, req.request.index, req.steps.len());
        match self
            .store
            .confirm_segment_reservation(&confirm, &req.steps, req.transport_path.as_ref())
            .await
        {
            Ok(StoreResponse::Success) => Ok(()),
            Ok(StoreResponse::Failure(msg)) => {
                tracing::info!(id = %confirm.id, idx = %confirm.index, %msg,
                    "failed to confirm the index");
                Ok(())
            }
            Err(err) => {
                tracing::info!(id = %confirm.id, idx = %confirm.index, %err,
                    "failed to confirm the index");
                Err(err)
            }
        }
    }

    async fn activate_request(
        &self,
        req: &Request,
        steps: &PathSteps,
        transport: Option<&TransportPath>,
        in_reverse: bool,
    ) -> Result<(), TransportError> {
        let res = self
            .store
            .activate_segment_reservation(req, steps, transport, in_reverse)
            .await?;
        match res {
            StoreResponse::Success => Ok(()),
            StoreResponse::Failure(msg) => {
                Err(TransportError::Rejected(format!("error activating index: {msg}")))
            }
        }
    }

    async fn delete_expired_indices(&self) -> Result<(), TransportError> {
        self.store.delete_expired_indices(self.now()).await?;
        Ok(())
    }
}

/// The reservation manager. Drive [`run`](ColibriManager::run) from a
/// periodic scheduler; invocations before the internal wake-up time return
/// immediately and ticks never overlap.
pub struct ColibriManager {
    handle: Arc<ManagerHandle>,
    keeper: Keeper,
    wakeup_time: DateTime<Utc>,
    wakeup_list_segs: DateTime<Utc>,
    wakeup_list_e2es: DateTime<Utc>,
    wakeup_keeper: DateTime<Utc>,
    wakeup_expirer: DateTime<Utc>,
    wakeup_admission: DateTime<Utc>,
}

impl ColibriManager {
    /// Creates a manager keeping the configured reservations.
    pub async fn new(
        local_ia: IsdAsn,
        router: Arc<dyn TransitRouter>,
        store: Arc<dyn ReservationStore>,
        initial: ReservationsConfig,
    ) -> Result<Self, KeeperError> {
        Self::new_with_clock(local_ia, router, store, initial, Arc::new(Utc::now)).await
    }

    /// Creates a manager on the given clock.
    pub async fn new_with_clock(
        local_ia: IsdAsn,
        router: Arc<dyn TransitRouter>,
        store: Arc<dyn ReservationStore>,
        initial: ReservationsConfig,
        clock: Clock,
    ) -> Result<Self, KeeperError> {
        let handle = Arc::new(ManagerHandle {
            local_ia,
            store,
            router,
            clock,
        });
        let keeper = Keeper::new(handle.clone(), initial).await?;
        let now = handle.now();
        Ok(ColibriManager {
            handle,
            keeper,
            wakeup_time: now - TimeDelta::nanoseconds(1),
            wakeup_list_segs: DateTime::<Utc>::MIN_UTC,
            wakeup_list_e2es: DateTime::<Utc>::MIN_UTC,
            wakeup_keeper: DateTime::<Utc>::MIN_UTC,
            wakeup_expirer: DateTime::<Utc>::MIN_UTC,
            wakeup_admission: DateTime::<Utc>::MIN_UTC,
        })
    }

    /// The manager surface handed to the keeper, exposed for drivers that
    /// need ad-hoc requests.
    pub fn api(&self) -> Arc<dyn ManagerApi> {
        self.handle.clone()
    }

    /// When the next [`run`](ColibriManager::run) will do any work.
    pub fn wakeup_time(&self) -> DateTime<Utc> {
        self.wakeup_time
    }

    /// Runs one manager tick. Returns immediately before the wake-up time or
    /// while the store is not ready; otherwise joins the five subtasks and
    /// re-arms the wake-up time to their earliest deadline.
    #[instrument(name = "colibri.manager", skip_all)]
    pub async fn run(&mut self) {
        let now = self.handle.now();
        if now < self.wakeup_time {
            return;
        }
        if !self.handle.store.ready() {
            tracing::info!("colibri store not yet ready");
            self.wakeup_time = now + STORE_NOT_READY_COOLDOWN;
            return;
        }

        let store = self.handle.store.clone();
        let (list_segs, list_e2es, keeper, expirer, admission) = tokio::join!(
            report_segments(store.clone(), now, self.wakeup_list_segs),
            report_e2es(store.clone(), now, self.wakeup_list_e2es),
            run_keeper(&mut self.keeper, now, self.wakeup_keeper),
            sweep_expired_indices(store.clone(), now, self.wakeup_expirer),
            sweep_admission_entries(store.clone(), now, self.wakeup_admission),
        );
        self.wakeup_list_segs = list_segs;
        self.wakeup_list_e2es = list_e2es;
        self.wakeup_keeper = keeper;
        self.wakeup_expirer = expirer;
        self.wakeup_admission = admission;

        self.wakeup_time = earliest(&[
            self.wakeup_list_segs,
            self.wakeup_list_e2es,
            self.wakeup_keeper,
            self.wakeup_expirer,
            self.wakeup_admission,
        ]);
    }
}

/// Runs the keeper when due. A keeper error is logged and shortens the next
/// wake-up so the transient can be retried promptly.
async fn run_keeper(keeper: &mut Keeper, now: DateTime<Utc>, deadline: DateTime<Utc>) -> DateTime<Utc> {
    if now < deadline {
        return deadline;
    }
    tracing::debug!("reservation keeper starting");
    let (wakeup, result) = keeper.one_shot().await;
    if let Err(err) = result {
        tracing::info!(%err, "error while keeping the reservations");
    }
    tracing::debug!(wakeup = %wakeup, "reservation keeper finished");
    wakeup
}

/// Logs the periodic segment reservation table.
async fn report_segments(
    store: Arc<dyn ReservationStore>,
    now: DateTime<Utc>,
    deadline: DateTime<Utc>,
) -> DateTime<Utc> {
    if now < deadline {
        return deadline;
    }
    match store.segment_reservations_report().await {
        Err(err) => tracing::info!(%err, "error reporting segment reservations"),
        Ok(rsvs) if rsvs.is_empty() => {}
        Ok(rsvs) => {
            let mut table = Vec::with_capacity(rsvs.len() + 1);
            table.push(format!(
                "{:>24} {:>4} {:>15} {:>4} {:>20} {}",
                "id", "dir", "dst", "|i|", "exp", "path"
            ));
            for r in &rsvs {
                table.push(format!(
                    "{:>24} {:>4} {:>15} {:>4} {:>20} {}",
                    r.id.to_string(),
                    r.path_type.to_string(),
                    r.steps.dst_ia().to_string(),
                    r.indices.len(),
                    r.indices
                        .newest_expiration()
                        .map(|t| t.format("%b %e %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".into()),
                    r.steps,
                ));
            }
            tracing::debug!(
                "----------- colibri segments ------------\n{}",
                table.join("\n")
            );
        }
    }
    now + SEG_REPORT_INTERVAL
}

/// Logs the periodic E2E reservation table.
async fn report_e2es(
    store: Arc<dyn ReservationStore>,
    now: DateTime<Utc>,
    deadline: DateTime<Utc>,
) -> DateTime<Utc> {
    if now < deadline {
        return deadline;
    }
    match store.e2e_reservations_report().await {
        Err(err) => tracing::info!(%err, "error reporting e2e reservations"),
        Ok(rsvs) if rsvs.is_empty() => {}
        Ok(rsvs) => {
            let mut table = Vec::with_capacity(rsvs.len() + 1);
            table.push(format!(
                "{:>38} {:>8} {:>3} {:>3} {:>12}",
                "id", "alloc", "idx", "bw", "exptime"
            ));
            for r in &rsvs {
                let (idx, bw, exp) = match &r.index {
                    Some(index) => {
                        (
                            index.idx.to_string(),
                            index.alloc_bw.to_string(),
                            index.expiration.format("%H:%M:%S%.3f").to_string(),
                        )
                    }
                    None => ("--".into(), "---".into(), "-------".into()),
                };
                table.push(format!(
                    "{:>38} {:>8} {:>3} {:>3} {:>12}",
                    r.id, r.alloc, idx, bw, exp
                ));
            }
            tracing::debug!("___________ colibri e2e's now ___________\n{}", table.join("\n"));
        }
    }
    now + E2E_REPORT_INTERVAL
}

/// Sweeps expired indices through the store when due.
async fn sweep_expired_indices(
    store: Arc<dyn ReservationStore>,
    now: DateTime<Utc>,
    deadline: DateTime<Utc>,
) -> DateTime<Utc> {
    if now < deadline {
        return deadline;
    }
    match store.delete_expired_indices(now).await {
        Ok(outcome) => {
            if outcome.removed > 0 {
                tracing::debug!(count = outcome.removed, "deleted expired indices");
            }
            outcome.next_deadline.unwrap_or(now + SWEEP_COOLDOWN)
        }
        Err(err) => {
            tracing::info!(%err, "error deleting expired indices");
            now + SWEEP_COOLDOWN
        }
    }
}

/// Sweeps expired admission list entries through the store when due.
async fn sweep_admission_entries(
    store: Arc<dyn ReservationStore>,
    now: DateTime<Utc>,
    deadline: DateTime<Utc>,
) -> DateTime<Utc> {
    if now < deadline {
        return deadline;
    }
    match store.delete_expired_admission_entries(now).await {
        Ok(outcome) => {
            if outcome.removed > 0 {
                tracing::debug!(count = outcome.removed, "deleted expired admission entries");
            }
            outcome.next_deadline.unwrap_or(now + SWEEP_COOLDOWN)
        }
        Err(err) => {
            tracing::info!(%err, "error deleting expired admission list entries");
            now + SWEEP_COOLDOWN
        }
    }
}

/// Returns the earliest of the given instants.
fn earliest(times: &[DateTime<Utc>]) -> DateTime<Utc> {
    times.iter().copied().min().unwrap_or(DateTime::<Utc>::MIN_UTC)
}
