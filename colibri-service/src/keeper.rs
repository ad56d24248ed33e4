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

//! The reservation keeper.
//!
//! The keeper looks after the reservations listed in the configuration. It
//! matches existing reservations against the configured entries; entries
//! without a match request a new reservation, matched ones are renewed or
//! activated as their compliance demands. One tick handles all entries
//! concurrently and reports when the next tick is due.

use std::{fmt::Display, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use colibri_proto::{
    address::{Asn, IsdAsn},
    reservation::{IndexNumber, PathType, ReservationError, ReservationId},
};
use futures::future;
use thiserror::Error;

use crate::{
    config::{ReservationConfig, ReservationsConfig},
    request::{Request, SetupRequest},
    segment::{Reservation, SegmentError},
    traits::{ManagerApi, TransitPath, TransportError},
};

/// The minimum time the keeper sleeps between ticks, even when called very
/// frequently.
pub const SLEEP_AT_LEAST: Duration = Duration::from_secs(4);

/// The maximum time the keeper sleeps between ticks.
pub const SLEEP_AT_MOST: Duration = Duration::from_secs(5 * 60);

/// Minimum remaining validity for an index to count as compliant. Twice the
/// maximum sleep period, so no index expires while the keeper is asleep.
pub const MIN_DURATION: Duration = Duration::from_secs(2 * 5 * 60);

/// Minimum validity of newly requested indices and reservations. The bigger,
/// the longer a single index can be used; too big and on-path ASes may
/// refuse the admission.
pub const NEW_INDEX_MIN_DURATION: Duration = Duration::from_secs(4 * 5 * 60);

/// Errors of a single keeper entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeeperError {
    /// Every predicate-matching transit path was tried without success.
    #[error("no transit path to {dst} yields a reservation")]
    NoPath {
        /// The destination the entry is configured for.
        dst: IsdAsn,
    },
    /// An activation was requested without a pending index.
    #[error("no index to activate on {id}")]
    NothingToActivate {
        /// The reservation lacking an activation target.
        id: ReservationId,
    },
    /// A reservation mutator refused the operation.
    #[error(transparent)]
    Segment(#[from] SegmentError),
    /// A collaborator failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A malformed primitive value.
    #[error(transparent)]
    Reservation(#[from] ReservationError),
}

/// The per-entry errors of one keeper tick.
#[derive(Debug)]
pub struct ErrorList(pub Vec<KeeperError>);

impl Display for ErrorList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for err in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorList {}

/// One configured reservation and, once obtained, the reservation itself.
#[derive(Debug)]
pub struct Entry {
    /// The configured requirements.
    pub conf: ReservationConfig,
    /// The matched reservation, if any exists yet.
    pub rsv: Option<Reservation>,
}

/// How a reservation relates to its configured requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compliance {
    /// No compatible index exists; a renewal must be requested.
    NeedsIndices,
    /// A compatible index exists but none is active.
    NeedsActivation,
    /// A compatible index is active.
    Compliant,
}

impl Display for Compliance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Compliance::NeedsIndices => "NeedsIndices",
            Compliance::NeedsActivation => "NeedsActivation",
            Compliance::Compliant => "Compliant",
        };
        write!(f, "{s}")
    }
}

/// Classifies the reservation of an entry against its configuration.
///
/// Only indices within the configured bandwidth range, confirmed downstream,
/// and valid at least until `until` count. With none of those the entry
/// needs new indices; if all of them could merely replace the active index,
/// the entry needs an activation; otherwise it is compliant. Callers pass
/// `until` far enough out to cover the keeper's sleep window.
pub fn compliance(entry: &Entry, until: DateTime<Utc>) -> Compliance {
    let Some(rsv) = entry.rsv.as_ref() else {
        return Compliance::NeedsIndices;
    };
    let conf = &entry.conf;
    let candidates = rsv.indices.filter(|index| {
        index.min_bw >= conf.min_bw
            && index.max_bw <= conf.max_bw
            && index.is_confirmed()
            && index.expiration >= until
    });
    if candidates.is_empty() {
        return Compliance::NeedsIndices;
    }
    let active = rsv.active_index();
    if candidates
        .filter(|index| !index.switchable_from(active))
        .is_empty()
    {
        return Compliance::NeedsActivation;
    }
    Compliance::Compliant
}

/// Matches existing reservations with the configuration, greedily and
/// order-preserving: each reservation claims the first compatible
/// configuration still in the pool. Configurations left unclaimed yield
/// entries without a reservation; reservations matching no configuration are
/// dropped from the keeper's working set (they stay in storage until the
/// expirer collects them).
pub fn match_rsvs_with_configuration(
    rsvs: Vec<Reservation>,
    confs: Vec<ReservationConfig>,
) -> Vec<Entry> {
    let mut pool = confs;
    let mut entries = Vec::new();
    for rsv in rsvs {
        let Some(i) = find_compatible_configuration(&rsv, &pool) else {
            tracing::debug!(id = %rsv.id, "reservation matches no configuration, dropping");
            continue;
        };
        entries.push(Entry {
            conf: pool.remove(i),
            rsv: Some(rsv),
        });
    }
    for conf in pool {
        entries.push(Entry { conf, rsv: None });
    }
    entries
}

/// Returns the position of the first configuration compatible with the
/// reservation, or None.
pub fn find_compatible_configuration(
    rsv: &Reservation,
    confs: &[ReservationConfig],
) -> Option<usize> {
    confs.iter().position(|c| {
        rsv.steps.dst_ia() == c.dst
            && rsv.path_type == c.path_type
            && rsv.traffic_split == c.split_cls
            && rsv.path_end_props == c.end_props
            && c.predicate.eval_interfaces(&rsv.steps.interfaces())
    })
}

/// The keeper: one entry per configured reservation, driven through the
/// manager it reports to.
pub struct Keeper {
    manager: Arc<dyn ManagerApi>,
    entries: Vec<Entry>,
}

impl Keeper {
    /// Creates a keeper for the given configuration: sweeps expired indices,
    /// loads the reservations at this source, and matches them against the
    /// configured entries.
    pub async fn new(
        manager: Arc<dyn ManagerApi>,
        initial: ReservationsConfig,
    ) -> Result<Keeper, KeeperError> {
        if initial.entries.is_empty() {
            tracing::info!("COLIBRI not keeping any reservations");
        } else {
            tracing::info!(count = initial.entries.len(), "COLIBRI will keep reservations");
        }
        // clean up expired indices before reading reservations
        manager.delete_expired_indices().await?;
        let rsvs = manager.reservations_at_source().await?;
        let entries = match_rsvs_with_configuration(rsvs, initial.entries);
        tracing::debug!(reservations = entries.len(), "colibri keeper");
        Ok(Keeper { manager, entries })
    }

    /// Keeps all reservations healthy: entries needing renewal are renewed,
    /// entries without a reservation request a new one. All entries are
    /// handled concurrently. Returns when the keeper should run next; with
    /// per-entry errors, that is as soon as the minimum sleep allows.
    pub async fn one_shot(&mut self) -> (DateTime<Utc>, Result<(), ErrorList>) {
        let manager = self.manager.clone();
        let results = future::join_all(self.entries.iter_mut().map(|entry| {
            let manager = manager.clone();
            async move { keep_reservation(manager.as_ref(), entry).await }
        }))
        .await;

        let mut times = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(t) => times.push(t),
                Err(e) => errors.push(e),
            }
        }
        if !errors.is_empty() {
            return (
                self.manager.now() + SLEEP_AT_LEAST,
                Err(ErrorList(errors)),
            );
        }

        let now = self.manager.now();
        // the earliest per-entry deadline, clamped into the sleep envelope
        let mut wakeup = now + SLEEP_AT_MOST;
        for t in times {
            if t < wakeup {
                wakeup = t;
            }
        }
        if wakeup < now + SLEEP_AT_LEAST {
            wakeup = now + SLEEP_AT_LEAST;
        }
        (wakeup, Ok(()))
    }

    /// The entries the keeper currently manages.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

/// Ensures the entry's reservation exists and complies with its
/// configuration. Returns when the entry wants to be looked at again.
async fn keep_reservation(
    manager: &dyn ManagerApi,
    entry: &mut Entry,
) -> Result<DateTime<Utc>, KeeperError> {
    let now = manager.now();
    if entry.rsv.is_none() {
        let (rsv, result) = ask_new_reservation(manager, &entry.conf).await;
        entry.rsv = rsv;
        result?;
    }

    match compliance(entry, manager.now() + MIN_DURATION) {
        Compliance::Compliant => {}
        Compliance::NeedsIndices => ask_new_indices(manager, entry).await?,
        Compliance::NeedsActivation => activate_index(manager, entry).await?,
    }
    Ok(now + NEW_INDEX_MIN_DURATION)
}

/// Requests a brand new reservation, trying every predicate-matching transit
/// path in router order. The first request yielding a reservation wins, even
/// when an auxiliary step of it failed; the reservation is returned alongside
/// that error.
async fn ask_new_reservation(
    manager: &dyn ManagerApi,
    conf: &ReservationConfig,
) -> (Option<Reservation>, Result<(), KeeperError>) {
    let now = manager.now();
    let paths = match manager.paths_to(conf.dst).await {
        Ok(paths) => paths,
        Err(err) => return (None, Err(err.into())),
    };
    let paths = conf.predicate.eval(paths, |p: &TransitPath| &p.steps);
    for path in paths {
        let mut req = match prepare_setup_request(
            conf,
            now,
            now + NEW_INDEX_MIN_DURATION,
            manager.local_ia().asn,
            path,
        ) {
            Ok(req) => req,
            Err(err) => return (None, Err(err)),
        };
        let result = manager.setup_request(&mut req).await;
        if result.is_ok() && req.reservation.is_none() {
            debug_assert!(false, "reservation empty after successful setup");
            tracing::warn!(dst = %conf.dst, "reservation empty after successful setup");
        }
        if let Some(rsv) = req.reservation.take() {
            return (Some(rsv), result.map_err(Into::into));
        }
        if let Err(err) = result {
            tracing::info!(dst = %conf.dst, %err, "error creating reservation from transit path");
        }
    }
    (None, Err(KeeperError::NoPath { dst: conf.dst }))
}

/// Requests a renewal: a setup along the reservation's own steps targeting
/// the next ring number.
async fn ask_new_indices(manager: &dyn ManagerApi, entry: &mut Entry) -> Result<(), KeeperError> {
    let now = manager.now();
    let Some(rsv) = entry.rsv.as_ref() else {
        debug_assert!(false, "renewal without reservation");
        return Ok(());
    };
    let mut req = prepare_renewal_request(&entry.conf, rsv, now, now + NEW_INDEX_MIN_DURATION);
    let result = manager.setup_request(&mut req).await;
    // whatever progressed before a failure is kept; the next compliance
    // check re-evaluates
    if let Some(rsv) = req.reservation.take() {
        entry.rsv = Some(rsv);
    }
    result.map_err(Into::into)
}

/// Activates the next pending index locally, then through the collaborator.
/// An RPC failure rolls the local activation back before surfacing.
async fn activate_index(manager: &dyn ManagerApi, entry: &mut Entry) -> Result<(), KeeperError> {
    let now = manager.now();
    let Some(rsv) = entry.rsv.as_mut() else {
        debug_assert!(false, "activation without reservation");
        return Ok(());
    };
    let idx = rsv
        .next_index_to_activate()
        .map(|index| index.idx)
        .ok_or(KeeperError::NothingToActivate { id: rsv.id })?;
    let req = Request::new(now, rsv.id, idx, rsv.steps.len());
    rsv.set_index_active(idx)?;

    let in_reverse = rsv.path_type == PathType::Down;
    match manager
        .activate_request(&req, &rsv.steps, rsv.transport_path.as_ref(), in_reverse)
        .await
    {
        Ok(()) => Ok(()),
        Err(err) => {
            rsv.set_index_inactive();
            Err(err.into())
        }
    }
}

/// Builds a setup request for a new reservation over the given transit path.
/// The steps always run in the traffic direction of the segment, so for
/// down-path segments the path is reversed and this AS sits at the last
/// step; the transport stays in the direction of the next COLIBRI service.
fn prepare_setup_request(
    conf: &ReservationConfig,
    now: DateTime<Utc>,
    expiration: DateTime<Utc>,
    local_as: Asn,
    path: TransitPath,
) -> Result<SetupRequest, KeeperError> {
    let mut steps = path.steps;
    let mut current_step = 0;
    if conf.path_type == PathType::Down {
        steps = steps.reverse();
        current_step = steps.len() - 1;
    }
    let id = ReservationId::new_unassigned(local_as)?;
    Ok(SetupRequest {
        request: Request::new(now, id, IndexNumber::new(0), steps.len()),
        expiration,
        path_type: conf.path_type,
        min_bw: conf.min_bw,
        max_bw: conf.max_bw,
        split_cls: conf.split_cls,
        path_props: conf.end_props,
        alloc_trail: Vec::new(),
        steps,
        current_step,
        transport_path: Some(path.transport),
        reservation: None,
    })
}

/// Builds a renewal request for an existing reservation. The reservation's
/// own split and end properties travel with it, not the configuration's.
fn prepare_renewal_request(
    conf: &ReservationConfig,
    rsv: &Reservation,
    now: DateTime<Utc>,
    expiration: DateTime<Utc>,
) -> SetupRequest {
    SetupRequest {
        request: Request::new(now, rsv.id, rsv.next_index_to_renew(), rsv.steps.len()),
        expiration,
        path_type: conf.path_type,
        min_bw: conf.min_bw,
        max_bw: conf.max_bw,
        split_cls: rsv.traffic_split,
        path_props: rsv.path_end_props,
        alloc_trail: Vec::new(),
        steps: rsv.steps.clone(),
        current_step: 0,
        transport_path: rsv.transport_path.clone(),
        reservation: Some(rsv.clone()),
    }
}
