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

//! Collaborator contracts of the reservation service.
//!
//! The keeper and manager are polymorphic over three capability sets: the
//! router handing out candidate transit paths, the store owning persisted
//! reservations and speaking the wire toward the on-path ASes, and the
//! manager surface the keeper drives. Any implementation honoring the
//! contracts is valid.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use colibri_proto::{
    address::IsdAsn,
    dataplane::TransportPath,
    reservation::{BwClass, IndexNumber},
    steps::PathSteps,
};
use thiserror::Error;

use crate::{
    request::{Request, SetupRequest},
    segment::Reservation,
};

/// Failures of the storage and RPC collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The RPC toward an on-path AS failed.
    #[error("rpc failed: {0}")]
    Rpc(String),
    /// The local reservation store failed.
    #[error("store failed: {0}")]
    Store(String),
    /// A request went through but was rejected by an on-path AS.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// The response of an on-path AS to a control-plane request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreResponse {
    /// The request was admitted.
    Success,
    /// The request was rejected with the given message.
    Failure(String),
}

impl StoreResponse {
    /// Returns true if the request was admitted.
    pub fn success(&self) -> bool {
        matches!(self, StoreResponse::Success)
    }
}

/// The outcome of an expired-state sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    /// How many entries were removed.
    pub removed: usize,
    /// When the next entry expires, if any is left.
    pub next_deadline: Option<DateTime<Utc>>,
}

/// A candidate transit path toward a destination AS, router-ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitPath {
    /// The AS hops of the path, in traffic order.
    pub steps: PathSteps,
    /// The data-plane path transporting requests along it.
    pub transport: TransportPath,
}

/// Hands out candidate transit paths.
#[async_trait]
pub trait TransitRouter: Send + Sync {
    /// Returns the candidate paths toward the destination, in the router's
    /// preference order.
    async fn paths_to(&self, dst: IsdAsn) -> Result<Vec<TransitPath>, TransportError>;
}

/// A row of the end-to-end reservation report. E2E admission lives outside
/// this service; the store only surfaces the rendering data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct E2eReport {
    /// The E2E reservation identifier.
    pub id: String,
    /// The bandwidth allocated to the reservation, in kbps.
    pub alloc: u64,
    /// The newest index of the reservation, if any.
    pub index: Option<E2eIndexReport>,
}

/// The newest index of an E2E reservation, as listed in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct E2eIndexReport {
    /// The ring number of the index.
    pub idx: IndexNumber,
    /// The allocated bandwidth class.
    pub alloc_bw: BwClass,
    /// When the index expires.
    pub expiration: DateTime<Utc>,
}

/// The reservation store: owns persisted reservations and admission lists,
/// and performs the control-plane RPCs on behalf of the service.
///
/// Implementations must tolerate concurrent access; the manager's subtasks
/// call into the store in parallel within one tick.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Returns true once the store can serve requests.
    fn ready(&self) -> bool;

    /// Returns the reservations initiated by this AS.
    async fn reservations_at_source(&self) -> Result<Vec<Reservation>, TransportError>;

    /// Performs a segment setup or renewal along the request's path. On
    /// success the resulting reservation is stored in `req.reservation`.
    async fn init_segment_reservation(&self, req: &mut SetupRequest)
    -> Result<(), TransportError>;

    /// Confirms the index set up by a previous
    /// [`init_segment_reservation`](ReservationStore::init_segment_reservation).
    async fn confirm_segment_reservation(
        &self,
        req: &Request,
        steps: &PathSteps,
        transport: Option<&TransportPath>,
    ) -> Result<StoreResponse, TransportError>;

    /// Activates a confirmed index along the reservation path. `in_reverse`
    /// is set for down-path segments, whose transport runs against the
    /// traffic direction.
    async fn activate_segment_reservation(
        &self,
        req: &Request,
        steps: &PathSteps,
        transport: Option<&TransportPath>,
        in_reverse: bool,
    ) -> Result<StoreResponse, TransportError>;

    /// Removes expired indices of segment and E2E reservations.
    async fn delete_expired_indices(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepOutcome, TransportError>;

    /// Removes expired admission list entries.
    async fn delete_expired_admission_entries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepOutcome, TransportError>;

    /// Returns the segment reservations in the store, for the periodic
    /// report.
    async fn segment_reservations_report(&self) -> Result<Vec<Reservation>, TransportError>;

    /// Returns the E2E reservations in the store, for the periodic report.
    async fn e2e_reservations_report(&self) -> Result<Vec<E2eReport>, TransportError>;
}

/// The manager surface the keeper drives.
///
/// The production implementation delegates to the store and router; tests
/// substitute canned collaborators.
#[async_trait]
pub trait ManagerApi: Send + Sync {
    /// The current time. Indirect so tests can pin it.
    fn now(&self) -> DateTime<Utc>;

    /// The AS this service runs in.
    fn local_ia(&self) -> IsdAsn;

    /// Returns candidate transit paths toward the destination.
    async fn paths_to(&self, dst: IsdAsn) -> Result<Vec<TransitPath>, TransportError>;

    /// Returns the reservations initiated by this AS.
    async fn reservations_at_source(&self) -> Result<Vec<Reservation>, TransportError>;

    /// Performs a setup or renewal, including the subsequent index
    /// confirmation. On success `req.reservation` holds the resulting
    /// reservation.
    async fn setup_request(&self, req: &mut SetupRequest) -> Result<(), TransportError>;

    /// Activates an index along the reservation path.
    async fn activate_request(
        &self,
        req: &Request,
        steps: &PathSteps,
        transport: Option<&TransportPath>,
        in_reverse: bool,
    ) -> Result<(), TransportError>;

    /// Removes expired indices through the store.
    async fn delete_expired_indices(&self) -> Result<(), TransportError>;
}
