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

//! Protocol-shaped request payloads handed to the collaborators.

use chrono::{DateTime, Utc};
use colibri_proto::{
    dataplane::TransportPath,
    reservation::{BwClass, IndexNumber, PathEndProps, PathType, ReservationId, SplitClass},
    steps::PathSteps,
};

use crate::segment::Reservation;

/// The base of every reservation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// When the request was created.
    pub timestamp: DateTime<Utc>,
    /// The targeted reservation.
    pub id: ReservationId,
    /// The targeted index on that reservation.
    pub index: IndexNumber,
    /// The number of steps of the reservation path.
    pub step_count: usize,
}

impl Request {
    /// Creates a request.
    pub fn new(
        timestamp: DateTime<Utc>,
        id: ReservationId,
        index: IndexNumber,
        step_count: usize,
    ) -> Self {
        Request {
            timestamp,
            id,
            index,
            step_count,
        }
    }
}

/// One bead of the allocation trail: what an AS allocated and what it could
/// have allocated at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationBead {
    /// The bandwidth class allocated by the AS.
    pub alloc_bw: BwClass,
    /// The largest class the AS could have allocated.
    pub max_bw: BwClass,
}

/// A segment reservation setup or renewal request.
///
/// On success the storage collaborator stores the resulting reservation in
/// [`reservation`](SetupRequest::reservation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRequest {
    /// The base request.
    pub request: Request,
    /// The requested expiration of the new index.
    pub expiration: DateTime<Utc>,
    /// The direction class of the segment.
    pub path_type: PathType,
    /// The smallest acceptable bandwidth class.
    pub min_bw: BwClass,
    /// The largest requested bandwidth class.
    pub max_bw: BwClass,
    /// The requested traffic split class.
    pub split_cls: SplitClass,
    /// The requested path-end properties.
    pub path_props: PathEndProps,
    /// The allocations of the ASes traversed so far.
    pub alloc_trail: Vec<AllocationBead>,
    /// The AS hops of the reservation, in traffic order.
    pub steps: PathSteps,
    /// The position of this AS in the steps.
    pub current_step: usize,
    /// The data-plane path toward the next COLIBRI service.
    pub transport_path: Option<TransportPath>,
    /// The reservation resulting from the request.
    pub reservation: Option<Reservation>,
}
