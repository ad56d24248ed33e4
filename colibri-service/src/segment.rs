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

//! Segment reservations and their index algebra.
//!
//! A reservation versions its parameters through up to 16 indices on the
//! 4-bit index number ring. Indices move Temporary -> Pending -> Active;
//! activating an index prunes everything older, so an active index always
//! sits at position 0 and at most one index is active.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use colibri_proto::{
    address::Asn,
    dataplane::{ColibriHopField, ColibriInfoField, ColibriPath, RES_ID_SUFFIX_LEN, TransportPath},
    reservation::{
        BwClass, ExpirationTick, IndexNumber, PathEndProps, PathType, ReservationError,
        ReservationId, Rlc, SplitClass, max_bw_class,
    },
    steps::{PathSteps, StepsError},
    token::{InfoField, Token},
};
use thiserror::Error;

/// The maximum number of simultaneous indices, one per ring position.
pub const MAX_INDICES: usize = 16;

/// Errors raised by reservation mutators and validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    /// No index with the given number exists on the reservation.
    #[error("index {idx} not found")]
    IndexNotFound {
        /// The requested index number.
        idx: IndexNumber,
    },
    /// Confirming an index that is already active.
    #[error("cannot confirm an already active index {idx}")]
    ConfirmActive {
        /// The requested index number.
        idx: IndexNumber,
    },
    /// Activating an index that was never confirmed.
    #[error("cannot activate index {idx} in state {state}")]
    ActivateUnconfirmed {
        /// The requested index number.
        idx: IndexNumber,
        /// The state the index is in.
        state: IndexState,
    },
    /// Activating an index older than the currently active one.
    #[error("activating a past index: active {active}, requested {requested}")]
    ActivatePast {
        /// The index number of the currently active index.
        active: IndexNumber,
        /// The requested index number.
        requested: IndexNumber,
    },
    /// The index list outgrew the ring.
    #[error("too many indices: {0}")]
    TooManyIndices(usize),
    /// An index expires before its predecessor.
    #[error("expiration of index {idx} precedes its predecessor")]
    DecreasingExpiration {
        /// The offending index number.
        idx: IndexNumber,
    },
    /// An allocated bandwidth class outside the index's own bounds.
    #[error("allocated class {alloc} of index {idx} outside [{min}, {max}]")]
    AllocOutOfRange {
        /// The offending index number.
        idx: IndexNumber,
        /// The allocated class.
        alloc: BwClass,
        /// The lower bound.
        min: BwClass,
        /// The upper bound.
        max: BwClass,
    },
    /// The active index bookkeeping points outside position 0.
    #[error("invalid active index position {0}")]
    InvalidActivePosition(usize),
    /// More than one index is in the active state.
    #[error("more than one active index: {first} and {second}")]
    MultipleActive {
        /// The first active index number found.
        first: IndexNumber,
        /// Another active index number found.
        second: IndexNumber,
    },
    /// The current step points outside the step list.
    #[error("current step {curr} out of range for {count} steps")]
    CurrentStepOutOfRange {
        /// The current step position.
        curr: usize,
        /// The number of steps.
        count: usize,
    },
    /// The transport path disagrees with the reservation steps.
    #[error(
        "inconsistent interfaces: dataplane ({dataplane_ingress}, {dataplane_egress}), \
         reservation ({ingress}, {egress})"
    )]
    TransportMismatch {
        /// Ingress according to the transport path.
        dataplane_ingress: u16,
        /// Egress according to the transport path.
        dataplane_egress: u16,
        /// Ingress according to the reservation steps.
        ingress: u16,
        /// Egress according to the reservation steps.
        egress: u16,
    },
    /// A malformed step list.
    #[error(transparent)]
    Steps(#[from] StepsError),
    /// A malformed primitive value.
    #[error(transparent)]
    Reservation(#[from] ReservationError),
}

/// The lifecycle state of a reservation index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// Just allocated, not yet confirmed by the on-path ASes.
    Temporary,
    /// Confirmed downstream, ready for activation.
    Pending,
    /// Committed and live in the data plane.
    Active,
}

impl Display for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IndexState::Temporary => "temporary",
            IndexState::Pending => "pending",
            IndexState::Active => "active",
        };
        write!(f, "{s}")
    }
}

/// One versioned snapshot of a reservation's parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    /// The ring position of the index.
    pub idx: IndexNumber,
    /// When the index expires.
    pub expiration: DateTime<Utc>,
    /// The lifecycle state.
    pub state: IndexState,
    /// The smallest acceptable bandwidth class.
    pub min_bw: BwClass,
    /// The largest requested bandwidth class.
    pub max_bw: BwClass,
    /// The bandwidth class actually allocated along the path.
    pub alloc_bw: BwClass,
    /// The hop chain authenticating the index.
    pub token: Token,
}

impl Index {
    /// Returns true once the index was confirmed by the downstream ASes,
    /// i.e. it is pending or active.
    pub fn is_confirmed(&self) -> bool {
        matches!(self.state, IndexState::Pending | IndexState::Active)
    }

    /// Returns true if this index could replace the given active index.
    ///
    /// With no active index any confirmed index can be activated; otherwise
    /// only pending indices qualify, since activation pruned everything older
    /// than the active one.
    pub fn switchable_from(&self, active: Option<&Index>) -> bool {
        match active {
            None => self.is_confirmed(),
            Some(_) => self.state == IndexState::Pending,
        }
    }
}

/// The ordered index list of a reservation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Indices(Vec<Index>);

impl Indices {
    /// Returns the number of indices.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no indices.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the index at the given list position.
    pub fn get(&self, i: usize) -> Option<&Index> {
        self.0.get(i)
    }

    #[cfg(test)]
    pub(crate) fn get_mut(&mut self, i: usize) -> Option<&mut Index> {
        self.0.get_mut(i)
    }

    /// Returns the most recently added index.
    pub fn last(&self) -> Option<&Index> {
        self.0.last()
    }

    /// Iterates over the indices, oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Index> {
        self.0.iter()
    }

    /// Returns the indices satisfying the predicate, preserving order.
    pub fn filter(&self, pred: impl Fn(&Index) -> bool) -> Indices {
        Indices(self.0.iter().filter(|i| pred(i)).cloned().collect())
    }

    /// Returns the latest expiration time over all indices.
    pub fn newest_expiration(&self) -> Option<DateTime<Utc>> {
        self.0.iter().map(|i| i.expiration).max()
    }

    /// Returns the list position of the index with the given number.
    fn position(&self, idx: IndexNumber) -> Result<usize, SegmentError> {
        self.0
            .iter()
            .position(|i| i.idx == idx)
            .ok_or(SegmentError::IndexNotFound { idx })
    }
}

impl Display for Indices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for index in &self.0 {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}:{}", index.idx, index.state)?;
            first = false;
        }
        Ok(())
    }
}

/// Validates an index list: at most one index per ring position, expirations
/// non-decreasing, allocations within their bounds.
fn validate_indices(indices: &[Index]) -> Result<(), SegmentError> {
    if indices.len() > MAX_INDICES {
        return Err(SegmentError::TooManyIndices(indices.len()));
    }
    let mut prev_expiration: Option<DateTime<Utc>> = None;
    for index in indices {
        if let Some(prev) = prev_expiration {
            if index.expiration < prev {
                return Err(SegmentError::DecreasingExpiration { idx: index.idx });
            }
        }
        prev_expiration = Some(index.expiration);
        if index.alloc_bw < index.min_bw || index.alloc_bw > index.max_bw {
            return Err(SegmentError::AllocOutOfRange {
                idx: index.idx,
                alloc: index.alloc_bw,
                min: index.min_bw,
                max: index.max_bw,
            });
        }
    }
    Ok(())
}

/// A segment reservation at its initiator AS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    /// The reservation identifier.
    pub id: ReservationId,
    /// The existing indices, oldest first.
    pub indices: Indices,
    /// Position of the active index; None or Some(0) after every mutator.
    active_index: Option<usize>,
    /// The direction class of the segment.
    pub path_type: PathType,
    /// The stitching and start/end properties.
    pub path_end_props: PathEndProps,
    /// The traffic split between control and data planes.
    pub traffic_split: SplitClass,
    /// The AS hops of the reservation, in traffic order.
    pub steps: PathSteps,
    /// The position of this AS in the steps.
    pub current_step: usize,
    /// The data-plane path toward the next COLIBRI service.
    pub transport_path: Option<TransportPath>,
}

impl Reservation {
    /// Creates a reservation without indices, owned by the given AS.
    pub fn new(
        asid: Asn,
        path_type: PathType,
        path_end_props: PathEndProps,
        traffic_split: SplitClass,
        steps: PathSteps,
    ) -> Result<Self, SegmentError> {
        Ok(Reservation {
            id: ReservationId::new_unassigned(asid)?,
            indices: Indices::default(),
            active_index: None,
            path_type,
            path_end_props,
            traffic_split,
            steps,
            current_step: 0,
            transport_path: None,
        })
    }

    /// The ingress interface of this AS on the reservation path.
    pub fn ingress(&self) -> u16 {
        self.steps[self.current_step].ingress
    }

    /// The egress interface of this AS on the reservation path.
    pub fn egress(&self) -> u16 {
        self.steps[self.current_step].egress
    }

    /// Checks every reservation invariant.
    pub fn validate(&self) -> Result<(), SegmentError> {
        if self.id.asid.is_wildcard() {
            return Err(ReservationError::IdUnset.into());
        }
        validate_indices(&self.indices.0)?;
        if let Some(pos) = self.active_index {
            // activation removes all earlier indices, so the active index can
            // only sit at position 0
            if pos != 0 || pos >= self.indices.len() {
                return Err(SegmentError::InvalidActivePosition(pos));
            }
        }
        let mut active: Option<IndexNumber> = None;
        for index in self.indices.iter() {
            if index.state == IndexState::Active {
                if let Some(first) = active {
                    return Err(SegmentError::MultipleActive {
                        first,
                        second: index.idx,
                    });
                }
                active = Some(index.idx);
            }
        }
        self.steps.validate()?;
        if self.current_step >= self.steps.len() {
            return Err(SegmentError::CurrentStepOutOfRange {
                curr: self.current_step,
                count: self.steps.len(),
            });
        }
        if let Some(transport) = &self.transport_path {
            if transport.ingress != self.ingress() || transport.egress != self.egress() {
                return Err(SegmentError::TransportMismatch {
                    dataplane_ingress: transport.ingress,
                    dataplane_egress: transport.egress,
                    ingress: self.ingress(),
                    egress: self.egress(),
                });
            }
        }
        self.path_end_props.validate(self.path_type)?;
        Ok(())
    }

    /// Returns the currently active index, if any.
    pub fn active_index(&self) -> Option<&Index> {
        self.active_index.and_then(|pos| self.indices.get(pos))
    }

    /// Returns the index with the given number.
    pub fn index_at(&self, idx: IndexNumber) -> Option<&Index> {
        self.indices.position(idx).ok().and_then(|pos| self.indices.get(pos))
    }

    /// Appends a new temporary index with an auto-built token.
    ///
    /// The expiration must not precede the one of the last existing index.
    /// Returns the number of the new index.
    pub fn new_index(
        &mut self,
        idx: IndexNumber,
        expiration: DateTime<Utc>,
        min_bw: BwClass,
        max_bw: BwClass,
        alloc_bw: BwClass,
        rlc: Rlc,
    ) -> Result<IndexNumber, SegmentError> {
        let token = Token::new(InfoField {
            idx,
            expiration_tick: ExpirationTick::from_time(expiration),
            bw_cls: alloc_bw,
            rlc,
            path_type: self.path_type,
        });
        self.add_index(Index {
            idx,
            expiration,
            state: IndexState::Temporary,
            min_bw,
            max_bw,
            alloc_bw,
            token,
        })
    }

    /// Appends an index after validating the resulting list. A failed
    /// validation leaves the reservation untouched.
    fn add_index(&mut self, index: Index) -> Result<IndexNumber, SegmentError> {
        let number = index.idx;
        let mut trial = self.indices.0.clone();
        trial.push(index);
        validate_indices(&trial)?;
        self.indices.0 = trial;
        Ok(number)
    }

    /// Returns the ring number to request for the next renewal.
    pub fn next_index_to_renew(&self) -> IndexNumber {
        match self.indices.last() {
            None => IndexNumber::new(0),
            Some(last) => last.idx.add(1),
        }
    }

    /// Returns the index that activation should target: the first pending
    /// index after the active one, or the newest index if none is active.
    pub fn next_index_to_activate(&self) -> Option<&Index> {
        match self.active_index {
            _ if self.indices.is_empty() => None,
            None => self.indices.last(),
            Some(pos) => self.indices.get(pos + 1),
        }
    }

    /// Marks the index as confirmed by the downstream ASes.
    pub fn set_index_confirmed(&mut self, idx: IndexNumber) -> Result<(), SegmentError> {
        let pos = self.indices.position(idx)?;
        if self.indices.0[pos].state == IndexState::Active {
            return Err(SegmentError::ConfirmActive { idx });
        }
        self.indices.0[pos].state = IndexState::Pending;
        Ok(())
    }

    /// Activates the index, pruning all indices before it so that it ends up
    /// at position 0. Activating the already-active index is a no-op;
    /// activating an index older than the active one is refused.
    pub fn set_index_active(&mut self, idx: IndexNumber) -> Result<(), SegmentError> {
        let pos = self.indices.position(idx)?;
        if self.active_index == Some(pos) {
            return Ok(());
        }
        // pending is the nominal state; active happens when reconstructing
        // from the store
        let state = self.indices.0[pos].state;
        if state != IndexState::Pending && state != IndexState::Active {
            return Err(SegmentError::ActivateUnconfirmed { idx, state });
        }
        if let Some(active) = self.active_index {
            if active > pos {
                return Err(SegmentError::ActivatePast {
                    active: self.indices.0[active].idx,
                    requested: idx,
                });
            }
        }
        self.indices.0.drain(..pos);
        self.active_index = Some(0);
        self.indices.0[0].state = IndexState::Active;
        Ok(())
    }

    /// Reverts the active index to pending, as rollback of a failed
    /// activation.
    pub fn set_index_inactive(&mut self) {
        if self.active_index == Some(0) {
            self.indices.0[0].state = IndexState::Pending;
            self.active_index = None;
        }
    }

    /// Removes all indices from the oldest up to and including the given one.
    pub fn remove_index(&mut self, idx: IndexNumber) -> Result<(), SegmentError> {
        let pos = self.indices.position(idx)?;
        self.indices.0.drain(..=pos);
        self.active_index = match self.active_index {
            Some(active) if active > pos => Some(active - pos - 1),
            _ => None,
        };
        Ok(())
    }

    /// The maximum bandwidth blocked by this reservation: the largest
    /// allocation over its indices, in kbps.
    pub fn max_blocked_bw(&self) -> u64 {
        self.indices
            .iter()
            .map(|i| i.alloc_bw)
            .reduce(max_bw_class)
            .map(BwClass::to_kbps)
            .unwrap_or(0)
    }

    /// The maximum bandwidth requested by this reservation, in kbps.
    pub fn max_requested_bw(&self) -> u64 {
        self.indices
            .iter()
            .map(|i| i.max_bw)
            .reduce(max_bw_class)
            .map(BwClass::to_kbps)
            .unwrap_or(0)
    }

    /// Builds the data-plane path of the active index.
    ///
    /// For down-path segments the initiator is the destination of the
    /// traffic, so the path is reversed: its hop fields appear in the
    /// opposite order of the token's and the R flag is set.
    ///
    /// Returns None without an active index or with an empty hop chain.
    pub fn derive_colibri_path(&self) -> Option<ColibriPath> {
        let index = self.active_index()?;
        if index.token.hop_fields.is_empty() {
            return None;
        }
        let mut suffix = [0u8; RES_ID_SUFFIX_LEN];
        suffix[..ReservationId::SUFFIX_LEN].copy_from_slice(&self.id.suffix);
        let mut path = ColibriPath {
            timestamp: 0,
            info: ColibriInfoField {
                c: true,
                r: false,
                s: true,
                version: index.idx.as_u8(),
                curr_hop: 0,
                res_id_suffix: suffix,
                exp_tick: index.token.info.expiration_tick,
                bw_cls: index.alloc_bw,
                rlc: index.token.info.rlc,
                orig_payload_len: 0,
            },
            hop_fields: index
                .token
                .hop_fields
                .iter()
                .map(|hf| {
                    ColibriHopField {
                        ingress: hf.ingress,
                        egress: hf.egress,
                        mac: hf.mac,
                    }
                })
                .collect(),
        };
        if self.path_type == PathType::Down {
            path.reverse();
        }
        Some(path)
    }
}

impl Display for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, idxs: [{}]", self.id, self.indices)
    }
}
