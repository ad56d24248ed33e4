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

//! Reservation tokens: the authenticated hop chain of an index.

use crate::reservation::{BwClass, ExpirationTick, IndexNumber, PathType, Rlc};

/// Length of a hop field MAC.
pub const HOP_MAC_LEN: usize = 4;

/// The reservation parameters authenticated by a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoField {
    /// The index number this token belongs to.
    pub idx: IndexNumber,
    /// The expiration tick of the index.
    pub expiration_tick: ExpirationTick,
    /// The allocated bandwidth class.
    pub bw_cls: BwClass,
    /// The request latency class.
    pub rlc: Rlc,
    /// The direction class of the segment.
    pub path_type: PathType,
}

/// One authenticated hop of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopField {
    /// The ingress interface at this hop, 0 at the path start.
    pub ingress: u16,
    /// The egress interface at this hop, 0 at the path end.
    pub egress: u16,
    /// The MAC over the hop, chained by the on-path ASes.
    pub mac: [u8; HOP_MAC_LEN],
}

/// The hop chain authenticating a reservation index in the data plane.
///
/// Hop fields are appended by the on-path ASes during setup; a token without
/// hop fields belongs to an index that has not completed its first admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The authenticated reservation parameters.
    pub info: InfoField,
    /// The hop fields, in traffic order.
    pub hop_fields: Vec<HopField>,
}

impl Token {
    /// Creates a token for a fresh index, with an empty hop chain.
    pub fn new(info: InfoField) -> Self {
        Token {
            info,
            hop_fields: Vec::new(),
        }
    }
}
