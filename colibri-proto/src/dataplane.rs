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

//! Bit-exact codec for the COLIBRI data-plane path.
//!
//! Wire layout:
//!
//! ```text
//!  0              8                          32              32 + 8*n
//!  +--------------+--------------------------+---------//----+
//!  | timestamp    | info field (24 bytes)    | hop fields    |
//!  +--------------+--------------------------+---------//----+
//! ```
//!
//! Info field:
//!
//! ```text
//! byte  0        flags: C (bit 7), R (bit 6), S (bit 5); low nibble version
//! byte  1        current hop field index
//! byte  2        reserved, zero
//! byte  3        hop field count
//! bytes 4..16    reservation ID suffix, zero padded
//! bytes 16..20   expiration tick, big endian
//! byte  20       bandwidth class
//! byte  21       request latency class
//! bytes 22..24   original payload length, big endian
//! ```
//!
//! Hop field: 2-byte ingress, 2-byte egress (big endian), 4-byte MAC.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::reservation::{BwClass, ExpirationTick, ReservationId, Rlc};

/// Length of the packet timestamp preceding the info field.
pub const TIMESTAMP_LEN: usize = 8;
/// Length of the info field.
pub const INFO_FIELD_LEN: usize = 24;
/// Length of one hop field.
pub const HOP_FIELD_LEN: usize = 8;
/// Length of the zero-padded reservation ID suffix in the info field.
pub const RES_ID_SUFFIX_LEN: usize = 12;

// The wire format breaks if the segment suffix ever outgrows its padding.
const _: () = assert!(ReservationId::SUFFIX_LEN <= RES_ID_SUFFIX_LEN);

const FLAG_C: u8 = 0b1000_0000;
const FLAG_R: u8 = 0b0100_0000;
const FLAG_S: u8 = 0b0010_0000;
const VERSION_MASK: u8 = 0x0F;

/// Errors when decoding a COLIBRI path from its wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathDecodeError {
    /// The buffer is too small to contain the expected layout.
    #[error("buffer too small at {at}: required {required}, actual {actual}")]
    BufferTooSmall {
        /// Location where the buffer was too small.
        at: &'static str,
        /// Number of bytes required.
        required: usize,
        /// Number of bytes actually available.
        actual: usize,
    },
    /// A path must have at least one hop field.
    #[error("hop field count is zero")]
    NoHopFields,
    /// The current hop field points outside the hop field list.
    #[error("current hop field {curr} out of range for {count} hop fields")]
    CurrHopOutOfRange {
        /// The advertised current hop field index.
        curr: u8,
        /// The advertised hop field count.
        count: u8,
    },
    /// The buffer holds bytes beyond the advertised path.
    #[error("{0} trailing bytes after path")]
    TrailingBytes(usize),
}

/// The info field of a COLIBRI data-plane path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColibriInfoField {
    /// Control-plane flag: the packet travels on the control plane share.
    pub c: bool,
    /// Reversed flag: the hop fields are traversed back to front.
    pub r: bool,
    /// Segment flag: the path consists of a single segment reservation.
    pub s: bool,
    /// The 4-bit reservation index version.
    pub version: u8,
    /// The hop field the packet is currently at.
    pub curr_hop: u8,
    /// The reservation ID suffix, zero padded.
    pub res_id_suffix: [u8; RES_ID_SUFFIX_LEN],
    /// The expiration tick of the reservation index.
    pub exp_tick: ExpirationTick,
    /// The allocated bandwidth class.
    pub bw_cls: BwClass,
    /// The request latency class.
    pub rlc: Rlc,
    /// The original payload length of the packet.
    pub orig_payload_len: u16,
}

/// One hop field of a COLIBRI data-plane path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColibriHopField {
    /// The ingress interface of the hop.
    pub ingress: u16,
    /// The egress interface of the hop.
    pub egress: u16,
    /// The MAC authenticating the hop.
    pub mac: [u8; 4],
}

/// A COLIBRI data-plane path: packet timestamp, info field and hop fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColibriPath {
    /// The packet timestamp, set by the sender per packet.
    pub timestamp: u64,
    /// The info field.
    pub info: ColibriInfoField,
    /// The hop fields, at least one.
    pub hop_fields: Vec<ColibriHopField>,
}

impl ColibriPath {
    /// Returns the encoded size of the path in bytes.
    pub fn serialized_len(&self) -> usize {
        TIMESTAMP_LEN + INFO_FIELD_LEN + self.hop_fields.len() * HOP_FIELD_LEN
    }

    /// Encodes the path into its wire representation.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.serialized_len());
        buf.put_u64(self.timestamp);

        let mut flags = self.info.version & VERSION_MASK;
        if self.info.c {
            flags |= FLAG_C;
        }
        if self.info.r {
            flags |= FLAG_R;
        }
        if self.info.s {
            flags |= FLAG_S;
        }
        buf.put_u8(flags);
        buf.put_u8(self.info.curr_hop);
        buf.put_u8(0); // reserved
        buf.put_u8(self.hop_fields.len() as u8);
        buf.put_slice(&self.info.res_id_suffix);
        buf.put_u32(self.info.exp_tick.0);
        buf.put_u8(self.info.bw_cls.0);
        buf.put_u8(self.info.rlc.0);
        buf.put_u16(self.info.orig_payload_len);

        for hf in &self.hop_fields {
            buf.put_u16(hf.ingress);
            buf.put_u16(hf.egress);
            buf.put_slice(&hf.mac);
        }
        buf.freeze()
    }

    /// Decodes a path from its wire representation.
    ///
    /// The buffer must contain exactly one path.
    pub fn decode(buf: &[u8]) -> Result<ColibriPath, PathDecodeError> {
        let header_len = TIMESTAMP_LEN + INFO_FIELD_LEN;
        if buf.len() < header_len {
            return Err(PathDecodeError::BufferTooSmall {
                at: "info field",
                required: header_len,
                actual: buf.len(),
            });
        }
        let mut buf = buf;
        let total = buf.len();

        let timestamp = buf.get_u64();
        let flags = buf.get_u8();
        let curr_hop = buf.get_u8();
        buf.advance(1); // reserved
        let hf_count = buf.get_u8();
        let mut res_id_suffix = [0u8; RES_ID_SUFFIX_LEN];
        buf.copy_to_slice(&mut res_id_suffix);
        let exp_tick = ExpirationTick(buf.get_u32());
        let bw_cls = BwClass(buf.get_u8());
        let rlc = Rlc(buf.get_u8());
        let orig_payload_len = buf.get_u16();

        if hf_count == 0 {
            return Err(PathDecodeError::NoHopFields);
        }
        if curr_hop >= hf_count {
            return Err(PathDecodeError::CurrHopOutOfRange {
                curr: curr_hop,
                count: hf_count,
            });
        }
        let required = header_len + usize::from(hf_count) * HOP_FIELD_LEN;
        if total < required {
            return Err(PathDecodeError::BufferTooSmall {
                at: "hop fields",
                required,
                actual: total,
            });
        }
        if total > required {
            return Err(PathDecodeError::TrailingBytes(total - required));
        }

        let mut hop_fields = Vec::with_capacity(usize::from(hf_count));
        for _ in 0..hf_count {
            let ingress = buf.get_u16();
            let egress = buf.get_u16();
            let mut mac = [0u8; 4];
            buf.copy_to_slice(&mut mac);
            hop_fields.push(ColibriHopField {
                ingress,
                egress,
                mac,
            });
        }

        Ok(ColibriPath {
            timestamp,
            info: ColibriInfoField {
                c: flags & FLAG_C != 0,
                r: flags & FLAG_R != 0,
                s: flags & FLAG_S != 0,
                version: flags & VERSION_MASK,
                curr_hop,
                res_id_suffix,
                exp_tick,
                bw_cls,
                rlc,
                orig_payload_len,
            },
            hop_fields,
        })
    }

    /// Reverses the path in place for traffic in the opposite direction:
    /// toggles the R flag, reverses the hop field order, and keeps the
    /// current hop field pointing at the same hop.
    pub fn reverse(&mut self) {
        self.info.r = !self.info.r;
        self.hop_fields.reverse();
        self.info.curr_hop = self.hop_fields.len() as u8 - 1 - self.info.curr_hop;
    }
}

/// The data-plane path on which control-plane requests for a reservation are
/// transported to the next COLIBRI service.
///
/// The raw bytes are opaque to the keeper; only the ingress and egress of the
/// current hop are kept for consistency checks against the reservation steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPath {
    /// The ingress interface at the current step.
    pub ingress: u16,
    /// The egress interface at the current step.
    pub egress: u16,
    /// The serialized data-plane path.
    pub raw: Bytes,
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn sample_path() -> ColibriPath {
        ColibriPath {
            timestamp: 0x0102_0304_0506_0708,
            info: ColibriInfoField {
                c: true,
                r: false,
                s: true,
                version: 3,
                curr_hop: 0,
                res_id_suffix: [9, 8, 7, 6, 0, 0, 0, 0, 0, 0, 0, 0],
                exp_tick: ExpirationTick(0x2233_4455),
                bw_cls: BwClass(13),
                rlc: Rlc(2),
                orig_payload_len: 1280,
            },
            hop_fields: vec![
                ColibriHopField {
                    ingress: 0,
                    egress: 1,
                    mac: [0xaa, 0xbb, 0xcc, 0xdd],
                },
                ColibriHopField {
                    ingress: 2,
                    egress: 3,
                    mac: [0x11, 0x22, 0x33, 0x44],
                },
                ColibriHopField {
                    ingress: 4,
                    egress: 0,
                    mac: [0x55, 0x66, 0x77, 0x88],
                },
            ],
        }
    }

    #[test]
    fn should_encode_the_documented_layout() {
        let path = sample_path();
        let wire = path.encode();
        assert_eq!(wire.len(), path.serialized_len());
        assert_eq!(wire.len(), 8 + 24 + 3 * 8);
        // flags: C and S set, version 3
        assert_eq!(wire[8], 0b1010_0011);
        assert_eq!(wire[9], 0); // curr hop
        assert_eq!(wire[10], 0); // reserved
        assert_eq!(wire[11], 3); // hop field count
        assert_eq!(&wire[12..24], &path.info.res_id_suffix);
        assert_eq!(&wire[24..28], &[0x22, 0x33, 0x44, 0x55]);
        assert_eq!(wire[28], 13);
        assert_eq!(wire[29], 2);
        assert_eq!(&wire[30..32], &[0x05, 0x00]);
        // second hop field, interfaces big endian
        assert_eq!(&wire[40..48], &[0, 2, 0, 3, 0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn should_roundtrip_serialization() {
        let path = sample_path();
        let wire = path.encode();
        let decoded = ColibriPath::decode(&wire).unwrap();
        assert_eq!(decoded, path);
        assert_eq!(decoded.encode(), wire);
    }

    #[test]
    fn should_reject_malformed_buffers() {
        let path = sample_path();
        let wire = path.encode();

        assert_eq!(
            ColibriPath::decode(&wire[..20]),
            Err(PathDecodeError::BufferTooSmall {
                at: "info field",
                required: 32,
                actual: 20,
            })
        );
        assert_eq!(
            ColibriPath::decode(&wire[..wire.len() - 8]),
            Err(PathDecodeError::BufferTooSmall {
                at: "hop fields",
                required: 56,
                actual: 48,
            })
        );

        let mut long = wire.to_vec();
        long.push(0);
        assert_eq!(
            ColibriPath::decode(&long),
            Err(PathDecodeError::TrailingBytes(1))
        );

        let mut no_hops = wire.to_vec();
        no_hops[11] = 0;
        assert_eq!(
            ColibriPath::decode(&no_hops[..32]),
            Err(PathDecodeError::NoHopFields)
        );

        let mut bad_curr = wire.to_vec();
        bad_curr[9] = 3;
        assert_eq!(
            ColibriPath::decode(&bad_curr),
            Err(PathDecodeError::CurrHopOutOfRange { curr: 3, count: 3 })
        );
    }

    #[test]
    fn should_reverse_hop_order_and_flag() {
        let mut path = sample_path();
        let forward = path.hop_fields.clone();
        path.reverse();
        assert!(path.info.r);
        assert_eq!(path.info.curr_hop, 2);
        let reversed: Vec<_> = forward.into_iter().rev().collect();
        assert_eq!(path.hop_fields, reversed);
        path.reverse();
        assert_eq!(path, sample_path());
    }

    proptest! {
        #[test]
        fn should_roundtrip_arbitrary_paths(
            timestamp in any::<u64>(),
            flags in any::<[bool; 3]>(),
            version in 0u8..16,
            suffix in any::<[u8; RES_ID_SUFFIX_LEN]>(),
            exp_tick in any::<u32>(),
            bw_cls in any::<u8>(),
            rlc in any::<u8>(),
            payload_len in any::<u16>(),
            hops in prop::collection::vec(
                (any::<u16>(), any::<u16>(), any::<[u8; 4]>()),
                1..16,
            ),
            curr_seed in any::<prop::sample::Index>(),
        ) {
            let path = ColibriPath {
                timestamp,
                info: ColibriInfoField {
                    c: flags[0],
                    r: flags[1],
                    s: flags[2],
                    version,
                    curr_hop: curr_seed.index(hops.len()) as u8,
                    res_id_suffix: suffix,
                    exp_tick: ExpirationTick(exp_tick),
                    bw_cls: BwClass(bw_cls),
                    rlc: Rlc(rlc),
                    orig_payload_len: payload_len,
                },
                hop_fields: hops
                    .into_iter()
                    .map(|(ingress, egress, mac)| ColibriHopField { ingress, egress, mac })
                    .collect(),
            };
            let wire = path.encode();
            let decoded = ColibriPath::decode(&wire).unwrap();
            prop_assert_eq!(&decoded, &path);
            prop_assert_eq!(decoded.encode(), wire);
        }
    }
}
