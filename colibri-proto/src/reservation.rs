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

//! Reservation identifiers, index numbers, ticks and traffic classes.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Asn;

/// Errors for reservation primitive values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReservationError {
    /// The AS identifier of a reservation ID is unset.
    #[error("reservation ID not set")]
    IdUnset,
    /// An end-property bitset contains bits outside the defined flags.
    #[error("unknown end property bits: {0:#04x}")]
    UnknownEndProps(u8),
    /// An end-property bitset is inconsistent with the path type.
    #[error("end properties {props} invalid for {path_type} segments")]
    EndPropsMismatch {
        /// The offending property bitset.
        props: PathEndProps,
        /// The path type the properties were validated against.
        path_type: PathType,
    },
    /// A path type string is not one of up, core, down.
    #[error("unknown path type: {0}")]
    UnknownPathType(String),
}

/// A reservation index number on the 4-bit ring.
///
/// Index numbers wrap modulo 16. There is no meaningful total order on the
/// ring; older/newer relations are derived from the position inside a
/// reservation's index list, never from the raw value.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct IndexNumber(u8);

impl IndexNumber {
    /// The size of the index number ring.
    pub const RING: u8 = 16;

    /// Creates an index number, reducing the value modulo 16.
    pub fn new(value: u8) -> Self {
        IndexNumber(value % Self::RING)
    }

    /// Ring successor at the given distance.
    pub fn add(self, n: u8) -> Self {
        IndexNumber((self.0 + n % Self::RING) % Self::RING)
    }

    /// Ring predecessor at the given distance.
    pub fn sub(self, n: u8) -> Self {
        IndexNumber((self.0 + Self::RING - n % Self::RING) % Self::RING)
    }

    /// Returns the raw value in [0, 15].
    pub fn as_u8(self) -> u8 {
        self.0
    }
}

impl From<u8> for IndexNumber {
    fn from(value: u8) -> Self {
        IndexNumber::new(value)
    }
}

impl Display for IndexNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Duration of one expiration tick.
pub const TICK_DURATION_SECS: i64 = 4;

/// An expiration instant in 4-second quanta since the Unix epoch.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ExpirationTick(pub u32);

impl ExpirationTick {
    /// Returns the tick containing the given instant.
    ///
    /// Instants before the epoch map to tick 0.
    pub fn from_time(t: DateTime<Utc>) -> Self {
        let secs = t.timestamp().max(0);
        ExpirationTick((secs / TICK_DURATION_SECS) as u32)
    }

    /// Returns the instant at which this tick starts.
    pub fn to_time(self) -> DateTime<Utc> {
        Utc.timestamp_opt(i64::from(self.0) * TICK_DURATION_SECS, 0)
            .single()
            .unwrap_or_default()
    }
}

impl Display for ExpirationTick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A logarithmic bandwidth class.
///
/// Class 0 reserves no bandwidth; class n corresponds to `16 * sqrt(2^(n-1))`
/// kbps, which makes `to_kbps` strictly monotone over the classes.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BwClass(pub u8);

impl BwClass {
    /// Converts the class to its bandwidth in kbps.
    pub fn to_kbps(self) -> u64 {
        if self.0 == 0 {
            return 0;
        }
        (16.0 * f64::powf(2.0, f64::from(self.0 - 1) / 2.0)).floor() as u64
    }
}

/// Returns the larger of two bandwidth classes.
pub fn max_bw_class(a: BwClass, b: BwClass) -> BwClass {
    a.max(b)
}

impl Display for BwClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The traffic split class between control and data planes.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SplitClass(pub u8);

impl Display for SplitClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The request latency class.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Rlc(pub u8);

impl Display for Rlc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The direction class of a segment reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathType {
    /// Toward a core AS.
    Up,
    /// Between core ASes.
    Core,
    /// From a core AS toward a leaf.
    Down,
}

impl Display for PathType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PathType::Up => "up",
            PathType::Core => "core",
            PathType::Down => "down",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PathType {
    type Err = ReservationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(PathType::Up),
            "core" => Ok(PathType::Core),
            "down" => Ok(PathType::Down),
            _ => Err(ReservationError::UnknownPathType(s.into())),
        }
    }
}

/// Properties of the two ends of a segment reservation.
///
/// The start bits describe what the first AS on the path may do with the
/// reservation, the end bits the last AS: terminate traffic locally, transfer
/// it onto a stitched reservation, or both.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PathEndProps(u8);

impl PathEndProps {
    /// The first AS may source traffic locally.
    pub const START_LOCAL: PathEndProps = PathEndProps(0x01);
    /// The first AS may stitch traffic from another reservation.
    pub const START_TRANSFER: PathEndProps = PathEndProps(0x02);
    /// The last AS may sink traffic locally.
    pub const END_LOCAL: PathEndProps = PathEndProps(0x10);
    /// The last AS may stitch traffic onto another reservation.
    pub const END_TRANSFER: PathEndProps = PathEndProps(0x20);

    const ALL: u8 = 0x01 | 0x02 | 0x10 | 0x20;

    /// Creates a property bitset from its raw bits.
    ///
    /// Unknown bits are rejected.
    pub fn from_bits(bits: u8) -> Result<Self, ReservationError> {
        if bits & !Self::ALL != 0 {
            return Err(ReservationError::UnknownEndProps(bits & !Self::ALL));
        }
        Ok(PathEndProps(bits))
    }

    /// Returns the raw bits.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if all bits of `other` are set in this bitset.
    pub fn contains(self, other: PathEndProps) -> bool {
        self.0 & other.0 == other.0
    }

    /// Validates the properties against the segment direction.
    ///
    /// The initiator of an up-path segment is its start and must be allowed
    /// to source traffic locally; the initiator of a down-path segment is its
    /// end and must be allowed to sink traffic locally.
    pub fn validate(self, path_type: PathType) -> Result<(), ReservationError> {
        Self::from_bits(self.0)?;
        let consistent = match path_type {
            PathType::Up => self.contains(Self::START_LOCAL),
            PathType::Down => self.contains(Self::END_LOCAL),
            PathType::Core => true,
        };
        if !consistent {
            return Err(ReservationError::EndPropsMismatch {
                props: self,
                path_type,
            });
        }
        Ok(())
    }
}

impl std::ops::BitOr for PathEndProps {
    type Output = PathEndProps;

    fn bitor(self, rhs: PathEndProps) -> PathEndProps {
        PathEndProps(self.0 | rhs.0)
    }
}

impl Display for PathEndProps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// A segment reservation identifier: the owning AS plus a fixed-size suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReservationId {
    /// The AS that created the reservation.
    pub asid: Asn,
    /// The per-AS reservation suffix.
    pub suffix: [u8; ReservationId::SUFFIX_LEN],
}

impl ReservationId {
    /// Length of the suffix of a segment reservation ID.
    pub const SUFFIX_LEN: usize = 4;

    /// Creates a reservation ID. Fails if the AS identifier is unset.
    pub fn new(asid: Asn, suffix: [u8; Self::SUFFIX_LEN]) -> Result<Self, ReservationError> {
        if asid.is_wildcard() {
            return Err(ReservationError::IdUnset);
        }
        Ok(ReservationId { asid, suffix })
    }

    /// Creates a reservation ID with a zeroed suffix, as used for setup
    /// requests before the destination assigns one.
    pub fn new_unassigned(asid: Asn) -> Result<Self, ReservationError> {
        Self::new(asid, [0; Self::SUFFIX_LEN])
    }
}

impl Display for ReservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-", self.asid)?;
        for b in &self.suffix {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_wrap_index_numbers_on_the_ring() {
        assert_eq!(IndexNumber::new(15).add(1), IndexNumber::new(0));
        assert_eq!(IndexNumber::new(0).sub(1), IndexNumber::new(15));
        assert_eq!(IndexNumber::new(7).add(12), IndexNumber::new(3));
        assert_eq!(IndexNumber::new(3).sub(12), IndexNumber::new(7));
        assert_eq!(IndexNumber::new(16), IndexNumber::new(0));
    }

    #[test]
    fn should_convert_ticks() {
        let t = Utc.timestamp_opt(40, 0).unwrap();
        assert_eq!(ExpirationTick::from_time(t), ExpirationTick(10));
        assert_eq!(ExpirationTick(10).to_time(), t);
        // partial quanta round down
        let t = Utc.timestamp_opt(43, 500).unwrap();
        assert_eq!(ExpirationTick::from_time(t), ExpirationTick(10));
    }

    #[test]
    fn should_keep_bw_classes_strictly_monotone() {
        assert_eq!(BwClass(0).to_kbps(), 0);
        assert_eq!(BwClass(1).to_kbps(), 16);
        let mut prev = BwClass(0).to_kbps();
        for cls in 1..=63u8 {
            let kbps = BwClass(cls).to_kbps();
            assert!(kbps > prev, "class {cls} not monotone");
            prev = kbps;
        }
        assert_eq!(max_bw_class(BwClass(3), BwClass(9)), BwClass(9));
    }

    #[test]
    fn should_validate_end_props() {
        let props = PathEndProps::START_LOCAL | PathEndProps::END_LOCAL;
        assert!(props.validate(PathType::Up).is_ok());
        assert!(props.validate(PathType::Down).is_ok());

        let transfer_only = PathEndProps::START_TRANSFER | PathEndProps::END_LOCAL;
        assert!(transfer_only.validate(PathType::Up).is_err());
        assert!(transfer_only.validate(PathType::Core).is_ok());

        assert!(PathEndProps::from_bits(0x40).is_err());
        assert_eq!(
            PathEndProps::from_bits(0x33).unwrap(),
            PathEndProps::START_LOCAL
                | PathEndProps::START_TRANSFER
                | PathEndProps::END_LOCAL
                | PathEndProps::END_TRANSFER
        );
    }

    #[test]
    fn should_reject_unset_reservation_ids() {
        assert_eq!(
            ReservationId::new_unassigned(Asn::WILDCARD),
            Err(ReservationError::IdUnset)
        );
        let id = ReservationId::new("ff00:0:1".parse().unwrap(), [0, 0, 0, 0x2a]).unwrap();
        assert_eq!(id.to_string(), "ff00:0:1-0000002a");
    }
}
