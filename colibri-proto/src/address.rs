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

//! ISD and AS addressing.
//!
//! An autonomous system is addressed by the (ISD, ASN) tuple, written
//! `1-ff00:0:2`. The value 0 is a wildcard for both components.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors when parsing addresses from their string representation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    /// The ISD component is not a decimal 16-bit number.
    #[error("invalid ISD: {0}")]
    InvalidIsd(String),
    /// The ASN component is malformed or out of range.
    #[error("invalid ASN: {0}")]
    InvalidAsn(String),
    /// The ISD-AS separator is missing.
    #[error("invalid ISD-AS: {0}")]
    InvalidIsdAsn(String),
}

/// An isolation domain identifier.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Isd(pub u16);

impl Isd {
    /// The wildcard ISD, matching any isolation domain.
    pub const WILDCARD: Isd = Isd(0);

    /// Returns true if this ISD matches any isolation domain.
    pub fn is_wildcard(&self) -> bool {
        self.0 == 0
    }

    /// Checks the given ISD against this one, treating 0 as a wildcard.
    pub fn matches(&self, other: Isd) -> bool {
        self.is_wildcard() || *self == other
    }
}

impl From<u16> for Isd {
    fn from(value: u16) -> Self {
        Isd(value)
    }
}

impl FromStr for Isd {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u16>()
            .map(Isd)
            .map_err(|_| AddressParseError::InvalidIsd(s.into()))
    }
}

impl Display for Isd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 48-bit autonomous system number.
///
/// Low numbers (below 2^32) are written in decimal, SCION-style numbers as
/// three 16-bit hexadecimal groups, e.g. `ff00:0:2`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Asn(u64);

impl Asn {
    /// The number of bits in an ASN.
    pub const BITS: u32 = 48;
    /// The largest representable ASN.
    pub const MAX: Asn = Asn((1 << Self::BITS) - 1);
    /// The wildcard ASN, matching any AS.
    pub const WILDCARD: Asn = Asn(0);

    const BGP_MAX: u64 = u32::MAX as u64;
    const GROUP_BITS: u32 = 16;
    const GROUP_MASK: u64 = (1 << Self::GROUP_BITS) - 1;

    /// Creates a new ASN. Returns None if the value exceeds 48 bits.
    pub fn new(value: u64) -> Option<Asn> {
        (value <= Self::MAX.0).then_some(Asn(value))
    }

    /// Returns the ASN as a u64.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns true if this ASN matches any AS.
    pub fn is_wildcard(&self) -> bool {
        self.0 == 0
    }

    /// Checks the given ASN against this one, treating 0 as a wildcard.
    pub fn matches(&self, other: Asn) -> bool {
        self.is_wildcard() || *self == other
    }
}

impl FromStr for Asn {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.contains(':') {
            // BGP-style decimal ASN, restricted to 32 bits.
            let value = s
                .parse::<u64>()
                .map_err(|_| AddressParseError::InvalidAsn(s.into()))?;
            if value > Self::BGP_MAX {
                return Err(AddressParseError::InvalidAsn(s.into()));
            }
            return Ok(Asn(value));
        }

        let mut value = 0u64;
        let mut groups = 0;
        for group in s.split(':') {
            if groups == 3 || group.is_empty() || group.len() > 4 {
                return Err(AddressParseError::InvalidAsn(s.into()));
            }
            let group = u64::from_str_radix(group, 16)
                .map_err(|_| AddressParseError::InvalidAsn(s.into()))?;
            value = (value << Self::GROUP_BITS) | group;
            groups += 1;
        }
        if groups != 3 {
            return Err(AddressParseError::InvalidAsn(s.into()));
        }
        Ok(Asn(value))
    }
}

impl Display for Asn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 <= Self::BGP_MAX {
            return write!(f, "{}", self.0);
        }
        write!(
            f,
            "{:x}:{:x}:{:x}",
            (self.0 >> (2 * Self::GROUP_BITS)) & Self::GROUP_MASK,
            (self.0 >> Self::GROUP_BITS) & Self::GROUP_MASK,
            self.0 & Self::GROUP_MASK,
        )
    }
}

/// The (ISD, ASN) tuple addressing an autonomous system.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsdAsn {
    /// The isolation domain.
    pub isd: Isd,
    /// The AS number within the isolation domain.
    pub asn: Asn,
}

impl IsdAsn {
    /// The wildcard ISD-AS, matching any AS anywhere.
    pub const WILDCARD: IsdAsn = IsdAsn {
        isd: Isd::WILDCARD,
        asn: Asn::WILDCARD,
    };

    /// Creates a new ISD-AS tuple.
    pub fn new(isd: impl Into<Isd>, asn: Asn) -> Self {
        IsdAsn {
            isd: isd.into(),
            asn,
        }
    }

    /// Returns true if either component is a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.isd.is_wildcard() || self.asn.is_wildcard()
    }
}

impl FromStr for IsdAsn {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (isd, asn) = s
            .split_once('-')
            .ok_or_else(|| AddressParseError::InvalidIsdAsn(s.into()))?;
        Ok(IsdAsn {
            isd: isd.parse()?,
            asn: asn.parse()?,
        })
    }
}

impl Display for IsdAsn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.isd, self.asn)
    }
}

impl Serialize for IsdAsn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IsdAsn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_and_format_isd_asn() {
        let ia: IsdAsn = "1-ff00:0:2".parse().unwrap();
        assert_eq!(ia.isd, Isd(1));
        assert_eq!(ia.asn, Asn::new(0xff00_0000_0002).unwrap());
        assert_eq!(ia.to_string(), "1-ff00:0:2");
    }

    #[test]
    fn should_parse_bgp_style_asn() {
        let ia: IsdAsn = "3-64496".parse().unwrap();
        assert_eq!(ia.asn, Asn::new(64496).unwrap());
        assert_eq!(ia.to_string(), "3-64496");
    }

    #[test]
    fn should_reject_malformed_addresses() {
        assert!("1".parse::<IsdAsn>().is_err());
        assert!("x-ff00:0:2".parse::<IsdAsn>().is_err());
        assert!("1-ff00:0".parse::<IsdAsn>().is_err());
        assert!("1-ff00:0:2:3".parse::<IsdAsn>().is_err());
        assert!("1-fffff:0:2".parse::<IsdAsn>().is_err());
        // decimal ASNs are restricted to 32 bits
        assert!("1-4294967296".parse::<IsdAsn>().is_err());
    }

    #[test]
    fn should_match_wildcards() {
        let wild: IsdAsn = "0-0".parse().unwrap();
        let concrete: IsdAsn = "1-ff00:0:2".parse().unwrap();
        assert!(wild.is_wildcard());
        assert!(!concrete.is_wildcard());
        assert!(Isd::WILDCARD.matches(concrete.isd));
        assert!(Asn::WILDCARD.matches(concrete.asn));
        assert!(!concrete.isd.matches(Isd(2)));
    }

    #[test]
    fn should_roundtrip_serde() {
        let ia: IsdAsn = "1-ff00:0:2".parse().unwrap();
        let json = serde_json::to_string(&ia).unwrap();
        assert_eq!(json, "\"1-ff00:0:2\"");
        let back: IsdAsn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ia);
    }
}
