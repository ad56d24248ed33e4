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

//! The reservations the keeper has to maintain.
//!
//! Loaded from a JSON document listing one entry per wanted reservation:
//!
//! ```json
//! {
//!   "Rsvs": [
//!     {
//!       "DstAS": "1-ff00:0:2",
//!       "PathType": "up",
//!       "PathPredicate": "1-ff00:0:1 1-ff00:0:2",
//!       "MinSize": 10,
//!       "MaxSize": 42,
//!       "SplitCls": 2,
//!       "EndProps": 49
//!     }
//!   ]
//! }
//! ```

use colibri_proto::{
    address::IsdAsn,
    policy::{Sequence, SequenceParseError},
    reservation::{BwClass, PathEndProps, PathType, ReservationError, SplitClass},
};
use serde::Deserialize;
use thiserror::Error;

/// Errors when loading the reservations configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON of the expected shape.
    #[error("malformed reservations file: {0}")]
    Malformed(#[from] serde_json::Error),
    /// An entry requests an empty bandwidth range.
    #[error("min bw must be less or equal than max bw: min {min}, max {max}")]
    BandwidthRange {
        /// The configured minimum class.
        min: BwClass,
        /// The configured maximum class.
        max: BwClass,
    },
    /// An entry carries an unparsable path predicate.
    #[error("invalid path predicate: {0}")]
    Predicate(#[from] SequenceParseError),
    /// An entry carries unknown end-property bits.
    #[error(transparent)]
    EndProps(#[from] ReservationError),
}

/// The requirements of one configured reservation.
#[derive(Debug, Clone)]
pub struct ReservationConfig {
    /// The destination AS of the reservation.
    pub dst: IsdAsn,
    /// The direction class of the segment.
    pub path_type: PathType,
    /// The sequence predicate paths have to satisfy.
    pub predicate: Sequence,
    /// The smallest acceptable bandwidth class.
    pub min_bw: BwClass,
    /// The largest requested bandwidth class.
    pub max_bw: BwClass,
    /// The required traffic split class.
    pub split_cls: SplitClass,
    /// The required path-end properties.
    pub end_props: PathEndProps,
}

/// The validated reservations configuration.
#[derive(Debug, Clone, Default)]
pub struct ReservationsConfig {
    /// One entry per reservation to keep.
    pub entries: Vec<ReservationConfig>,
}

impl ReservationsConfig {
    /// Parses and validates a reservations JSON document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let file: ReservationsFile = serde_json::from_str(raw)?;
        let mut entries = Vec::with_capacity(file.rsvs.len());
        for entry in file.rsvs {
            if entry.min_size > entry.max_size {
                return Err(ConfigError::BandwidthRange {
                    min: entry.min_size,
                    max: entry.max_size,
                });
            }
            entries.push(ReservationConfig {
                dst: entry.dst_as,
                path_type: entry.path_type,
                predicate: Sequence::parse(&entry.path_predicate)?,
                min_bw: entry.min_size,
                max_bw: entry.max_size,
                split_cls: entry.split_cls,
                end_props: PathEndProps::from_bits(entry.end_props)?,
            });
        }
        Ok(ReservationsConfig { entries })
    }
}

#[derive(Debug, Deserialize)]
struct ReservationsFile {
    #[serde(rename = "Rsvs", default)]
    rsvs: Vec<ReservationEntry>,
}

#[derive(Debug, Deserialize)]
struct ReservationEntry {
    #[serde(rename = "DstAS")]
    dst_as: IsdAsn,
    #[serde(rename = "PathType")]
    path_type: PathType,
    #[serde(rename = "PathPredicate")]
    path_predicate: String,
    #[serde(rename = "MinSize")]
    min_size: BwClass,
    #[serde(rename = "MaxSize")]
    max_size: BwClass,
    #[serde(rename = "SplitCls")]
    split_cls: SplitClass,
    #[serde(rename = "EndProps")]
    end_props: u8,
}
