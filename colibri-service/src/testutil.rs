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

//! Reservation builders shared by the service tests.

use chrono::{DateTime, TimeZone, Utc};
use colibri_proto::{
    reservation::{BwClass, IndexNumber, PathEndProps, PathType, Rlc, SplitClass},
    steps::{PathStep, PathSteps},
    token::HopField,
};

use crate::segment::{IndexState, Reservation};

/// Returns the instant the given number of seconds after the epoch.
pub(crate) fn secs_to_time(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// Builds a step list from (isd-as, ingress, egress) triples.
pub(crate) fn steps(spec: &[(&str, u16, u16)]) -> PathSteps {
    PathSteps::new(
        spec.iter()
            .map(|(ia, ingress, egress)| {
                PathStep {
                    ingress: *ingress,
                    egress: *egress,
                    isd_asn: ia.parse().unwrap(),
                }
            })
            .collect(),
    )
}

/// Starts building a reservation on a direct 1-ff00:0:1 -> 1-ff00:0:2 path.
pub(crate) fn rsv() -> ReservationBuilder {
    ReservationBuilder {
        path: vec![
            ("1-ff00:0:1".into(), 0, 1),
            ("1-ff00:0:2".into(), 1, 0),
        ],
        path_type: PathType::Up,
        end_props: PathEndProps::START_LOCAL | PathEndProps::END_LOCAL | PathEndProps::END_TRANSFER,
        traffic_split: SplitClass(2),
        indices: Vec::new(),
        confirm_all: false,
        active: None,
    }
}

pub(crate) struct IndexSpec {
    number: u8,
    expiration_secs: i64,
    min_bw: u8,
    max_bw: u8,
    alloc_bw: u8,
    hop_fields: Vec<(u16, u16)>,
}

pub(crate) struct ReservationBuilder {
    path: Vec<(String, u16, u16)>,
    path_type: PathType,
    end_props: PathEndProps,
    traffic_split: SplitClass,
    indices: Vec<IndexSpec>,
    confirm_all: bool,
    active: Option<u8>,
}

impl ReservationBuilder {
    pub fn with_path(mut self, spec: &[(&str, u16, u16)]) -> Self {
        self.path = spec
            .iter()
            .map(|(ia, ingress, egress)| ((*ia).into(), *ingress, *egress))
            .collect();
        self
    }

    pub fn with_path_type(mut self, path_type: PathType) -> Self {
        self.path_type = path_type;
        self
    }

    pub fn with_end_props(mut self, end_props: PathEndProps) -> Self {
        self.end_props = end_props;
        self
    }

    pub fn with_split(mut self, split: u8) -> Self {
        self.traffic_split = SplitClass(split);
        self
    }

    /// Adds an index spec: (ring number, expiration seconds, min, max, alloc).
    pub fn add_index(
        mut self,
        number: u8,
        expiration_secs: i64,
        min_bw: u8,
        max_bw: u8,
        alloc_bw: u8,
    ) -> Self {
        self.indices.push(IndexSpec {
            number,
            expiration_secs,
            min_bw,
            max_bw,
            alloc_bw,
            hop_fields: Vec::new(),
        });
        self
    }

    /// Fills the hop chain of the most recently added index.
    pub fn with_hop_fields(mut self, hops: &[(u16, u16)]) -> Self {
        let spec = self
            .indices
            .last_mut()
            .expect("with_hop_fields requires a prior add_index");
        spec.hop_fields = hops.to_vec();
        self
    }

    /// Confirms every index added so far.
    pub fn confirm_all(mut self) -> Self {
        self.confirm_all = true;
        self
    }

    /// Activates the index with the given ring number, pruning older ones.
    pub fn with_active(mut self, number: u8) -> Self {
        self.active = Some(number);
        self
    }

    pub fn build(self) -> Reservation {
        let path: Vec<(&str, u16, u16)> = self
            .path
            .iter()
            .map(|(ia, ingress, egress)| (ia.as_str(), *ingress, *egress))
            .collect();
        let mut r = Reservation::new(
            "ff00:0:1".parse().unwrap(),
            self.path_type,
            self.end_props,
            self.traffic_split,
            steps(&path),
        )
        .unwrap();

        for spec in &self.indices {
            r.new_index(
                IndexNumber::new(spec.number),
                secs_to_time(spec.expiration_secs),
                BwClass(spec.min_bw),
                BwClass(spec.max_bw),
                BwClass(spec.alloc_bw),
                Rlc(0),
            )
            .unwrap();
            if !spec.hop_fields.is_empty() {
                let pos = r.indices.len() - 1;
                let hop_fields: Vec<HopField> = spec
                    .hop_fields
                    .iter()
                    .map(|(ingress, egress)| {
                        HopField {
                            ingress: *ingress,
                            egress: *egress,
                            mac: [0; 4],
                        }
                    })
                    .collect();
                set_hop_fields(&mut r, pos, hop_fields);
            }
        }
        if self.confirm_all {
            let numbers: Vec<IndexNumber> = r.indices.iter().map(|i| i.idx).collect();
            for number in numbers {
                r.set_index_confirmed(number).unwrap();
            }
        }
        if let Some(number) = self.active {
            let number = IndexNumber::new(number);
            if r.index_at(number).map(|i| i.state) == Some(IndexState::Temporary) {
                r.set_index_confirmed(number).unwrap();
            }
            r.set_index_active(number).unwrap();
        }
        r
    }
}

/// Stands in for the on-path ASes appending their hop fields during setup.
fn set_hop_fields(r: &mut Reservation, pos: usize, hop_fields: Vec<HopField>) {
    r.indices.get_mut(pos).unwrap().token.hop_fields = hop_fields;
}
