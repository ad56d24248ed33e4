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

//! The ordered AS hops of a segment reservation.

use std::fmt::Display;

use thiserror::Error;

use crate::address::IsdAsn;

/// Errors for malformed step lists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepsError {
    /// A step list must contain at least the source and destination AS.
    #[error("too few steps: {0}")]
    TooFewSteps(usize),
    /// The source AS has no ingress interface.
    #[error("wrong interface for source ingress: {0}")]
    SourceIngress(u16),
    /// The destination AS has no egress interface.
    #[error("wrong interface for destination egress: {0}")]
    DestinationEgress(u16),
}

/// One AS hop of a reservation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    /// The ingress interface, 0 at the first step.
    pub ingress: u16,
    /// The egress interface, 0 at the last step.
    pub egress: u16,
    /// The AS traversed at this step.
    pub isd_asn: IsdAsn,
}

/// An interface of an on-path AS, as listed between consecutive steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathInterface {
    /// The AS owning the interface.
    pub isd_asn: IsdAsn,
    /// The interface identifier.
    pub id: u16,
}

/// The ordered list of AS hops of a segment reservation, in traffic order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSteps(Vec<PathStep>);

impl PathSteps {
    /// Creates a step list without validating its shape.
    pub fn new(steps: Vec<PathStep>) -> Self {
        PathSteps(steps)
    }

    /// Validates the shape of the step list: at least two steps, no ingress
    /// at the source, no egress at the destination.
    pub fn validate(&self) -> Result<(), StepsError> {
        if self.0.len() < 2 {
            return Err(StepsError::TooFewSteps(self.0.len()));
        }
        if self.0[0].ingress != 0 {
            return Err(StepsError::SourceIngress(self.0[0].ingress));
        }
        let last = &self.0[self.0.len() - 1];
        if last.egress != 0 {
            return Err(StepsError::DestinationEgress(last.egress));
        }
        Ok(())
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no steps.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the step at the given position.
    pub fn get(&self, i: usize) -> Option<&PathStep> {
        self.0.get(i)
    }

    /// Iterates over the steps in traffic order.
    pub fn iter(&self) -> std::slice::Iter<'_, PathStep> {
        self.0.iter()
    }

    /// Returns the AS at the start of the path.
    pub fn src_ia(&self) -> IsdAsn {
        self.0.first().map(|s| s.isd_asn).unwrap_or_default()
    }

    /// Returns the AS at the end of the path.
    pub fn dst_ia(&self) -> IsdAsn {
        self.0.last().map(|s| s.isd_asn).unwrap_or_default()
    }

    /// Returns the steps in the opposite traffic direction, with ingress and
    /// egress interfaces swapped.
    pub fn reverse(&self) -> PathSteps {
        let mut steps: Vec<PathStep> = self
            .0
            .iter()
            .map(|s| {
                PathStep {
                    ingress: s.egress,
                    egress: s.ingress,
                    isd_asn: s.isd_asn,
                }
            })
            .collect();
        steps.reverse();
        PathSteps(steps)
    }

    /// Returns the traversed interfaces in traffic order: the egress of every
    /// step but the last, interleaved with the ingress of every step but the
    /// first. The zero interfaces at the two path ends are not listed.
    pub fn interfaces(&self) -> Vec<PathInterface> {
        let mut ifaces = Vec::with_capacity(2 * self.0.len().saturating_sub(1));
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                ifaces.push(PathInterface {
                    isd_asn: step.isd_asn,
                    id: step.ingress,
                });
            }
            if i < self.0.len() - 1 {
                ifaces.push(PathInterface {
                    isd_asn: step.isd_asn,
                    id: step.egress,
                });
            }
        }
        ifaces
    }
}

impl std::ops::Index<usize> for PathSteps {
    type Output = PathStep;

    fn index(&self, i: usize) -> &PathStep {
        &self.0[i]
    }
}

impl<'s> IntoIterator for &'s PathSteps {
    type Item = &'s PathStep;
    type IntoIter = std::slice::Iter<'s, PathStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for PathSteps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for step in &self.0 {
            if !first {
                write!(f, ">")?;
            }
            write!(f, "{}#{},{}", step.isd_asn, step.ingress, step.egress)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(spec: &[(&str, u16, u16)]) -> PathSteps {
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

    #[test]
    fn should_validate_step_shape() {
        let good = steps(&[("1-ff00:0:1", 0, 1), ("1-ff00:0:2", 2, 0)]);
        assert!(good.validate().is_ok());

        let short = steps(&[("1-ff00:0:1", 0, 0)]);
        assert_eq!(short.validate(), Err(StepsError::TooFewSteps(1)));

        let bad_src = steps(&[("1-ff00:0:1", 3, 1), ("1-ff00:0:2", 2, 0)]);
        assert_eq!(bad_src.validate(), Err(StepsError::SourceIngress(3)));

        let bad_dst = steps(&[("1-ff00:0:1", 0, 1), ("1-ff00:0:2", 2, 7)]);
        assert_eq!(bad_dst.validate(), Err(StepsError::DestinationEgress(7)));
    }

    #[test]
    fn should_reverse_steps() {
        let s = steps(&[
            ("1-ff00:0:1", 0, 1),
            ("1-ff00:0:3", 5, 6),
            ("1-ff00:0:2", 2, 0),
        ]);
        let r = s.reverse();
        assert!(r.validate().is_ok());
        assert_eq!(r.src_ia(), "1-ff00:0:2".parse().unwrap());
        assert_eq!(r.dst_ia(), "1-ff00:0:1".parse().unwrap());
        assert_eq!(r[0].egress, 2);
        assert_eq!(r[1].ingress, 6);
        assert_eq!(r[1].egress, 5);
        assert_eq!(r.reverse(), s);
    }

    #[test]
    fn should_list_interfaces_without_path_ends() {
        let s = steps(&[
            ("1-ff00:0:1", 0, 1),
            ("1-ff00:0:3", 5, 6),
            ("1-ff00:0:2", 2, 0),
        ]);
        let ifaces = s.interfaces();
        let ids: Vec<u16> = ifaces.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 5, 6, 2]);
        assert_eq!(ifaces[0].isd_asn, "1-ff00:0:1".parse().unwrap());
        assert_eq!(ifaces[3].isd_asn, "1-ff00:0:2".parse().unwrap());
    }
}
