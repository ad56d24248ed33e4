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

//! COLIBRI reservation protocol data model.
//!
//! This crate contains the pure, I/O-free building blocks of the COLIBRI
//! segment-reservation control plane: addressing, reservation identifiers and
//! classes, authenticated hop chains (tokens), path steps, the sequence
//! predicate used by reservation configurations, and the bit-exact data-plane
//! path codec.

pub mod address;
pub mod dataplane;
pub mod policy;
pub mod reservation;
pub mod steps;
pub mod token;
