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

//! COLIBRI segment-reservation control-plane service.
//!
//! The service at an initiator AS keeps the segment reservations listed in
//! its configuration healthy: it requests new reservations, renews indices
//! before they expire, activates confirmed indices, and sweeps expired state
//! through its storage collaborator.
//!
//! The [`manager`](crate::manager) module hosts the periodic coordination
//! task; the [`keeper`](crate::keeper) module the per-reservation
//! maintenance; the [`segment`](crate::segment) module the reservation entity
//! and its index algebra.

pub mod config;
pub mod keeper;
pub mod manager;
pub mod request;
pub mod segment;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;
