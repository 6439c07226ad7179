// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The `DynaKube` API.
//!
//! - [`latest`] - the hub and storage version (`v1beta5`)
//! - [`v1beta4`], [`v1beta2`], [`v1beta1`] - older served versions
//! - [`conversion`] - hub conversion and `apiVersion` dispatch
//! - [`crd`] - the merged multi-version CRD
//! - [`feature_flags`] - typed access to `feature.dynatrace.com/*` annotations

pub mod conversion;
pub mod crd;
pub mod duration;
pub mod feature_flags;
pub mod latest;
pub mod shared;
pub mod v1beta1;
pub mod v1beta2;
pub mod v1beta4;
