// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # DynaKube - API and admission webhooks of the Dynatrace operator
//!
//! This crate owns the API surface of the `DynaKube` custom resource: the
//! served versions and their conversion through the hub, admission
//! validation, and the pod injection webhook that adds the OneAgent code
//! modules to application pods.
//!
//! ## Modules
//!
//! - [`api`] - `DynaKube` versions, conversion, feature flags and the CRD
//! - [`validation`] - admission rules for `DynaKube` objects
//! - [`mutation`] - pod injection (installer and bootstrapper strategies)
//! - [`webhook`] - HTTP handlers, routers and listeners
//! - [`cluster`] - the API-server seam used by validation and injection
//! - [`config`] - command-line and environment configuration
//! - [`metrics`] - Prometheus metrics of the webhooks
//!
//! ## Example
//!
//! ```rust,no_run
//! use dynakube::api::conversion::to_hub;
//! use serde_json::json;
//!
//! let hub = to_hub(&json!({
//!     "apiVersion": "dynatrace.com/v1beta4",
//!     "kind": "DynaKube",
//!     "metadata": { "name": "dynakube", "namespace": "dynatrace" },
//!     "spec": { "apiUrl": "https://ENVIRONMENTID.live.dynatrace.com/api" }
//! }))
//! .unwrap();
//! assert_eq!(hub.api_url_host(), "ENVIRONMENTID.live.dynatrace.com");
//! ```

pub mod api;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod errors;
pub mod labels;
pub mod metrics;
pub mod mutation;
pub mod selector;
pub mod status;
pub mod validation;
pub mod webhook;
