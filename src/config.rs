// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line and environment configuration of the webhook server.
//!
//! Every flag can also be set through an environment variable so the
//! deployment manifest can inject the pod's own name and namespace through
//! the downward API.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::constants::{
    DEFAULT_BIND_ADDRESS, DEFAULT_CERT_DIR, DEFAULT_CERT_FILE, DEFAULT_KEY_FILE,
    DEFAULT_METRICS_ADDRESS,
};

/// Configuration of the `dynakube-webhook` binary.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "dynakube-webhook",
    version,
    about = "Admission, conversion and pod injection webhooks for DynaKube"
)]
pub struct WebhookConfig {
    /// Address of the HTTPS admission server
    #[arg(long, env = "WEBHOOK_BIND_ADDRESS", default_value = DEFAULT_BIND_ADDRESS)]
    pub bind_address: SocketAddr,

    /// Address of the plain HTTP metrics server
    #[arg(long, env = "WEBHOOK_METRICS_ADDRESS", default_value = DEFAULT_METRICS_ADDRESS)]
    pub metrics_address: SocketAddr,

    /// Directory holding the serving certificate and key
    #[arg(long, env = "WEBHOOK_CERT_DIR", default_value = DEFAULT_CERT_DIR)]
    pub cert_dir: PathBuf,

    /// Certificate file name inside the certificate directory
    #[arg(long, default_value = DEFAULT_CERT_FILE)]
    pub cert_file: String,

    /// Key file name inside the certificate directory
    #[arg(long, default_value = DEFAULT_KEY_FILE)]
    pub key_file: String,

    /// Namespace of the operator; DynaKubes are looked up here
    #[arg(long, env = "POD_NAMESPACE")]
    pub namespace: String,

    /// Name of the webhook's own pod
    #[arg(long, env = "POD_NAME")]
    pub pod_name: Option<String>,

    /// Image used for the v1 init container; defaults to the webhook pod's image
    #[arg(long, env = "WEBHOOK_IMAGE")]
    pub webhook_image: Option<String>,

    /// Whether the CSI driver module is deployed
    #[arg(
        long,
        env = "MODULES_CSI_DRIVER",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub csi_driver: bool,

    /// Serve plain HTTP instead of HTTPS (local debugging only)
    #[arg(long, default_value_t = false)]
    pub insecure: bool,
}

impl WebhookConfig {
    #[must_use]
    pub fn cert_path(&self) -> PathBuf {
        self.cert_dir.join(&self.cert_file)
    }

    #[must_use]
    pub fn key_path(&self) -> PathBuf {
        self.cert_dir.join(&self.key_file)
    }

    #[must_use]
    pub fn modules(&self) -> Modules {
        Modules {
            csi_driver: self.csi_driver,
        }
    }
}

/// Optional operator modules that change validation and injection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modules {
    /// The CSI driver is deployed and may provide agent binaries
    pub csi_driver: bool,
}

impl Default for Modules {
    fn default() -> Self {
        Self { csi_driver: true }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
