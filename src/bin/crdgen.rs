// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates the multi-version `DynaKube` CRD from the Rust types under
//! src/api/. This keeps deploy/crds/ in sync with the code.
//!
//! Usage:
//!   cargo run --bin crdgen [webhook-namespace]
//!
//! The namespace of the conversion webhook service defaults to `dynatrace`.

use std::fs;
use std::path::Path;

use dynakube::api::crd::dynakube_crd;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/api/
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

const DEFAULT_WEBHOOK_NAMESPACE: &str = "dynatrace";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let namespace = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_WEBHOOK_NAMESPACE.to_string());
    let output_dir = Path::new("deploy/crds");

    fs::create_dir_all(output_dir)?;

    println!("Generating DynaKube CRD from src/api/...");

    let crd = dynakube_crd(&namespace)?;
    let yaml = serde_yaml::to_string(&crd)?;
    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    let filename = "dynakubes.crd.yaml";
    fs::write(output_dir.join(filename), content)?;

    println!("  ✓ Generated {filename} (conversion webhook in namespace {namespace})");
    println!("\nNext steps:");
    println!("  1. Review the generated file");
    println!("  2. Deploy with: kubectl apply -f deploy/crds/");

    Ok(())
}
