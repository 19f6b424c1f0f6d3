// Copyright 2026 Leadlens Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommand implementations for the `leadlens` binary.

pub mod audit_cmd;
pub mod catalog_cmd;
pub mod doctor;
pub mod output;
