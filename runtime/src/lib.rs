// Copyright 2026 Leadlens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Leadlens runtime library: a multi-signal website audit engine.
//!
//! Render one page, run independent detectors over the frozen snapshot,
//! merge their verdicts into a [`WebsiteAudit`](audit::WebsiteAudit) and
//! price the sales opportunities it reveals. [`orchestrator::run_audit`] is
//! the single entry point; [`orchestrator::Auditor`] lets callers supply
//! their own renderer and scorers.

pub mod aggregate;
pub mod audit;
pub mod cli;
pub mod config;
pub mod detectors;
pub mod error;
pub mod events;
pub mod opportunity;
pub mod orchestrator;
pub mod renderer;
pub mod side_channel;

pub use audit::WebsiteAudit;
pub use config::{AuditConfig, AuditOptions};
pub use error::AuditError;
pub use orchestrator::{run_audit, Auditor};
