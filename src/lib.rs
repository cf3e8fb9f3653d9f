// Copyright 2026 Buildsheet Contributors
// SPDX-License-Identifier: Apache-2.0

//! Buildsheet library — vehicle configurator catalog harvester.
//!
//! Pass 1 walks the configurator's fixed hierarchy (model grid → trim line
//! → engine variant) into a deduplicated build catalog; Pass 2 revisits
//! each unique summary URL and extracts the priced spec sheet.

#![allow(clippy::new_without_default)]

pub mod browser;
pub mod catalog;
pub mod cli;
pub mod export;
pub mod records;
pub mod site;
pub mod summary;
pub mod wait;
