//! `buildsheet run` — both passes back to back.
//!
//! Pass 2 still gets its own tab: it only consumes the records Pass 1
//! produced, never its browser state.

use crate::browser::chromium::ChromiumDriver;
use crate::catalog::identity::DedupContext;
use crate::catalog::traversal::Harvester;
use crate::cli::output;
use crate::export;
use crate::site::SiteProfile;
use crate::summary::extract;
use anyhow::{Context, Result};
use std::path::Path;

pub async fn run(start_url: Option<&str>, builds_out: &Path, specs_out: &Path) -> Result<()> {
    let mut profile = SiteProfile::default();
    if let Some(url) = start_url {
        profile.listing_url = url.to_string();
    }

    let driver = ChromiumDriver::launch().await?;

    let records = {
        let tab = driver.new_tab().await?;
        let mut dedup = DedupContext::new();
        Harvester::new(&tab, &profile, &mut dedup)
            .run()
            .await
            .context("catalog traversal failed")?
    };
    export::write_builds(builds_out, &records)
        .with_context(|| format!("failed to write {}", builds_out.display()))?;
    output::status(&format!(
        "{} build records -> {}",
        records.len(),
        builds_out.display()
    ));

    let tab = driver.new_tab().await?;
    let outcome = extract::enrich_all(&tab, &profile, &records).await;
    export::write_summaries(specs_out, &outcome.records, &outcome.spec_keys)
        .with_context(|| format!("failed to write {}", specs_out.display()))?;
    output::status(&format!(
        "{} summary records -> {}",
        outcome.records.len(),
        specs_out.display()
    ));
    Ok(())
}
