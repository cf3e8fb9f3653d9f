//! `buildsheet enrich` — Pass 2: visit each unique summary URL from an
//! existing build table and write specs.csv.

use crate::browser::chromium::ChromiumDriver;
use crate::cli::output;
use crate::export;
use crate::site::SiteProfile;
use crate::summary::extract;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Run the enrichment over a previously harvested build table.
pub async fn run(input: &Path, out: &Path) -> Result<()> {
    let builds = export::read_builds(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    if builds.is_empty() {
        anyhow::bail!("{} contains no build records", input.display());
    }
    output::status(&format!("{} build records loaded", builds.len()));

    let profile = SiteProfile::default();
    let driver = ChromiumDriver::launch().await?;
    let tab = driver.new_tab().await?;

    let outcome = extract::enrich_all(&tab, &profile, &builds).await;

    export::write_summaries(out, &outcome.records, &outcome.spec_keys)
        .with_context(|| format!("failed to write {}", out.display()))?;

    info!(
        "wrote {} summary records ({} spec columns) to {}",
        outcome.records.len(),
        outcome.spec_keys.len(),
        out.display()
    );
    output::status(&format!(
        "{} summary records -> {}",
        outcome.records.len(),
        out.display()
    ));
    Ok(())
}
