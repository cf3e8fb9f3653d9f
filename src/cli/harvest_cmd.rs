//! `buildsheet harvest` — Pass 1: walk the configurator, write builds.csv.

use crate::browser::chromium::ChromiumDriver;
use crate::catalog::identity::DedupContext;
use crate::catalog::traversal::Harvester;
use crate::cli::output;
use crate::export;
use crate::site::SiteProfile;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Run the harvest and write the build table.
pub async fn run(start_url: Option<&str>, out: &Path) -> Result<()> {
    let mut profile = SiteProfile::default();
    if let Some(url) = start_url {
        profile.listing_url = url.to_string();
    }

    let driver = ChromiumDriver::launch().await?;
    let tab = driver.new_tab().await?;

    let mut dedup = DedupContext::new();
    let records = Harvester::new(&tab, &profile, &mut dedup)
        .run()
        .await
        .context("catalog traversal failed")?;

    export::write_builds(out, &records)
        .with_context(|| format!("failed to write {}", out.display()))?;

    info!("wrote {} build records to {}", records.len(), out.display());
    output::status(&format!(
        "{} build records -> {}",
        records.len(),
        out.display()
    ));
    Ok(())
}
