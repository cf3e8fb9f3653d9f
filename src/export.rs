//! CSV persistence for the two output tables.
//!
//! Both tables are written once, at the end of their producing pass, with
//! every field quoted (embedded quotes doubled per RFC 4180). The build
//! table round-trips: `enrich` re-reads it so Pass 2 can run on a catalog
//! harvested in an earlier session.

use crate::records::{BuildRecord, SummaryRecord};
use anyhow::{Context, Result};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use std::collections::BTreeSet;
use std::path::Path;

/// Fixed leading columns of the summary table; the accumulated spec keys
/// follow in ascending lexical order.
const SUMMARY_FIXED_COLUMNS: &[&str] = &[
    "Car",
    "BodyType",
    "Model",
    "Engine",
    "SeriesCode",
    "LineCode",
    "ModelCode",
    "ImageUrl",
    "SummaryUrl",
    "PriceBeforeVAT",
    "SelectedOptionsPrice",
    "SubtotalExVAT",
    "VATAmount",
    "SubtotalInclVAT",
    "OnTheRoadFee",
    "OTRPrice",
];

/// Write the Pass-1 build catalog.
pub fn write_builds(path: &Path, records: &[BuildRecord]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for record in records {
        writer
            .serialize(record)
            .context("failed to write build record")?;
    }
    writer.flush().context("failed to flush build table")?;
    Ok(())
}

/// Re-read a previously written build catalog.
pub fn read_builds(path: &Path) -> Result<Vec<BuildRecord>> {
    let mut reader = ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: BuildRecord = row.context("malformed build record")?;
        records.push(record);
    }
    Ok(records)
}

/// Write the Pass-2 summary table with its dynamic spec columns.
pub fn write_summaries(
    path: &Path,
    records: &[SummaryRecord],
    spec_keys: &BTreeSet<String>,
) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    let mut header: Vec<&str> = SUMMARY_FIXED_COLUMNS.to_vec();
    header.extend(spec_keys.iter().map(String::as_str));
    writer.write_record(&header).context("failed to write header")?;

    for record in records {
        let prices = &record.prices;
        let mut row: Vec<&str> = vec![
            &record.car,
            &record.body_type,
            &record.model,
            &record.engine,
            &record.series_code,
            &record.line_code,
            &record.model_code,
            &record.image_url,
            &record.summary_url,
            &prices.price_before_vat,
            &prices.selected_options_price,
            &prices.subtotal_ex_vat,
            &prices.vat_amount,
            &prices.subtotal_incl_vat,
            &prices.on_the_road_fee,
            &prices.otr_price,
        ];
        for key in spec_keys {
            row.push(record.specs.get(key).map(String::as_str).unwrap_or(""));
        }
        writer
            .write_record(&row)
            .context("failed to write summary record")?;
    }
    writer.flush().context("failed to flush summary table")?;
    Ok(())
}
