//! Core data types for the harvested catalog.
//!
//! A `BuildRecord` is one accepted (line, engine) combination from Pass 1;
//! a `SummaryRecord` is the same build enriched with its priced spec sheet
//! in Pass 2. Both are immutable once their producing pass completes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One visible card on the model listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridUnit {
    /// Explicit order attribute read from the card; grid is sorted by this.
    pub order: u32,
    /// Marketing model name, e.g. "X5" or "i4".
    pub model_name: String,
    /// Body style resolved against the fixed vocabulary, or "Unknown".
    pub body_type: String,
}

impl GridUnit {
    /// Identity key used to avoid reprocessing the same model twice in a
    /// run: case-, space- and hyphen-insensitive "name|body".
    pub fn identity_key(&self) -> String {
        let squash = |s: &str| {
            s.chars()
                .filter(|c| !c.is_whitespace() && *c != '-')
                .flat_map(|c| c.to_lowercase())
                .collect::<String>()
        };
        format!("{}|{}", squash(&self.model_name), squash(&self.body_type))
    }
}

/// One accepted build identity with its navigable URLs (Pass 1 output).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildRecord {
    pub car: String,
    pub body_type: String,
    /// Trim line label ("M Sport", "xLine", ...).
    pub model: String,
    pub engine: String,
    pub series_code: String,
    pub line_code: String,
    pub model_code: String,
    pub image_url: String,
    pub configure_url: String,
    pub summary_url: String,
}

/// The seven fixed price columns of the enriched table, already formatted
/// as zero-decimal currency strings. Zero-valued fields are still emitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceFields {
    pub price_before_vat: String,
    pub selected_options_price: String,
    pub subtotal_ex_vat: String,
    pub vat_amount: String,
    pub subtotal_incl_vat: String,
    pub on_the_road_fee: String,
    pub otr_price: String,
}

/// One enriched spec sheet row (Pass 2 output).
///
/// `specs` is an open key set: the union of normalized keys across all
/// records is not known in advance and sizes the final output schema.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    pub car: String,
    pub body_type: String,
    pub model: String,
    pub engine: String,
    pub series_code: String,
    pub line_code: String,
    pub model_code: String,
    pub image_url: String,
    pub summary_url: String,
    pub prices: PriceFields,
    pub specs: BTreeMap<String, String>,
}

impl SummaryRecord {
    /// Start a summary row from its Pass-1 record, carrying identity and
    /// URLs forward. Spec and price fields are filled by the extractor.
    pub fn from_build(build: &BuildRecord) -> Self {
        Self {
            car: build.car.clone(),
            body_type: build.body_type.clone(),
            model: build.model.clone(),
            engine: build.engine.clone(),
            series_code: build.series_code.clone(),
            line_code: build.line_code.clone(),
            model_code: build.model_code.clone(),
            image_url: build.image_url.clone(),
            summary_url: build.summary_url.clone(),
            prices: PriceFields::default(),
            specs: BTreeMap::new(),
        }
    }
}
