//! End-to-end Pass-2 enrichment over the scripted fake summary pages.

mod common;

use buildsheet::catalog::identity::DedupContext;
use buildsheet::catalog::traversal::Harvester;
use buildsheet::records::BuildRecord;
use buildsheet::summary::extract;
use common::{test_profile, two_card_fixture, FakeTab};

fn build_record(summary_url: &str) -> BuildRecord {
    BuildRecord {
        car: "X5".to_string(),
        body_type: "SUV".to_string(),
        model: "M Sport".to_string(),
        engine: "xDrive40i".to_string(),
        series_code: "X5".to_string(),
        line_code: "X540".to_string(),
        model_code: "SE000001".to_string(),
        image_url: String::new(),
        configure_url: summary_url.replacen("/summary/", "/configure/", 1),
        summary_url: summary_url.to_string(),
    }
}

#[tokio::test]
async fn harvested_catalog_enriches_to_four_priced_rows() {
    let profile = test_profile();
    let tab = FakeTab::new(two_card_fixture(), profile.clone());
    let mut dedup = DedupContext::new();
    let builds = Harvester::new(&tab, &profile, &mut dedup)
        .run()
        .await
        .expect("traversal failed");
    assert_eq!(builds.len(), 4);

    // Pass 2 runs on its own tab, consuming only the written records.
    let pass2 = FakeTab::new(two_card_fixture(), profile.clone());
    let outcome = extract::enrich_all(&pass2, &profile, &builds).await;

    assert_eq!(outcome.records.len(), 4);
    for record in &outcome.records {
        let p = &record.prices;
        for field in [
            &p.price_before_vat,
            &p.selected_options_price,
            &p.subtotal_ex_vat,
            &p.vat_amount,
            &p.subtotal_incl_vat,
            &p.on_the_road_fee,
            &p.otr_price,
        ] {
            assert!(!field.is_empty());
        }
        assert_eq!(p.price_before_vat, "£54,985");
        assert_eq!(p.subtotal_ex_vat, "£56,185");
        assert_eq!(p.subtotal_incl_vat, "£61,803");
        assert_eq!(p.otr_price, "£63,253");

        // Synonym-mapped and generically normalized keys both land.
        assert_eq!(record.specs.get("Battery Capacity").unwrap(), "83.9 kWh");
        assert!(record.specs.contains_key("Emission Wltp"));
    }

    let keys: Vec<&String> = outcome.spec_keys.iter().collect();
    assert_eq!(keys, ["Battery Capacity", "Emission Wltp"]);
}

#[tokio::test]
async fn summary_urls_are_grouped_by_canonical_key() {
    let profile = test_profile();
    let tab = FakeTab::new(two_card_fixture(), profile.clone());

    // Same summary sheet reachable twice: trailing slash and query string
    // both collapse into the first occurrence.
    let builds = vec![
        build_record("https://configure.fake.test/summary/X5/X540/en_GB/SE000001"),
        build_record("https://configure.fake.test/summary/X5/X540/en_GB/SE000001/"),
        build_record("https://configure.fake.test/summary/X5/X540/en_GB/SE000001?ref=nav"),
    ];
    let outcome = extract::enrich_all(&tab, &profile, &builds).await;
    assert_eq!(outcome.records.len(), 1);
}

#[tokio::test]
async fn dead_primary_host_recovers_on_alternate() {
    let profile = test_profile();
    let tab = FakeTab::new(two_card_fixture(), profile.clone());

    // The primary host never resolves; the one retry against the alternate
    // host reaches the same sheet.
    let builds = vec![
        build_record("https://unreachable.fake.test/summary/X5/X540/en_GB/SE000001"),
        build_record("https://configure.fake.test/summary/X5/X560/en_GB/SE000002"),
    ];
    let outcome = extract::enrich_all(&tab, &profile, &builds).await;
    assert_eq!(outcome.records.len(), 2);
}

#[tokio::test]
async fn unreachable_summary_is_skipped_not_fatal() {
    let profile = test_profile();
    let tab = FakeTab::new(two_card_fixture(), profile.clone());

    // This path is dead on the primary and the alternate host alike: the
    // record is skipped and the run continues.
    let builds = vec![
        build_record("https://configure.fake.test/summary/DEAD/X540/en_GB/SE000001"),
        build_record("https://configure.fake.test/summary/X5/X560/en_GB/SE000002"),
    ];
    let outcome = extract::enrich_all(&tab, &profile, &builds).await;
    assert_eq!(outcome.records.len(), 1);
    assert!(outcome.records[0].summary_url.contains("SE000002"));
}
