// tests/sources_fixtures.rs
//
// Built-in sources parsed from recorded payloads, then filtered by the search.

use job_radar::sources::remoteok::RemoteOkSource;
use job_radar::sources::weworkremotely::WeWorkRemotelySource;
use job_radar::sources::{stable_id, Source};
use job_radar::LocationFilter;

fn rust() -> Vec<String> {
    vec!["rust".into()]
}

#[tokio::test]
async fn remoteok_fixture_keeps_rust_postings() {
    let src = RemoteOkSource::from_fixture(include_str!("fixtures/remoteok.json"));
    let out = src.fetch(&rust(), &LocationFilter::default()).await.unwrap();

    let ids: Vec<&str> = out.iter().map(|d| d.external_id.as_str()).collect();
    assert_eq!(ids, vec!["1093412", "1093414"]);

    let first = &out[0];
    assert_eq!(first.source, "remoteok");
    assert_eq!(first.title, "Senior Rust Engineer");
    assert_eq!(first.company, "Acme Robotics");
    assert_eq!(first.description, "We build fleet software in Rust & Tokio.");
    assert_eq!(first.tags, vec!["rust", "backend", "tokio"]);
    assert!(first.posted_at.is_some());
}

#[tokio::test]
async fn remoteok_city_filter_drops_other_onsite_locations() {
    let src = RemoteOkSource::from_fixture(include_str!("fixtures/remoteok.json"));
    let filter = LocationFilter {
        country: None,
        city: Some("Prague".into()),
        remote: true,
    };
    let out = src.fetch(&rust(), &filter).await.unwrap();
    assert_eq!(out.len(), 1, "Berlin is neither remote nor Prague");
    assert_eq!(out[0].external_id, "1093412");
}

#[tokio::test]
async fn remote_only_off_keeps_matching_city() {
    let src = RemoteOkSource::from_fixture(include_str!("fixtures/remoteok.json"));
    let filter = LocationFilter {
        country: Some("Germany".into()),
        city: None,
        remote: false,
    };
    let out = src.fetch(&rust(), &filter).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].company, "Nordwerk");
}

#[tokio::test]
async fn weworkremotely_fixture_splits_titles_and_ids() {
    let src = WeWorkRemotelySource::from_fixture(include_str!("fixtures/weworkremotely.rss"));
    let out = src.fetch(&rust(), &LocationFilter::default()).await.unwrap();

    assert_eq!(out.len(), 2, "the PHP role has no rust keyword");
    let first = &out[0];
    assert_eq!(first.source, "weworkremotely");
    assert_eq!(first.company, "Ferrous Labs");
    assert_eq!(first.title, "Backend Engineer (Rust)");
    assert_eq!(
        first.external_id,
        "https://weworkremotely.com/remote-jobs/ferrous-labs-backend-engineer-rust"
    );
    assert_eq!(first.description, "Own our Rust ingestion services.");
    assert!(first.tags.contains(&"rust".to_string()));
    assert!(first.posted_at.is_some());

    // no guid: id derives from the link
    let second = &out[1];
    assert_eq!(second.company, "Tidewater");
    assert_eq!(
        second.external_id,
        stable_id("https://weworkremotely.com/remote-jobs/tidewater-systems-engineer")
    );
}

#[tokio::test]
async fn empty_keywords_match_everything() {
    let src = WeWorkRemotelySource::from_fixture(include_str!("fixtures/weworkremotely.rss"));
    let out = src.fetch(&[], &LocationFilter::default()).await.unwrap();
    assert_eq!(out.len(), 3);
}

#[tokio::test]
async fn garbage_payload_is_a_source_error() {
    let src = WeWorkRemotelySource::from_fixture("<html>Too Many Requests</html>");
    assert!(src.fetch(&rust(), &LocationFilter::default()).await.is_err());
}
