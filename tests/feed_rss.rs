// tests/feed_rss.rs
use chrono::{TimeZone, Utc};

use police_feed::event::{event_id, events_from_items};
use police_feed::feed::rss::parse_items;

const FIXTURE: &str = include_str!("fixtures/police_rss.xml");

#[test]
fn parses_fixture_in_document_order() {
    let items = parse_items(FIXTURE).expect("fixture should parse");
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].title, "15 februari 21:04, Trafikolycka, Malmö");
    assert_eq!(
        items[1].guid,
        "https://polisen.se/aktuellt/handelser/2023/februari/15/15-februari-2030-stold-lund/"
    );
    assert_eq!(
        items[2].description,
        "Brand i soprum & trapphus, räddningstjänsten på plats."
    );
}

#[test]
fn missing_guid_falls_back_to_link() {
    let items = parse_items(FIXTURE).unwrap();
    assert_eq!(items[2].guid, items[2].link);
}

#[test]
fn fixture_items_become_events() {
    let now = Utc::now();
    let events = events_from_items(parse_items(FIXTURE).unwrap(), "skane", now).unwrap();

    assert_eq!(events.len(), 3);
    let first = &events[0];
    assert_eq!(first.id, event_id(&first.url));
    assert_eq!(first.region, "skane");
    assert_eq!(first.revision, 0);
    assert_eq!(first.create_time, now);
    assert_eq!(
        first.publish_time,
        Utc.with_ymd_and_hms(2023, 2, 15, 20, 18, 3).unwrap()
    );
    // GMT dates are accepted as well.
    assert_eq!(
        events[2].publish_time,
        Utc.with_ymd_and_hms(2023, 2, 15, 18, 25, 10).unwrap()
    );
}
