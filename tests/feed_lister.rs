// tests/feed_lister.rs
mod common;

use std::sync::Arc;

use uuid::Uuid;

use common::{item, StaticSource};
use police_feed::feed::FeedSource;
use police_feed::reconcile::{EventLister, FeedLister};
use police_feed::regions::Regions;
use police_feed::FeedError;

fn lister(selection: &[&str], source: StaticSource) -> FeedLister {
    let source: Arc<dyn FeedSource> = Arc::new(source);
    FeedLister::new(&Regions::default(), selection, source).unwrap()
}

#[tokio::test]
async fn merges_regions_and_deduplicates() {
    let source = StaticSource {
        items: vec![item("a", "A"), item("b", "B")],
        fail_region: None,
    };
    // Both regions publish the same two items.
    let lister = lister(&["skane", "halland"], source);

    let events = lister.list_unique_events(&[]).await.unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.windows(2).all(|w| w[0].id < w[1].id), "ordered by id");
}

#[tokio::test]
async fn one_failing_region_fails_the_listing() {
    let source = StaticSource {
        items: vec![item("a", "A")],
        fail_region: Some("gotland"),
    };
    let lister = lister(&["skane", "gotland", "halland"], source);

    let err = lister.list_unique_events(&[]).await.unwrap_err();
    let feed_err = err.downcast_ref::<FeedError>().expect("typed error");
    assert_eq!(
        feed_err,
        &FeedError::Fetch {
            region: "gotland".into(),
            reason: "connection refused".into(),
        }
    );
}

#[tokio::test]
async fn refuses_id_filter() {
    let lister = lister(
        &["skane"],
        StaticSource {
            items: vec![],
            fail_region: None,
        },
    );
    assert!(lister.list_unique_events(&[Uuid::nil()]).await.is_err());
}

#[test]
fn all_expands_and_unknown_is_rejected() {
    let source: Arc<dyn FeedSource> = Arc::new(StaticSource {
        items: vec![],
        fail_region: None,
    });
    let all = FeedLister::new(&Regions::default(), &["all"], source.clone()).unwrap();
    assert_eq!(all.regions().len(), 21);

    let err = FeedLister::new(&Regions::default(), &["skane", "mordor"], source)
        .err()
        .unwrap();
    assert!(matches!(err, FeedError::UnknownRegion { ref region, .. } if region == "mordor"));
}
