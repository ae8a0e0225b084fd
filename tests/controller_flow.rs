//! End-to-end flows through the controller with a scripted transport.

use bgg_similarity::cache::{ManualClock, ReferenceCache};
use bgg_similarity::config::GatewayConfig;
use bgg_similarity::controller::{
    build_similarity_report, compare_collections, get_similarity, get_top100, get_user_collection,
    CollectionSource, ErrorKind,
};
use bgg_similarity::gateway::{BggService, FetchError, HttpResponse, Transport};
use bgg_similarity::{GameRef, ReferenceSet};
use futures::executor::block_on;
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

const BROWSE_PAGE: &str = r#"
    <a href="/boardgame/174430/gloomhaven" class="primary">Gloomhaven</a>
    <a href="/boardgame/316554/dune-imperium" class="primary">Dune: Imperium</a>
    <a href="/boardgame/161936/pandemic-legacy-season-1" class="primary">Pandemic Legacy: Season 1</a>
"#;

/// Answers by URL: the browse page, or a collection keyed by username.
#[derive(Default)]
struct FakeUpstream {
    page: Option<HttpResponse>,
    collections: HashMap<String, HttpResponse>,
    requests: RefCell<Vec<String>>,
}

impl FakeUpstream {
    fn new() -> Self {
        Self {
            page: Some(HttpResponse::ok(BROWSE_PAGE)),
            ..Default::default()
        }
    }

    fn with_collection(mut self, username: &str, ids: &[&str]) -> Self {
        let items: String = ids
            .iter()
            .map(|id| format!(r#"<item objecttype="thing" objectid="{}" subtype="boardgame"/>"#, id))
            .collect();
        self.collections.insert(
            username.to_string(),
            HttpResponse::ok(format!("<items totalitems=\"{}\">{}</items>", ids.len(), items)),
        );
        self
    }

    fn with_response(mut self, username: &str, response: HttpResponse) -> Self {
        self.collections.insert(username.to_string(), response);
        self
    }

    fn request_count(&self, fragment: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|url| url.contains(fragment))
            .count()
    }
}

impl Transport for &FakeUpstream {
    async fn get(&self, url: &str, _timeout_ms: u32) -> Result<HttpResponse, FetchError> {
        self.requests.borrow_mut().push(url.to_string());
        if url.contains("/browse/") {
            return self
                .page
                .clone()
                .ok_or_else(|| FetchError::Network("API down".into()));
        }
        let username = url
            .split("username=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap_or_default();
        self.collections.get(username).cloned().ok_or_else(|| {
            FetchError::Network(format!("no collection scripted for {}", username))
        })
    }

    async fn pause(&self, _ms: u32) {}
}

fn service(upstream: &FakeUpstream) -> BggService<&FakeUpstream, ManualClock> {
    let cache = Rc::new(ReferenceCache::with_clock(ManualClock::starting_at(0)));
    BggService::new(upstream, cache, GatewayConfig::default())
}

#[test]
fn similarity_report_matches_expected_shape() {
    let upstream = FakeUpstream::new()
        .with_collection("userA", &["174430", "316554", "12345"])
        .with_collection("userB", &["316554", "161936", "67890"]);
    let service = service(&upstream);

    let report = block_on(get_similarity(&service, "userA", "userB")).unwrap();
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(
        value,
        json!({
            "metadata": { "top100_count": 3 },
            "userA": { "username": "userA", "owned_top100_count": 2 },
            "userB": { "username": "userB", "owned_top100_count": 2 },
            "similarity": {
                "jaccard_score": 0.3333,
                "jaccard_percent": "33.33%",
                "intersection_count": 1,
                "union_count": 3,
                "common_games": [{ "id": "316554", "name": "Dune: Imperium" }]
            }
        })
    );
}

#[test]
fn reference_list_is_fetched_once_across_operations() {
    let upstream = FakeUpstream::new()
        .with_collection("a", &["174430"])
        .with_collection("b", &["174430"]);
    let service = service(&upstream);

    let top = block_on(get_top100(&service)).unwrap();
    assert_eq!(top.count, 3);
    assert_eq!(top.games[0], GameRef::new("174430", "Gloomhaven"));

    let report = block_on(get_similarity(&service, "a", "b")).unwrap();
    assert_eq!(report.similarity.jaccard_score, 1.0);
    assert_eq!(report.similarity.intersection_count, 1);
    assert_eq!(report.similarity.union_count, 1);
    assert_eq!(upstream.request_count("/browse/"), 1);
}

#[test]
fn empty_collections_score_zero() {
    let upstream = FakeUpstream::new()
        .with_collection("a", &[])
        .with_response("b", HttpResponse::ok("<?xml version=\"1.0\"?><nothing/>"));
    let service = service(&upstream);

    let report = block_on(get_similarity(&service, "a", "b")).unwrap();
    assert_eq!(report.similarity.jaccard_score, 0.0);
    assert_eq!(report.similarity.jaccard_percent, "0.00%");
    assert_eq!(report.similarity.intersection_count, 0);
    assert_eq!(report.similarity.union_count, 0);
    assert!(report.similarity.common_games.is_empty());
}

#[test]
fn missing_username_is_bad_request() {
    let upstream = FakeUpstream::new();
    let service = service(&upstream);

    let err = block_on(get_similarity(&service, "userA", "  ")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadRequest);
    assert_eq!(err.status_code(), 400);
    assert_eq!(err.error, "Both userA and userB are required");
    assert!(upstream.requests.borrow().is_empty());
}

#[test]
fn overlong_username_is_invalid_not_missing() {
    let upstream = FakeUpstream::new();
    let service = service(&upstream);
    let long_name = "x".repeat(65);

    let err = block_on(get_user_collection(&service, &long_name)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadRequest);
    assert_eq!(err.error, "Invalid username parameter");

    let err = block_on(get_similarity(&service, "userA", &long_name)).unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(err.error, "Invalid username parameter");
    assert!(upstream.requests.borrow().is_empty());
}

#[test]
fn percent_rounds_ties_like_the_score() {
    let reference: ReferenceSet = (0..32)
        .map(|i| GameRef::new(i.to_string(), format!("Game {}", i)))
        .collect();
    let ids_a: Vec<String> = (0..16).map(|i| i.to_string()).collect();
    let ids_b: Vec<String> = (15..32).map(|i| i.to_string()).collect();

    let report = build_similarity_report(&reference, "a", &ids_a, "b", &ids_b);
    assert_eq!(report.similarity.union_count, 32);
    assert_eq!(report.similarity.intersection_count, 1);
    assert_eq!(report.similarity.jaccard_score, 0.0313);
    assert_eq!(report.similarity.jaccard_percent, "3.13%");
}

#[test]
fn top100_failure_is_internal_error() {
    let upstream = FakeUpstream {
        page: None,
        ..Default::default()
    };
    let service = service(&upstream);

    let err = block_on(get_similarity(&service, "userA", "userB")).unwrap_err();
    assert_eq!(err.status_code(), 500);
    assert_eq!(err.error, "Internal server error");
    assert_eq!(serde_json::to_value(&err).unwrap(), json!({ "error": "Internal server error" }));

    let err = block_on(get_top100(&service)).unwrap_err();
    assert_eq!(err.error, "Failed to fetch top 100 games");
    assert_eq!(err.details.as_deref(), Some("Network error: API down"));
}

#[test]
fn collection_failure_in_comparison_is_not_found() {
    let upstream = FakeUpstream::new().with_collection("userB", &["316554"]).with_response(
        "ghost",
        HttpResponse::ok("<errors><error><message>Invalid username specified</message></error></errors>"),
    );
    let service = service(&upstream);

    let err = block_on(get_similarity(&service, "ghost", "userB")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.error, "Failed to fetch user collections");
    assert_eq!(
        err.details.as_deref(),
        Some("User 'ghost' not found: Invalid username specified")
    );
}

#[test]
fn single_collection_errors_are_categorised() {
    let upstream = FakeUpstream::new()
        .with_collection("alice", &["1", "2", "2"])
        .with_response(
            "ghost",
            HttpResponse::ok("<errors><error><message>Invalid username specified</message></error></errors>"),
        )
        .with_response(
            "shy",
            HttpResponse::ok("<errors><error><message>This collection is private</message></error></errors>"),
        )
        .with_response(
            "broken",
            HttpResponse {
                status: 500,
                body: "<html>oops</html>".into(),
            },
        );
    let service = service(&upstream);

    let ok = block_on(get_user_collection(&service, "alice")).unwrap();
    assert_eq!(
        serde_json::to_value(&ok).unwrap(),
        json!({ "username": "alice", "gameCount": 2, "gameIds": ["1", "2"] })
    );

    let cases = [
        ("ghost", ErrorKind::NotFound, "User 'ghost' not found"),
        ("shy", ErrorKind::Forbidden, "User 'shy' has a private collection"),
        ("broken", ErrorKind::Internal, "Failed to fetch user collection"),
        ("", ErrorKind::BadRequest, "Username parameter is required"),
    ];
    for (username, kind, message) in cases {
        let err = block_on(get_user_collection(&service, username)).unwrap_err();
        assert_eq!(err.kind, kind, "{}", username);
        assert_eq!(err.error, message);
    }
}

#[test]
fn imported_collection_skips_the_lookup() {
    let upstream = FakeUpstream::new().with_collection("userB", &["316554", "161936"]);
    let service = service(&upstream);

    let report = block_on(compare_collections(
        &service,
        CollectionSource::Imported {
            label: "export.csv".into(),
            ids: vec!["174430".into(), "316554".into(), "999".into()],
        },
        CollectionSource::Remote("userB".into()),
    ))
    .unwrap();

    assert_eq!(report.user_a.username, "export.csv");
    assert_eq!(report.user_a.owned_top100_count, 2);
    assert_eq!(report.similarity.intersection_count, 1);
    assert_eq!(upstream.request_count("username="), 1);
}

#[test]
fn report_builder_names_shared_games() {
    let reference = ReferenceSet::new(vec![
        GameRef::new("174430", "Gloomhaven"),
        GameRef::new("316554", "Dune: Imperium"),
        GameRef::new("161936", "Pandemic Legacy: Season 1"),
    ]);
    let report = build_similarity_report(
        &reference,
        "a",
        &["174430", "316554"],
        "b",
        &["316554", "161936"],
    );
    assert_eq!(report.similarity.common_games.len(), 1);
    assert_eq!(report.similarity.common_games[0].name.as_deref(), Some("Dune: Imperium"));
    assert_eq!(report.similarity.jaccard_score, 0.3333);
}
