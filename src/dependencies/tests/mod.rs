use super::model::{DepotsField, MetadataResponse, TitleMetadata};
use super::*;
use crate::config::HttpConfig;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn title(value: Value) -> TitleMetadata {
    serde_json::from_value(value).unwrap()
}

fn discoverer(server: &MockServer, concurrency: usize) -> DependencyDiscoverer {
    DependencyDiscoverer::new(
        SourceFetcher::new(&HttpConfig::default()).unwrap(),
        server.uri(),
        concurrency,
    )
}

async fn mount_title(server: &MockServer, id: &str, entry: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/info/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {id: entry}
        })))
        .mount(server)
        .await;
}

// --- model decoding ---

#[test]
fn depots_field_decodes_every_shape() {
    assert_eq!(title(json!({})).depots, DepotsField::Absent);
    assert_eq!(title(json!({"depots": null})).depots, DepotsField::Absent);
    assert!(matches!(title(json!({"depots": {}})).depots, DepotsField::Map(ref m) if m.is_empty()));
    assert_eq!(
        title(json!({"depots": "12345"})).depots,
        DepotsField::Text("12345".into())
    );
    assert_eq!(
        title(json!({"depots": [1, 2]})).depots,
        DepotsField::Unknown(json!([1, 2]))
    );
}

#[test]
fn ownership_follows_depots_shape() {
    assert!(!title(json!({})).depots.owns_content());
    assert!(!title(json!({"depots": {}})).depots.owns_content());
    assert!(title(json!({"depots": {"11": {}}})).depots.owns_content());
    assert!(title(json!({"depots": "x"})).depots.owns_content());
    assert!(!title(json!({"depots": 7})).depots.owns_content());
}

#[test]
fn non_object_sections_decode_as_empty() {
    let t = title(json!({"common": null, "extended": "oops", "dlc": [1]}));
    assert!(t.common.is_empty());
    assert!(t.extended.is_empty());
    assert!(t.dlc.is_empty());
}

#[test]
fn response_without_data_decodes_empty() {
    let response: MetadataResponse = serde_json::from_value(json!({"status": "success"})).unwrap();
    assert!(response.data.is_empty());
}

// --- id extraction ---

#[test]
fn report_merges_all_four_sources_without_duplicates() {
    let report = report_for(
        "10",
        &title(json!({
            "common": {"listofdlc": "300,100, 200"},
            "extended": {"listofdlc": "200,400"},
            "depots": {
                "11": {"manifests": {}},
                "dlc": {"500": {}, "100": {}}
            },
            "dlc": {"600": {}, "300": {}}
        })),
    );

    assert_eq!(report.ids, vec!["100", "200", "300", "400", "500", "600"]);
    assert!(report.has_own_content);
}

#[test]
fn report_tolerates_odd_nested_dlc_shapes() {
    let string_dlc = report_for(
        "10",
        &title(json!({"depots": {"dlc": "1,2"}, "dlc": {"5": {}}})),
    );
    assert_eq!(string_dlc.ids, vec!["5"]);

    let numeric_dlc = report_for("10", &title(json!({"depots": {"dlc": 3}})));
    assert!(numeric_dlc.ids.is_empty());

    let string_depots = report_for("10", &title(json!({"depots": "content"})));
    assert!(string_depots.ids.is_empty());
    assert!(string_depots.has_own_content);
}

#[test]
fn non_string_listofdlc_is_ignored() {
    let report = report_for("10", &title(json!({"common": {"listofdlc": 42}})));
    assert!(report.ids.is_empty());
    assert!(!report.has_own_content);
}

// --- network ---

#[tokio::test]
async fn discover_reports_ids_and_ownership() {
    let server = MockServer::start().await;
    mount_title(
        &server,
        "10",
        json!({"common": {"listofdlc": "12,11"}, "depots": {"101": {}}}),
    )
    .await;

    let report = discoverer(&server, 8).discover("10").await.unwrap();
    assert_eq!(report.ids, vec!["11", "12"]);
    assert!(report.has_own_content);
}

#[tokio::test]
async fn discover_missing_title_is_not_found() {
    let server = MockServer::start().await;
    mount_title(&server, "20", json!({})).await;
    Mock::given(method("GET"))
        .and(path("/v1/info/10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .mount(&server)
        .await;

    let err = discoverer(&server, 8).discover("10").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn collect_unowned_keeps_contentless_items_sorted() {
    let server = MockServer::start().await;
    mount_title(
        &server,
        "10",
        json!({"common": {"listofdlc": "1000,30,200,4"}}),
    )
    .await;
    mount_title(&server, "1000", json!({})).await;
    mount_title(&server, "30", json!({"depots": {}})).await;
    mount_title(&server, "200", json!({"depots": {"201": {}}})).await;
    mount_title(&server, "4", json!({"depots": "owned"})).await;

    let unowned = discoverer(&server, 8)
        .collect_unowned("10", &HashSet::new())
        .await
        .unwrap();
    assert_eq!(unowned, vec!["30", "1000"]);
}

#[tokio::test]
async fn collect_unowned_never_returns_excluded_ids() {
    let server = MockServer::start().await;
    mount_title(&server, "10", json!({"dlc": {"11": {}, "12": {}}})).await;
    mount_title(&server, "12", json!({})).await;
    // 11 has no content but is excluded, so it must not even be looked up
    Mock::given(method("GET"))
        .and(path("/v1/info/11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"11": {}}})))
        .expect(0)
        .mount(&server)
        .await;

    let exclude: HashSet<String> = ["11".to_string()].into_iter().collect();
    let unowned = discoverer(&server, 8)
        .collect_unowned("10", &exclude)
        .await
        .unwrap();
    assert_eq!(unowned, vec!["12"]);
}

#[tokio::test]
async fn failed_item_lookup_is_skipped_not_fatal() {
    let server = MockServer::start().await;
    mount_title(&server, "10", json!({"dlc": {"11": {}, "12": {}, "13": {}}})).await;
    mount_title(&server, "11", json!({})).await;
    Mock::given(method("GET"))
        .and(path("/v1/info/12"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/info/13"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let unowned = discoverer(&server, 2)
        .collect_unowned("10", &HashSet::new())
        .await
        .unwrap();
    assert_eq!(unowned, vec!["11"]);
}

#[tokio::test]
async fn main_title_failure_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/info/10"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = discoverer(&server, 8)
        .collect_unowned("10", &HashSet::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
}

#[tokio::test]
async fn many_items_with_single_slot_complete() {
    let server = MockServer::start().await;
    let ids: Vec<String> = (1..=20).map(|i| (i * 10).to_string()).collect();
    mount_title(&server, "1", json!({"common": {"listofdlc": ids.join(",")}})).await;
    for id in &ids {
        mount_title(&server, id, json!({})).await;
    }

    let unowned = discoverer(&server, 1)
        .collect_unowned("1", &HashSet::new())
        .await
        .unwrap();
    assert_eq!(unowned, ids);
}

/// Answers every item lookup with an empty entry after `delay`, recording
/// when each request arrived
struct SlowItems {
    delay: Duration,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for SlowItems {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        let id = request.url.path().rsplit('/').next().unwrap_or_default();
        ResponseTemplate::new(200)
            .set_body_json(json!({"data": {id: {}}}))
            .set_delay(self.delay)
    }
}

/// Most arrivals inside any window shorter than one response delay
///
/// Every request arriving in such a window is still in flight when it ends.
fn peak_in_flight(arrivals: &[Instant], window: Duration) -> usize {
    let mut sorted = arrivals.to_vec();
    sorted.sort();
    (0..sorted.len())
        .map(|i| {
            sorted[i..]
                .iter()
                .take_while(|t| t.duration_since(sorted[i]) < window)
                .count()
        })
        .max()
        .unwrap_or(0)
}

#[tokio::test]
async fn item_lookups_never_exceed_concurrency() {
    let server = MockServer::start().await;
    let ids: Vec<String> = (1000..1030).map(|i| i.to_string()).collect();
    mount_title(&server, "1", json!({"common": {"listofdlc": ids.join(",")}})).await;

    let delay = Duration::from_millis(300);
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    Mock::given(method("GET"))
        .and(path_regex(r"^/v1/info/10\d\d$"))
        .respond_with(SlowItems {
            delay,
            arrivals: Arc::clone(&arrivals),
        })
        .expect(30)
        .mount(&server)
        .await;

    let unowned = discoverer(&server, 8)
        .collect_unowned("1", &HashSet::new())
        .await
        .unwrap();
    assert_eq!(unowned, ids);

    let arrivals = arrivals.lock().unwrap().clone();
    assert_eq!(arrivals.len(), 30);
    assert_eq!(peak_in_flight(&arrivals, delay / 2), 8);
}
