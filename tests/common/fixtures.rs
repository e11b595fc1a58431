//! Mock remote sources and response bodies

use serde_json::{Map, Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate, Times};

/// Path the key dictionary is served under on every mock key source
pub const KEYS_PATH: &str = "/keys.json";

/// Serve `response` as the key dictionary of `server`, expecting `calls` requests
pub async fn mount_keys(server: &MockServer, response: ResponseTemplate, calls: impl Into<Times>) {
    Mock::given(method("GET"))
        .and(path(KEYS_PATH))
        .respond_with(response)
        .expect(calls)
        .named("key dictionary")
        .mount(server)
        .await;
}

/// Key dictionary body
pub fn keys_body(pairs: &[(&str, &str)]) -> ResponseTemplate {
    let map: Map<String, Value> = pairs
        .iter()
        .map(|(id, key)| (id.to_string(), Value::String(key.to_string())))
        .collect();
    ResponseTemplate::new(200).set_body_json(Value::Object(map))
}

/// Manifest index entry for `title_id` with `depots` as `(depot, gid)` pairs
///
/// A `branches` entry is always included; it is not a depot and must never
/// appear in the resolved manifest map.
pub fn manifest_body(title_id: &str, depots: &[(&str, &str)]) -> Value {
    let mut map = Map::new();
    for (depot, gid) in depots {
        map.insert(
            depot.to_string(),
            json!({"manifests": {"public": {"gid": gid, "size": "1024"}}}),
        );
    }
    map.insert("branches".into(), json!({"public": {"buildid": "1"}}));

    json!({
        "status": "success",
        "data": { title_id: { "depots": map } }
    })
}

/// Serve the manifest index entry for `title_id`
pub async fn mount_manifests(server: &MockServer, title_id: &str, depots: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/info/{title_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest_body(title_id, depots)))
        .named("manifest index")
        .mount(server)
        .await;
}

/// Serve a metadata index entry for `title_id`
pub async fn mount_metadata(server: &MockServer, title_id: &str, entry: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/info/{title_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": { title_id: entry }
        })))
        .named("metadata index")
        .mount(server)
        .await;
}

/// Make every request for `title_id` on `server` fail with `status`
pub async fn mount_failure(server: &MockServer, title_id: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/info/{title_id}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
