#![allow(dead_code)]

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use playlist_paste::{AccessToken, CatalogClient, UserProfile};

pub const TOKEN: &str = "test-access-token";

pub fn token() -> AccessToken {
    AccessToken::new(TOKEN)
}

pub fn user() -> UserProfile {
    UserProfile {
        id: "wizzler".to_string(),
        display_name: Some("Wizzler".to_string()),
    }
}

pub fn catalog(server: &MockServer) -> CatalogClient {
    CatalogClient::with_base_url(&format!("{}/v1", server.uri()))
}

pub fn track_json(uri: &str, name: &str, artist: &str) -> Value {
    json!({
        "uri": uri,
        "name": name,
        "artists": [{"name": artist}],
        "album": {"images": [{"url": "https://i.scdn.co/image/cover"}]},
        "external_urls": {"spotify": format!("https://open.spotify.com/track/{}", name)}
    })
}

pub fn search_hit(uri: &str, name: &str, artist: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(json!({"tracks": {"items": [track_json(uri, name, artist)]}}))
}

pub fn search_miss() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"tracks": {"items": []}}))
}

pub async fn mount_search(server: &MockServer, query: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("q", query))
        .and(query_param("type", "track"))
        .and(query_param("limit", "1"))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

pub fn playlist_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": "Mix",
        "external_urls": {"spotify": format!("https://open.spotify.com/playlist/{}", id)}
    })
}
