use super::*;
use crate::config::HttpTimeouts;

#[test]
fn error_body_message_is_used_verbatim() {
    let err = error_from_body(404, r#"{"error":"Card with id 9 does not exist."}"#);
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "Card with id 9 does not exist.");
}

#[test]
fn error_without_message_falls_back_to_status() {
    assert_eq!(error_from_body(500, "<html>boom</html>").to_string(), "request failed with status 500");
    assert_eq!(error_from_body(502, r#"{"error":""}"#).to_string(), "request failed with status 502");
    assert_eq!(error_from_body(400, r#"{"error":null}"#).to_string(), "request failed with status 400");
}

#[test]
fn parse_body_decodes_card_page() {
    let page: CardPage = parse_body(r#"{"cards":[{"id":1,"name":"A"},{"id":2,"name":"B"}]}"#).unwrap();
    assert_eq!(page.cards.len(), 2);
    assert_eq!(page.cards[1].name, "B");
}

#[test]
fn parse_body_reports_malformed_json() {
    let err = parse_body::<SavedCard>("{not json").unwrap_err();
    assert!(matches!(err, ApiError::Parse(_)));
}

#[test]
fn success_range() {
    assert!(is_success(200));
    assert!(is_success(201));
    assert!(is_success(202));
    assert!(!is_success(404));
    assert!(!is_success(302));
}

#[test]
fn client_strips_trailing_slash() {
    let config = ApiConfig {
        base_url: "http://localhost:5000/api/".into(),
        image_base_path: "/uploads/".into(),
        timeouts: HttpTimeouts::default(),
    };
    let api = HttpCardApi::new(&config).unwrap();
    assert_eq!(api.base_url(), "http://localhost:5000/api");
    assert_eq!(api.url("/cards"), "http://localhost:5000/api/cards");
}

#[test]
fn request_id_is_one_escaped_path_segment() {
    let config = ApiConfig {
        base_url: "http://localhost:5000/api".into(),
        image_base_path: "/uploads/".into(),
        timeouts: HttpTimeouts::default(),
    };
    let api = HttpCardApi::new(&config).unwrap();

    let plain = api.url_with_segment("/image_gen/request-status", "req-42").unwrap();
    assert_eq!(plain.as_str(), "http://localhost:5000/api/image_gen/request-status/req-42");

    let hostile = api.url_with_segment("/image_gen/request-status", "a/b?c#d").unwrap();
    assert_eq!(hostile.path(), "/api/image_gen/request-status/a%2Fb%3Fc%23d");
    assert_eq!(hostile.query(), None);
    assert_eq!(hostile.fragment(), None);
}
