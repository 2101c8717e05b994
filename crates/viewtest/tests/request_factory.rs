//! Request factory integration tests.

use http::Method;
use proptest::prelude::*;
use serde_json::json;
use viewtest::{CallerIdentity, RequestFactory, ViewTestConfig, ViewTestError};

static QUERY_METHODS: [&str; 4] = ["GET", "HEAD", "DELETE", "OPTIONS"];
static BODY_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

proptest! {
    #[test]
    fn prop_query_methods_encode_payload_in_query(
        index in 0..QUERY_METHODS.len(),
        value in "[a-zA-Z0-9 &=?/]{0,24}",
    ) {
        let method = QUERY_METHODS[index];
        let request = RequestFactory::new()
            .build(method, "/search/", Some(&json!({"q": value.clone()})), None)
            .unwrap();

        prop_assert_eq!(request.method().as_str(), method);
        prop_assert_eq!(request.query_param("q"), Some(value));
        prop_assert!(request.body().is_empty());
    }

    #[test]
    fn prop_body_methods_encode_payload_in_body(
        index in 0..BODY_METHODS.len(),
        value in "[a-zA-Z0-9 &=?/]{0,24}",
    ) {
        let method = BODY_METHODS[index];
        let request = RequestFactory::new()
            .build(&method.to_lowercase(), "/items/", Some(&json!({"name": value.clone()})), None)
            .unwrap();

        prop_assert_eq!(request.method().as_str(), method);
        prop_assert_eq!(request.form_param("name"), Some(value));
        prop_assert_eq!(request.query_string(), "");
    }

    #[test]
    fn prop_unknown_methods_rejected(name in "[A-Z]{3,8}") {
        prop_assume!(![QUERY_METHODS.as_slice(), BODY_METHODS.as_slice()]
            .concat()
            .contains(&name.as_str()));
        let result = RequestFactory::new().build(&name, "/", None, None);
        let is_invalid_method = matches!(result, Err(ViewTestError::InvalidMethod { .. }));
        prop_assert!(is_invalid_method);
    }
}

#[test]
fn test_build_attaches_identity() {
    let request = RequestFactory::new()
        .build("GET", "/me/", None, Some(CallerIdentity::staff("9", "root")))
        .unwrap();
    assert!(request.user().is_some_and(CallerIdentity::is_staff));

    let anonymous = RequestFactory::new().build("GET", "/me/", None, None).unwrap();
    assert!(anonymous.user().is_none());
}

#[test]
fn test_factory_from_loaded_config() {
    let config = ViewTestConfig::builder()
        .default_header("x-forwarded-proto", "https")
        .build_validated()
        .unwrap();
    let factory = RequestFactory::from_config(&config.request);

    let request = factory.options("/").build().unwrap();
    assert_eq!(request.method(), &Method::OPTIONS);
    assert_eq!(request.header_str("x-forwarded-proto"), Some("https"));
}

#[test]
fn test_payload_from_struct() {
    #[derive(serde::Serialize)]
    struct Search<'a> {
        q: &'a str,
        page: u32,
        tags: Vec<&'a str>,
    }

    let request = RequestFactory::new()
        .get("/search/?sort=new")
        .data(&Search {
            q: "rust",
            page: 2,
            tags: vec!["web", "test"],
        })
        .build()
        .unwrap();

    assert_eq!(request.query_param("sort").as_deref(), Some("new"));
    assert_eq!(request.query_param("page").as_deref(), Some("2"));
    let tags: Vec<String> = request
        .query_pairs()
        .into_iter()
        .filter(|(k, _)| k == "tags")
        .map(|(_, v)| v)
        .collect();
    assert_eq!(tags, vec!["web", "test"]);
}

#[test]
fn test_token_authentication() {
    let request = RequestFactory::new()
        .post("/api/items/")
        .json(&json!({"name": "x"}))
        .user(CallerIdentity::api_key("k1", "ci"))
        .token("secret-token")
        .build()
        .unwrap();
    assert_eq!(request.auth_token(), Some("secret-token"));
    assert_eq!(request.identity().log_id(), "apikey:k1");
}
