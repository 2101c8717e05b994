//! Fakes used from inside views: storage, mail, settings, persistence.
//!
//! Every fake is thread-scoped and restored by a guard, including when the
//! test body panics.

use bytes::Bytes;
use serde_json::{json, Map, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use viewtest::files::create_inmemory_file;
use viewtest::mail::{self, Email, EmailCriteria, Mailbox};
use viewtest::persistence::{self, InstanceStore, MemoryStore};
use viewtest::settings;
use viewtest::storage::{self, Storage};
use viewtest::{
    assert_email_exists, assert_emails_in_mailbox, Request, Response, ResponseAssertions,
    ViewArgs, ViewTestCase,
};
use viewtest_core::ViewResult;

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

#[test]
fn test_upload_view_writes_to_installed_storage() {
    fn upload(request: &mut Request, _args: &ViewArgs) -> ViewResult {
        let name = request.query_param("name").unwrap_or_default();
        let stored = storage::default_storage()?.save(&format!("/uploads/{name}"), request.body().clone())?;
        Ok(Response::redirect(stored))
    }

    let guard = storage::install_in_memory();
    let case = ViewTestCase::builder()
        .view_function("upload", upload)
        .build()
        .unwrap();

    let file = create_inmemory_file("notes.txt", "line one\nline two", None);
    let mut request = case
        .factory()
        .post("/upload/?name=notes.txt")
        .content_type(file.content_type.clone())
        .body(file.read())
        .build()
        .unwrap();

    case.view(&mut request, &ViewArgs::new())
        .unwrap()
        .assert_redirect(Some("/uploads/notes.txt"));

    assert_eq!(guard.size("/uploads/notes.txt").unwrap(), file.size() as u64);
    let (dirs, files) = guard.listdir("/").unwrap();
    assert_eq!(dirs, vec!["uploads".to_string()]);
    assert!(files.is_empty());
}

#[test]
fn test_storage_missing_outside_install() {
    assert!(storage::default_storage().is_err());
}

#[test]
fn test_storage_restored_after_panic() {
    let outer = storage::install_in_memory();
    outer.save("/keep.txt", Bytes::from_static(b"k")).unwrap();

    let result = catch_unwind(AssertUnwindSafe(|| {
        let inner = storage::install_in_memory();
        inner.save("/tmp.txt", Bytes::from_static(b"t")).unwrap();
        panic!("assertion failed inside test");
    }));
    assert!(result.is_err());

    let active: Arc<dyn Storage> = storage::default_storage().unwrap();
    assert!(active.exists("/keep.txt"));
    assert!(!active.exists("/tmp.txt"));
}

#[test]
fn test_signup_view_sends_mail() {
    fn signup(request: &mut Request, _args: &ViewArgs) -> ViewResult {
        let address = request.form_param("email").unwrap_or_default();
        mail::send(
            Email::builder("Confirm your account", "Click the link")
                .from("noreply@example.com")
                .to(address)
                .build(),
        );
        Ok(Response::redirect("/signup/done/"))
    }

    let outbox = Mailbox::install();
    let case = ViewTestCase::builder()
        .view_function("signup", signup)
        .build()
        .unwrap();
    let mut request = case
        .factory()
        .post("/signup/")
        .data(&json!({"email": "ada@example.com"}))
        .build()
        .unwrap();

    case.view(&mut request, &ViewArgs::new()).unwrap().assert_redirect(None);
    assert_emails_in_mailbox(&outbox, 1);
    assert_email_exists(
        &outbox,
        &EmailCriteria::new()
            .subject("Confirm your account")
            .to(["ada@example.com"]),
    );
}

#[test]
fn test_mailbox_restored_after_panic() {
    let outer = Mailbox::install();
    let result = catch_unwind(|| {
        let _inner = Mailbox::install();
        mail::send_mail("lost", "", "a@example.com", ["b@example.com"]);
        panic!("boom");
    });
    assert!(result.is_err());

    mail::send_mail("kept", "", "a@example.com", ["b@example.com"]);
    assert_eq!(outer.len(), 1);
    assert_eq!(outer.emails()[0].subject, "kept");
}

#[test]
fn test_view_reads_overridden_settings() {
    fn page_size(_request: &mut Request, _args: &ViewArgs) -> ViewResult {
        let size = settings::get_as::<u32>("PAGE_SIZE")?.unwrap_or(20);
        Ok(Response::json(http::StatusCode::OK, &json!({"page_size": size})))
    }

    let case = ViewTestCase::builder()
        .view_function("page_size", page_size)
        .build()
        .unwrap();

    let mut request = case.factory().get("/").build().unwrap();
    case.view(&mut request, &ViewArgs::new())
        .unwrap()
        .assert_json_eq(&json!({"page_size": 20}));

    let _guard = settings::override_settings(object(json!({"PAGE_SIZE": 5})));
    let mut request = case.factory().get("/").build().unwrap();
    case.view(&mut request, &ViewArgs::new())
        .unwrap()
        .assert_json_eq(&json!({"page_size": 5}));
}

#[test]
fn test_create_view_persists_instance() {
    let store = Arc::new(MemoryStore::new("Article"));
    let view_store = Arc::clone(&store);
    let case = ViewTestCase::builder()
        .view_function("create_article", move |request, _args| {
            let title = request.form_param("title").unwrap_or_default();
            let article = view_store.create(object(json!({"title": title})));
            Ok(Response::redirect(format!("/articles/{}/", article.pk)))
        })
        .build()
        .unwrap();

    let mut request = case
        .factory()
        .post("/articles/")
        .data(&json!({"title": "Hello"}))
        .build()
        .unwrap();

    let lookup = json!({"title": "Hello"});
    persistence::assert_instance_does_not_exist(store.as_ref(), &lookup);
    let response = persistence::assert_instance_created(store.as_ref(), &lookup, || {
        case.view(&mut request, &ViewArgs::new()).unwrap()
    });
    response.assert_redirect(Some("/articles/1/"));
    persistence::assert_instance_exists(store.as_ref(), &lookup);

    persistence::assert_instance_deleted(store.as_ref(), &lookup, || store.delete(1));
    assert!(persistence::refresh(store.as_ref(), 1).is_none());
    assert_eq!(store.model_name(), "Article");
}
