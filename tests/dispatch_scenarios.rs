//! End-to-end dispatch scenarios driven through `Router::handle`.

use std::sync::{Arc, Mutex};

use axum::http::{HeaderValue, Method, StatusCode};
use switchyard::routing::{DispatchOutcome, MethodAwareFallback, Unhandled};
use switchyard::{BufferedResponse, Flow, MethodArbiter, ResponseSink, Router};

mod common;
use common::{get_accepting, request};

fn handle(router: &Router, method: Method, path: &str) -> BufferedResponse {
    router.handle(&request(method, path))
}

#[test]
fn test_literal_route_with_accepted_method() {
    let router = Router::new();
    router
        .on(MethodArbiter::GET, "/a/b/c", |ex| {
            ex.send("abc")?;
            Ok(())
        })
        .unwrap();

    let response = handle(&router, Method::GET, "/a/b/c");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text(), "abc\n");

    // Extra and missing segments never match.
    assert_eq!(handle(&router, Method::GET, "/a/b").status(), StatusCode::NOT_FOUND);
    assert_eq!(handle(&router, Method::GET, "/a/b/c/d").status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_literal_sibling_beats_parameter() {
    let router = Router::new();
    router
        .on(MethodArbiter::GET, "/:id", |ex| {
            let line = format!("id {}", ex.param("id").unwrap_or_default());
            ex.send(&line)?;
            Ok(())
        })
        .unwrap();
    router
        .on(MethodArbiter::GET, "/fixed", |ex| {
            ex.send("fixed")?;
            Ok(())
        })
        .unwrap();

    assert_eq!(handle(&router, Method::GET, "/fixed").text(), "fixed\n");
    assert_eq!(handle(&router, Method::GET, "/other").text(), "id other\n");
}

#[test]
fn test_dead_end_literal_backtracks_to_parameter() {
    let router = Router::new();
    router
        .on(MethodArbiter::GET, "/users/admin/settings", |ex| {
            ex.send("settings")?;
            Ok(())
        })
        .unwrap();
    router
        .on(MethodArbiter::GET, "/users/:name", |ex| {
            let line = format!("user {}", ex.param("name").unwrap_or_default());
            ex.send(&line)?;
            Ok(())
        })
        .unwrap();

    assert_eq!(handle(&router, Method::GET, "/users/admin").text(), "user admin\n");
    assert_eq!(
        handle(&router, Method::GET, "/users/admin/settings").text(),
        "settings\n"
    );
}

#[test]
fn test_remove_with_get_removes_any_method_route() {
    let router = Router::new();
    router
        .on(MethodArbiter::any_method(), "/everything", |ex| {
            ex.send("yes")?;
            Ok(())
        })
        .unwrap();
    assert_eq!(handle(&router, Method::DELETE, "/everything").text(), "yes\n");

    assert!(router.remove(&MethodArbiter::GET, "/everything"));
    assert_eq!(
        handle(&router, Method::GET, "/everything").status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        handle(&router, Method::DELETE, "/everything").status(),
        StatusCode::NOT_FOUND
    );
}

#[test]
fn test_content_negotiation() {
    let router = Router::new();
    router
        .register(
            "/doc",
            MethodArbiter::GET,
            Some("application/json,application/xml"),
            |ex| {
                let line = format!("as {}", ex.content_type());
                ex.send(&line)?;
                Ok(())
            },
        )
        .unwrap();

    let xml = router.handle(&get_accepting("/doc", "application/xml"));
    assert_eq!(xml.text(), "as application/xml\n");
    assert_eq!(xml.header("content-type"), Some("application/xml"));

    let any = router.handle(&get_accepting("/doc", "*/*"));
    assert_eq!(any.header("content-type"), Some("application/json"));

    let weighted = router.handle(&get_accepting(
        "/doc",
        "application/json;q=0.5, application/xml;q=0.9",
    ));
    assert_eq!(weighted.header("content-type"), Some("application/xml"));

    let none = router.handle(&get_accepting("/doc", "text/plain"));
    assert_eq!(none.status(), StatusCode::NOT_FOUND);
    assert!(none.body_bytes().is_empty());

    let absent = handle(&router, Method::GET, "/doc");
    assert_eq!(absent.header("content-type"), Some("application/json"));
}

#[test]
fn test_payload_format_follows_negotiated_type() {
    let router = Router::new();
    router
        .register(
            "/greeting",
            MethodArbiter::GET,
            Some("application/json,text/plain"),
            |ex| {
                ex.send("hello")?;
                Ok(())
            },
        )
        .unwrap();

    let json = router.handle(&get_accepting("/greeting", "application/json"));
    assert_eq!(json.header("content-type"), Some("application/json"));
    assert_eq!(json.text(), "\"hello\"\n");

    let text = router.handle(&get_accepting("/greeting", "text/plain"));
    assert_eq!(text.header("content-type"), Some("text/plain"));
    assert_eq!(text.text(), "hello\n");
}

#[test]
fn test_unreadable_accept_header_matches_nothing() {
    let router = Router::new();
    router
        .register("/plain", MethodArbiter::GET, Some("text/plain"), |ex| {
            ex.send("plain")?;
            Ok(())
        })
        .unwrap();

    let garbled = request(Method::GET, "/plain")
        .with_accept(HeaderValue::from_bytes(b"t\xffxt/plain").unwrap());
    assert_eq!(router.handle(&garbled).status(), StatusCode::NOT_FOUND);

    let split = request(Method::GET, "/plain")
        .with_accept(HeaderValue::from_static("application/json"))
        .with_accept(HeaderValue::from_static("text/plain"));
    assert_eq!(router.handle(&split).text(), "plain\n");
}

#[test]
fn test_text_bodies_that_parse_as_json_echo_verbatim() {
    let router = Router::new();
    router
        .on(MethodArbiter::POST, "/echo", |ex| {
            let body: String = ex.receive()?;
            ex.send(&body)?;
            Ok(())
        })
        .unwrap();

    for body in ["42", "true", "null", "hello"] {
        let response = router.handle(&request(Method::POST, "/echo").with_body(body));
        assert_eq!(response.status(), StatusCode::OK, "body {body}");
        assert_eq!(response.text(), format!("{body}\n"));
    }
}

#[test]
fn test_negotiation_falls_through_to_next_entry() {
    let router = Router::new();
    router
        .register("/report", MethodArbiter::GET, Some("text/csv"), |ex| {
            ex.send("a,b")?;
            Ok(())
        })
        .unwrap();
    router
        .register("/report", MethodArbiter::GET, Some("application/json"), |ex| {
            ex.send(&serde_json::json!({"a": "b"}))?;
            Ok(())
        })
        .unwrap();

    let json = router.handle(&get_accepting("/report", "application/json"));
    assert_eq!(json.text(), "{\"a\":\"b\"}\n");
    let csv = router.handle(&get_accepting("/report", "text/*"));
    assert_eq!(csv.text(), "a,b\n");
}

#[test]
fn test_filters_run_most_recent_first_and_can_stop() {
    let router = Router::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    router
        .on(MethodArbiter::GET, "/guarded", |ex| {
            ex.send("handler")?;
            Ok(())
        })
        .unwrap();
    for name in ["older", "newer"] {
        let order = Arc::clone(&order);
        router
            .register_filter("/guarded", move |_| {
                order.lock().unwrap().push(name);
                Ok(Flow::Continue)
            })
            .unwrap();
    }

    assert_eq!(handle(&router, Method::GET, "/guarded").text(), "handler\n");
    assert_eq!(*order.lock().unwrap(), vec!["newer", "older"]);

    router
        .register_filter("/guarded", |ex| {
            ex.set_status(StatusCode::FORBIDDEN);
            ex.send("denied")?;
            Ok(Flow::Handled)
        })
        .unwrap();
    let response = handle(&router, Method::GET, "/guarded");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.text(), "denied\n");
    assert_eq!(order.lock().unwrap().len(), 2);
}

#[test]
fn test_error_page_for_failing_handler() {
    let router = Router::new();
    let page_hits = Arc::new(Mutex::new(0));

    router
        .on(MethodArbiter::GET, "/boom", |_| Err("kaboom".into()))
        .unwrap();
    let hits = Arc::clone(&page_hits);
    router
        .on(MethodArbiter::GET, "/errpage", move |ex| {
            *hits.lock().unwrap() += 1;
            ex.send("Something went wrong")?;
            Ok(())
        })
        .unwrap();
    router.register_error_page_range(500, 599, "/errpage").unwrap();

    let response = handle(&router, Method::GET, "/boom");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "Something went wrong\n");
    assert_eq!(*page_hits.lock().unwrap(), 1);
}

#[test]
fn test_failing_error_page_does_not_recurse() {
    let router = Router::new();
    let page_hits = Arc::new(Mutex::new(0));

    router
        .on(MethodArbiter::GET, "/boom", |_| Err("kaboom".into()))
        .unwrap();
    let hits = Arc::clone(&page_hits);
    router
        .on(MethodArbiter::GET, "/errpage", move |_| {
            *hits.lock().unwrap() += 1;
            Err("error page broke too".into())
        })
        .unwrap();
    router.register_error_page_range(500, 599, "/errpage").unwrap();

    let response = handle(&router, Method::GET, "/boom");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body_bytes().is_empty());
    assert_eq!(*page_hits.lock().unwrap(), 1);
}

#[test]
fn test_error_page_for_unknown_path() {
    let router = Router::new();
    router
        .on(MethodArbiter::GET, "errors/page400", |ex| {
            ex.send("Page not found")?;
            Ok(())
        })
        .unwrap();
    router.register_error_page_range(400, 499, "errors/page400").unwrap();

    let response = handle(&router, Method::GET, "/does/not/exist");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.text(), "Page not found\n");

    // The error page only answers GET; a POST keeps the bare status.
    let response = handle(&router, Method::POST, "/does/not/exist");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.body_bytes().is_empty());
}

#[test]
fn test_invalid_error_page_ranges_fail_fast() {
    let router = Router::new();
    assert!(router.register_error_page(99, "/x").is_err());
    assert!(router.register_error_page(600, "/x").is_err());
    assert!(router.register_error_page_range(500, 400, "/x").is_err());
    assert!(router.error_pages().is_empty());
}

#[test]
fn test_method_specific_removal() {
    let router = Router::new();
    router
        .on(MethodArbiter::GET, "/hi", |ex| {
            ex.send("Hi")?;
            Ok(())
        })
        .unwrap();
    router
        .on(MethodArbiter::PUT, "/hi", |ex| {
            ex.send("Hi2")?;
            Ok(())
        })
        .unwrap();

    assert_eq!(handle(&router, Method::GET, "/hi").text(), "Hi\n");
    assert_eq!(handle(&router, Method::PUT, "/hi").text(), "Hi2\n");

    assert!(router.remove(&MethodArbiter::GET, "/hi"));
    assert_eq!(handle(&router, Method::GET, "/hi").status(), StatusCode::NOT_FOUND);
    assert_eq!(handle(&router, Method::PUT, "/hi").text(), "Hi2\n");
    assert!(!router.remove(&MethodArbiter::GET, "/hi"));
}

#[test]
fn test_method_aware_fallback_answers_405() {
    let router = Router::new().with_fallback(MethodAwareFallback);
    router
        .on(MethodArbiter::PUT, "/hi", |ex| {
            ex.send("Hi2")?;
            Ok(())
        })
        .unwrap();
    assert_eq!(
        handle(&router, Method::GET, "/hi").status(),
        StatusCode::METHOD_NOT_ALLOWED
    );
    assert_eq!(handle(&router, Method::GET, "/nope").status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_unhandled_reasons() {
    let router = Router::new();
    router
        .register("/only", MethodArbiter::POST, Some("text/html"), |_| Ok(()))
        .unwrap();
    let dispatcher = router.dispatcher();

    let mut response = BufferedResponse::new();
    let outcome = dispatcher
        .dispatch(&request(Method::GET, "/nothing"), &mut response)
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Unhandled(Unhandled::NoRoute));

    let outcome = dispatcher
        .dispatch(&request(Method::GET, "/only"), &mut response)
        .unwrap();
    assert_eq!(
        outcome,
        DispatchOutcome::Unhandled(Unhandled::MethodNotAccepted)
    );
    assert!(!response.is_finalized());
}

#[test]
fn test_concurrent_registration_and_dispatch() {
    let router = Arc::new(Router::new());
    router
        .on(MethodArbiter::GET, "/stable", |ex| {
            ex.send("stable")?;
            Ok(())
        })
        .unwrap();

    let writer = {
        let router = Arc::clone(&router);
        std::thread::spawn(move || {
            for i in 0..200 {
                let pattern = format!("/dynamic/{i}");
                router
                    .on(MethodArbiter::GET, &pattern, move |ex| {
                        ex.send(&i)?;
                        Ok(())
                    })
                    .unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let router = Arc::clone(&router);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let response = router.handle(&request(Method::GET, "/stable"));
                    assert_eq!(response.text(), "stable\n");
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(handle(&router, Method::GET, "/dynamic/199").text(), "199\n");
    assert_eq!(router.dispatcher().len(), 201);
}
