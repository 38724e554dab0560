//! Tests for the request lifecycle behind `Application::run`
//!
//! # Test Coverage
//!
//! - Route scanning in registration order, filters and fallthrough
//! - 404 and 405 pages, including the computed `Allow` header
//! - OPTIONS answers, the `*` probe path and HEAD handling
//! - Response normalization for text, JSON and prebuilt responses
//! - Hook ordering: before, not-found, before-send, after, error, render
//! - The 500 path: panics, hook contract violations and template fallbacks
//! - Method override, case-insensitive URLs and mounts

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use common::{echo_params, temp_files, text};
use fastsite::handlers::FilterOutcome;
use fastsite::router::{Converter, Validation};
use fastsite::{AppConfig, Application, Reply, Request, Response};
use http::Method;
use serde_json::json;

fn request(method: Method, target: &str) -> Request {
    Request::new(method, target)
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[test]
fn test_routes_are_scanned_in_registration_order() {
    let mut app = Application::new();
    app.get("/users/:id", text("by id"));
    app.get("/users/me", text("me"));

    // The parameterized route was registered first and wins
    assert_eq!(app.run(&Request::get("/users/me")).body_text(), "by id");
}

#[test]
fn test_positional_params_reach_the_controller() {
    let mut app = Application::new();
    app.param(":id", Validation::Int, Some(Converter::Int)).unwrap();
    app.get("/posts/:id/:slug?", echo_params);

    let emitted = app.run(&Request::get("/posts/7/hello-world"));
    assert_eq!(emitted.status, 200);
    assert_eq!(emitted.body_text(), r#"[7,"hello-world"]"#);

    assert_eq!(app.run(&Request::get("/posts/7")).body_text(), "[7]");
    assert_eq!(app.run(&Request::get("/posts/seven")).status, 404);
}

#[test]
fn test_failed_rule_falls_through_to_later_route() {
    let mut app = Application::new();
    app.param(":id", Validation::Int, None).unwrap();
    app.get("/items/:id", text("numeric"));
    app.get("/items/:name", text("named"));

    assert_eq!(app.run(&Request::get("/items/12")).body_text(), "numeric");
    assert_eq!(app.run(&Request::get("/items/abc")).body_text(), "named");
}

#[test]
fn test_not_found_page() {
    let mut app = Application::new();
    app.get("/", text("home"));

    let emitted = app.run(&Request::get("/missing"));
    assert_eq!(emitted.status, 404);
    assert_eq!(emitted.header("Content-Type"), Some("text/html; charset=UTF-8"));
    let body = emitted.body_text();
    assert!(body.contains("404 - Page Not Found"), "{body}");
    assert!(body.contains("[/missing]"), "{body}");
}

#[test]
fn test_method_not_allowed_lists_every_matching_route() {
    let mut app = Application::new();
    app.get("/x", text("get"));
    app.post("/x", text("post"));
    app.get("/y", text("other"));

    let emitted = app.run(&request(Method::DELETE, "/x"));
    assert_eq!(emitted.status, 405);
    assert_eq!(emitted.header("Allow"), Some("GET, HEAD, OPTIONS, POST"));
    let body = emitted.body_text();
    assert!(body.contains("Error - Method Not Allowed"), "{body}");
    assert!(body.contains("[DELETE]"), "{body}");
}

#[test]
fn test_method_not_allowed_without_options_support() {
    let mut app = Application::with_config(AppConfig {
        allow_options_requests: false,
        ..AppConfig::default()
    });
    app.get("/x", text("get"));

    let emitted = app.run(&request(Method::OPTIONS, "/x"));
    assert_eq!(emitted.status, 405);
    assert_eq!(emitted.header("Allow"), Some("GET, HEAD"));
}

#[test]
fn test_invalid_pattern_is_a_server_error() {
    let mut app = Application::with_config(AppConfig {
        show_detailed_errors: true,
        ..AppConfig::default()
    });
    app.get("/files/*/edit", text("never"));

    let emitted = app.run(&Request::get("/files/a/edit"));
    assert_eq!(emitted.status, 500);
    let body = emitted.body_text();
    assert!(body.contains("ConfigError"), "{body}");
    assert!(body.contains("wildcard"), "{body}");
}

#[test]
fn test_case_insensitive_urls() {
    let mut app = Application::new();
    app.get("/About", text("about"));
    assert_eq!(app.run(&Request::get("/about")).status, 404);

    let mut app = Application::with_config(AppConfig {
        case_sensitive_urls: false,
        ..AppConfig::default()
    });
    app.get("/About", text("about"));
    assert_eq!(app.run(&Request::get("/about")).body_text(), "about");
}

#[test]
fn test_strict_url_mode() {
    let mut app = Application::with_config(AppConfig {
        strict_url_mode: true,
        ..AppConfig::default()
    });
    app.get("/about", text("about"));
    assert_eq!(app.run(&Request::get("/about")).status, 200);
    assert_eq!(app.run(&Request::get("/about/")).status, 404);
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[test]
fn test_filter_skip_continues_with_later_routes() {
    let mut app = Application::new();
    app.get("/admin", text("admin"))
        .filter(|ctx| Ok(FilterOutcome::from(ctx.request().header("X-Admin").is_some())));
    app.get("/admin", text("login first"));

    assert_eq!(app.run(&Request::get("/admin")).body_text(), "login first");
    let admin = Request::get("/admin").with_header("X-Admin", "1");
    assert_eq!(app.run(&admin).body_text(), "admin");
}

#[test]
fn test_filter_can_respond() {
    let mut app = Application::new();
    app.get("/account", text("account"))
        .filter(|_ctx| Ok(FilterOutcome::Respond(Response::redirect("/login", 302)?)));

    let emitted = app.run(&Request::get("/account"));
    assert_eq!(emitted.status, 302);
    assert_eq!(emitted.header("Location"), Some("/login"));
    assert!(emitted.body.is_empty());
}

#[test]
fn test_filters_run_in_order_and_stop_at_first_non_continue() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let (a, b, c) = (Arc::clone(&calls), Arc::clone(&calls), Arc::clone(&calls));

    let mut app = Application::new();
    app.get("/", text("home"))
        .filter(move |_ctx| {
            a.lock().unwrap().push("first");
            Ok(FilterOutcome::Continue)
        })
        .filter(move |_ctx| {
            b.lock().unwrap().push("second");
            Ok(FilterOutcome::Skip)
        })
        .filter(move |_ctx| {
            c.lock().unwrap().push("third");
            Ok(FilterOutcome::Continue)
        });

    assert_eq!(app.run(&Request::get("/")).status, 404);
    assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
}

#[test]
fn test_filters_do_not_run_for_other_methods() {
    let ran = counter();
    let seen = Arc::clone(&ran);
    let mut app = Application::new();
    app.post("/form", text("saved")).filter(move |_ctx| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(FilterOutcome::Continue)
    });

    assert_eq!(app.run(&Request::get("/form")).status, 405);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// OPTIONS and HEAD
// ---------------------------------------------------------------------------

#[test]
fn test_options_request_reports_allowed_methods() {
    let mut app = Application::new();
    app.get("/x", text("get"));
    app.post("/x", text("post"));

    let emitted = app.run(&request(Method::OPTIONS, "/x"));
    assert_eq!(emitted.status, 200);
    assert_eq!(emitted.header("Allow"), Some("GET, HEAD, OPTIONS, POST"));
    assert!(emitted.body.is_empty());
}

#[test]
fn test_options_probe_path_covers_every_route() {
    let mut app = Application::new();
    app.get("/a", text("a"));
    app.put("/b", text("b"));

    let emitted = app.run(&request(Method::OPTIONS, "*"));
    assert_eq!(emitted.status, 200);
    assert_eq!(emitted.header("Allow"), Some("GET, HEAD, OPTIONS, PUT"));
}

#[test]
fn test_options_for_any_method_route_lists_all_methods() {
    let mut app = Application::new();
    app.route("/any", text("any"));

    let emitted = app.run(&request(Method::OPTIONS, "/any"));
    assert_eq!(
        emitted.header("Allow"),
        Some("DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT")
    );
}

#[test]
fn test_options_without_matching_route_is_not_found() {
    let mut app = Application::new();
    app.get("/x", text("get"));
    assert_eq!(app.run(&request(Method::OPTIONS, "/nothing")).status, 404);
}

#[test]
fn test_head_request_drops_the_body() {
    let mut app = Application::new();
    app.get("/page", text("<p>content</p>"));

    let emitted = app.run(&request(Method::HEAD, "/page"));
    assert_eq!(emitted.status, 200);
    assert_eq!(emitted.header("Content-Type"), Some("text/html; charset=UTF-8"));
    assert!(emitted.body.is_empty());

    assert_eq!(app.run(&request(Method::HEAD, "/missing")).status, 404);
    assert!(app.run(&request(Method::HEAD, "/missing")).body.is_empty());
}

#[test]
fn test_after_hooks_see_the_body_of_a_head_request() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    let mut app = Application::new();
    app.get("/page", text("<p>content</p>"));
    app.after(move |emitted, _ctx| {
        log.lock().unwrap().push(emitted.body_text());
        Ok(())
    });

    let emitted = app.run(&request(Method::HEAD, "/page"));
    assert!(emitted.body.is_empty());
    assert_eq!(seen.lock().unwrap().as_slice(), &["<p>content</p>".to_string()]);
}

#[test]
fn test_method_override() {
    let mut app = Application::with_config(AppConfig {
        allow_methods_override: true,
        ..AppConfig::default()
    });
    app.delete("/items/:id", |_ctx, params| Ok(Reply::Text(format!("deleted {}", params[0]))));

    let tunnelled = request(Method::POST, "/items/5").with_header("X-HTTP-Method-Override", "DELETE");
    let emitted = app.run(&tunnelled);
    assert_eq!(emitted.status, 200);
    assert_eq!(emitted.body_text(), "deleted 5");

    let mut app = Application::new();
    app.delete("/items/:id", text("deleted"));
    assert_eq!(app.run(&tunnelled).status, 405);
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

#[test]
fn test_json_reply_uses_json_content_type() {
    let mut app = Application::new();
    app.get("/api", |_ctx, _params| Ok(Reply::Json(json!({ "ok": true }))));

    let emitted = app.run(&Request::get("/api"));
    assert_eq!(emitted.header("Content-Type"), Some("application/json"));
    assert_eq!(emitted.body_text(), r#"{"ok":true}"#);
}

#[test]
fn test_content_type_set_by_controller_is_kept() {
    let mut app = Application::new();
    app.get("/api", |ctx, _params| {
        ctx.header("Content-Type", "application/vnd.api+json")?;
        Ok(Reply::Json(json!([1, 2])))
    });
    app.get("/plain", |ctx, _params| {
        ctx.header("Content-Type", "text/plain")?;
        ctx.status(201)?;
        Ok(Reply::Text("created".into()))
    });

    let emitted = app.run(&Request::get("/api"));
    assert_eq!(emitted.header("Content-Type"), Some("application/vnd.api+json"));

    let emitted = app.run(&Request::get("/plain"));
    assert_eq!(emitted.status, 201);
    assert_eq!(emitted.header("Content-Type"), Some("text/plain"));
    assert_eq!(emitted.body_text(), "created");
}

#[test]
fn test_redirect_reply() {
    let mut app = Application::new();
    app.get("/old", |_ctx, _params| Ok(Response::redirect("/new", 301)?.into()));

    let emitted = app.run(&Request::get("/old"));
    assert_eq!(emitted.status, 301);
    assert_eq!(emitted.header("Location"), Some("/new"));
}

#[test]
fn test_direct_writes_come_before_the_reply() {
    let mut app = Application::new();
    app.get("/stream", |ctx, _params| {
        ctx.write("Hello");
        assert!(ctx.header("X-Late", "1").is_err());
        Ok(Reply::Text(", World".into()))
    });

    let emitted = app.run(&Request::get("/stream"));
    assert_eq!(emitted.status, 200);
    assert_eq!(emitted.body_text(), "Hello, World");
    assert_eq!(emitted.header("X-Late"), None);
}

#[test]
fn test_query_and_cookies_reach_the_controller() {
    let mut app = Application::new();
    app.get("/search", |ctx, _params| {
        let req = ctx.request();
        Ok(Reply::Text(format!(
            "{}:{}",
            req.query("q").unwrap_or(""),
            req.cookie("session").unwrap_or("")
        )))
    });

    let req = Request::get("/search?q=rust%20lang").with_header("Cookie", "session=abc; theme=dark");
    assert_eq!(app.run(&req).body_text(), "rust lang:abc");
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

#[test]
fn test_before_hooks_run_before_routing() {
    let mut app = Application::new();
    app.before(|ctx| {
        ctx.header("X-Frame-Options", "DENY")?;
        ctx.locals.insert("greeting".into(), json!("hi"));
        Ok(())
    });
    app.get("/", |ctx, _params| {
        Ok(Reply::Text(ctx.locals["greeting"].as_str().unwrap_or("").to_string()))
    });

    let emitted = app.run(&Request::get("/"));
    assert_eq!(emitted.body_text(), "hi");
    assert_eq!(emitted.header("X-Frame-Options"), Some("DENY"));
    assert_eq!(app.run(&Request::get("/nope")).header("X-Frame-Options"), Some("DENY"));
}

#[test]
fn test_not_found_hooks_in_order() {
    let mut app = Application::new();
    app.not_found(|_ctx| Ok(None));
    app.not_found(|ctx| {
        if ctx.requested_path().starts_with("/legacy") {
            ctx.status(410)?;
            return Ok(Some(Reply::Text("gone".into())));
        }
        Ok(None)
    });
    app.not_found(|_ctx| Ok(Some(Reply::Text("catch-all".into()))));

    let emitted = app.run(&Request::get("/legacy/page"));
    assert_eq!(emitted.status, 410);
    assert_eq!(emitted.body_text(), "gone");

    let emitted = app.run(&Request::get("/other"));
    assert_eq!(emitted.status, 200);
    assert_eq!(emitted.body_text(), "catch-all");
}

#[test]
fn test_not_found_hook_also_handles_method_mismatch() {
    let mut app = Application::new();
    app.post("/form", text("saved"));
    app.not_found(|_ctx| Ok(Some(Reply::Text("custom".into()))));

    let emitted = app.run(&Request::get("/form"));
    assert_eq!(emitted.status, 200);
    assert_eq!(emitted.body_text(), "custom");
}

#[test]
fn test_before_send_can_replace_the_response() {
    let mut app = Application::new();
    app.get("/", text("home"));
    app.before_send(|res, _ctx| Ok(Some(res.header("X-Powered-By", "fastsite"))));
    app.before_send(|res, _ctx| {
        let body = res.body_text().to_uppercase();
        Ok(Some(res.body(body)))
    });

    let emitted = app.run(&Request::get("/"));
    assert_eq!(emitted.body_text(), "HOME");
    assert_eq!(emitted.header("X-Powered-By"), Some("fastsite"));
}

#[test]
fn test_before_send_returning_nothing_is_a_server_error() {
    let mut app = Application::with_config(AppConfig {
        show_detailed_errors: true,
        ..AppConfig::default()
    });
    app.get("/", text("home"));
    app.before_send(|_res, _ctx| Ok(None));

    let emitted = app.run(&Request::get("/"));
    assert_eq!(emitted.status, 500);
    let body = emitted.body_text();
    assert!(body.contains("ContractViolation"), "{body}");
    assert!(!body.contains("home"), "{body}");
}

#[test]
fn test_after_hooks_run_exactly_once_with_the_emitted_response() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    let mut app = Application::new();
    app.get("/", text("home"));
    app.after(move |emitted, _ctx| {
        log.lock().unwrap().push((emitted.status, emitted.body_text()));
        Ok(())
    });

    app.run(&Request::get("/"));
    app.run(&Request::get("/missing"));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], (200, "home".to_string()));
    assert_eq!(seen[1].0, 404);
}

#[test]
fn test_after_hooks_run_once_when_the_controller_fails() {
    let calls = counter();
    let seen = Arc::clone(&calls);

    let mut app = Application::new();
    app.get("/", |_ctx, _params| Err(anyhow!("broken")));
    app.after(move |emitted, _ctx| {
        assert_eq!(emitted.status, 500);
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert_eq!(app.run(&Request::get("/")).status, 500);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failing_after_hook_produces_500_for_that_request_only() {
    let errors = counter();
    let observed = Arc::clone(&errors);
    let sends = counter();
    let sent = Arc::clone(&sends);
    let afters = counter();
    let after_calls = Arc::clone(&afters);

    let mut app = Application::new();
    app.get("/", text("home"));
    app.before_send(move |mut res, _ctx| {
        sent.fetch_add(1, Ordering::SeqCst);
        res.set_header("X-Frame-Options", "DENY");
        Ok(Some(res))
    });
    app.on_error(move |_info, _ctx| {
        observed.fetch_add(1, Ordering::SeqCst);
    });
    // Fails on the first request only
    app.after(move |_emitted, _ctx| {
        if after_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(anyhow!("audit log unavailable"))
        } else {
            Ok(())
        }
    });

    let emitted = app.run(&Request::get("/"));
    assert_eq!(emitted.status, 500);
    assert!(emitted.body_text().contains("An error has occurred"));
    assert_eq!(sends.load(Ordering::SeqCst), 1);
    assert_eq!(afters.load(Ordering::SeqCst), 1);
    // Error hooks are skipped while building this 500 page
    assert_eq!(errors.load(Ordering::SeqCst), 0);

    // The next request runs every hook again
    let emitted = app.run(&Request::get("/"));
    assert_eq!(emitted.status, 200);
    assert_eq!(emitted.body_text(), "home");
    assert_eq!(emitted.header("X-Frame-Options"), Some("DENY"));
    assert_eq!(sends.load(Ordering::SeqCst), 2);
    assert_eq!(afters.load(Ordering::SeqCst), 2);

    app.get("/fail", |_ctx, _params| Err(anyhow!("broken")));
    assert_eq!(app.run(&Request::get("/fail")).status, 500);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(afters.load(Ordering::SeqCst), 3);
}

#[test]
fn test_error_hooks_observe_faults() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    let mut app = Application::new();
    app.get("/", |_ctx, _params| Err(anyhow!("database offline")));
    app.on_error(move |info, _ctx| {
        log.lock().unwrap().push((info.status, info.title.clone()));
    });
    app.on_error(|_info, _ctx| panic!("error hooks may not break the error page"));

    let emitted = app.run(&Request::get("/"));
    assert_eq!(emitted.status, 500);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(500, "An error has occurred".to_string())]
    );
}

#[test]
fn test_render_hooks_run_before_templates() {
    let dir = temp_files::dir_with(&[("page.html", "{{ site }} / {{ title }} / {{ stamp }}")]);
    let mut app = Application::with_config(AppConfig {
        template_dir: Some(dir.path().to_path_buf()),
        ..AppConfig::default()
    });
    app.locals.insert("site".into(), json!("Demo"));
    app.on_render(|ctx| {
        ctx.locals.insert("stamp".into(), json!("rendered"));
        Ok(())
    });
    app.get("/", |ctx, _params| {
        Ok(Reply::Text(ctx.render(&["page.html"], &json!({ "title": "Home" }))?))
    });

    assert_eq!(app.run(&Request::get("/")).body_text(), "Demo / Home / rendered");
}

// ---------------------------------------------------------------------------
// Server errors
// ---------------------------------------------------------------------------

#[test]
fn test_controller_panic_becomes_500() {
    let mut app = Application::new();
    app.get("/", |_ctx, _params| panic!("controller exploded"));

    let emitted = app.run(&Request::get("/"));
    assert_eq!(emitted.status, 500);
    let body = emitted.body_text();
    assert!(body.contains("An error has occurred"), "{body}");
    assert!(!body.contains("controller exploded"), "{body}");
}

#[test]
fn test_detailed_errors_show_kind_and_chain() {
    let mut app = Application::with_config(AppConfig {
        show_detailed_errors: true,
        ..AppConfig::default()
    });
    app.get("/panic", |_ctx, _params| panic!("controller exploded"));
    app.get("/error", |_ctx, _params| {
        Err(anyhow!("connection refused").context("loading profile"))
    });

    let body = app.run(&Request::get("/panic")).body_text();
    assert!(body.contains("Panic"), "{body}");
    assert!(body.contains("handler panicked: controller exploded"), "{body}");

    let body = app.run(&Request::get("/error")).body_text();
    assert!(body.contains("HandlerError"), "{body}");
    assert!(body.contains("loading profile"), "{body}");
    assert!(body.contains("Caused by: connection refused"), "{body}");
}

#[test]
fn test_partial_output_is_discarded_on_error() {
    let mut app = Application::new();
    app.get("/", |ctx, _params| {
        ctx.write("half a page");
        Err(anyhow!("then it broke"))
    });

    let emitted = app.run(&Request::get("/"));
    assert_eq!(emitted.status, 500);
    assert!(!emitted.body_text().contains("half a page"));
}

#[test]
fn test_before_hook_error_skips_routing() {
    let calls = counter();
    let seen = Arc::clone(&calls);
    let mut app = Application::new();
    app.before(|_ctx| Err(anyhow!("maintenance")));
    app.get("/", move |_ctx, _params| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(Reply::Text("home".into()))
    });

    assert_eq!(app.run(&Request::get("/")).status, 500);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_custom_error_template() {
    let dir = temp_files::dir_with(&[("error.html", "<h1>{{ status }}: {{ title }}</h1>")]);
    let mut app = Application::with_config(AppConfig {
        template_dir: Some(dir.path().to_path_buf()),
        error_template: Some("error.html".into()),
        ..AppConfig::default()
    });
    app.get("/", |_ctx, _params| Err(anyhow!("boom")));

    let emitted = app.run(&Request::get("/"));
    assert_eq!(emitted.status, 500);
    assert_eq!(emitted.body_text(), "<h1>500: An error has occurred</h1>");

    assert_eq!(
        app.run(&Request::get("/missing")).body_text(),
        "<h1>404: 404 - Page Not Found</h1>"
    );
}

#[test]
fn test_not_found_template_takes_precedence() {
    let dir = temp_files::dir_with(&[
        ("error.html", "error page"),
        ("404.html", "nothing at {{ message }}"),
    ]);
    let mut app = Application::with_config(AppConfig {
        template_dir: Some(dir.path().to_path_buf()),
        error_template: Some("error.html".into()),
        not_found_template: Some("404.html".into()),
        ..AppConfig::default()
    });
    app.get("/", |_ctx, _params| Err(anyhow!("boom")));

    let body = app.run(&Request::get("/gone")).body_text();
    assert!(body.starts_with("nothing at"), "{body}");
    assert_eq!(app.run(&Request::get("/")).body_text(), "error page");
}

#[test]
fn test_broken_error_template_falls_back_to_builtin_page() {
    let dir = temp_files::dir_with(&[("error.html", "{% if %}")]);
    let mut app = Application::with_config(AppConfig {
        template_dir: Some(dir.path().to_path_buf()),
        error_template: Some("error.html".into()),
        ..AppConfig::default()
    });
    app.get("/", |_ctx, _params| Err(anyhow!("boom")));

    for _ in 0..2 {
        let emitted = app.run(&Request::get("/"));
        assert_eq!(emitted.status, 500);
        assert!(emitted.body_text().contains("<h1>An error has occurred</h1>"));
    }
    assert_eq!(app.config().error_template.as_deref(), Some("error.html"));
}

#[test]
fn test_page_not_found_helper() {
    let mut app = Application::new();
    app.get("/", text("home"));
    app.run(&Request::get("/somewhere"));

    let res = app.page_not_found();
    assert_eq!(res.status_code(), 404);
    assert!(res.body_text().contains("[/somewhere]"));
    assert_eq!(app.requested_path(), Some("/somewhere"));
}

// ---------------------------------------------------------------------------
// Mounts
// ---------------------------------------------------------------------------

#[test]
fn test_mount_registers_routes_once_on_first_matching_request() {
    let loads = counter();
    let seen = Arc::clone(&loads);

    let mut app = Application::new();
    app.get("/", text("home"));
    app.mount("/api", move |app| {
        seen.fetch_add(1, Ordering::SeqCst);
        app.get("/api/users", text("users"));
        Ok(())
    })
    .unwrap();

    assert_eq!(app.run(&Request::get("/")).status, 200);
    assert_eq!(app.run(&Request::get("/apis")).status, 404);
    assert_eq!(loads.load(Ordering::SeqCst), 0);
    assert_eq!(app.routes().len(), 1);

    assert_eq!(app.run(&Request::get("/api/users")).body_text(), "users");
    assert_eq!(app.run(&Request::get("/api/users")).body_text(), "users");
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(app.routes().len(), 2);
}

#[test]
fn test_failing_mount_is_a_server_error() {
    let mut app = Application::new();
    app.mount("/broken", |_app| Err(anyhow!("could not load routes")))
        .unwrap();
    assert_eq!(app.run(&Request::get("/broken/x")).status, 500);
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

#[test]
fn test_request_id_is_propagated() {
    let mut app = Application::new();
    app.get("/", |ctx, _params| Ok(Reply::Text(ctx.request_id().to_string())));

    let id = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    let req = Request::get("/").with_header("X-Request-Id", id);
    assert_eq!(app.run(&req).body_text(), id);

    let minted = app.run(&Request::get("/")).body_text();
    assert_eq!(minted.len(), 26);
    assert_ne!(minted, id);
}

#[test]
fn test_no_cache_headers() {
    let mut app = Application::new();
    app.get("/", |ctx, _params| {
        ctx.no_cache()?;
        Ok(Reply::Text(ctx.escape("<b>")))
    });

    let emitted = app.run(&Request::get("/"));
    assert_eq!(
        emitted.header("Cache-Control"),
        Some("no-cache, no-store, must-revalidate")
    );
    assert_eq!(emitted.body_text(), "&lt;b&gt;");
}
