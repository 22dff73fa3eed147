//! End-to-end coverage of the real route catalog: a request travels
//! through pattern matching, ancestor synthesis, the contents adapter and
//! the dispatcher's timeout/errno handling exactly as a transport would
//! drive it, against an in-memory [`FixtureBrowser`].

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use tabfs_engine::browser::fixture::FixtureBrowser;
use tabfs_engine::browser::{BrowserCapabilities, TabInfo, WindowInfo};
use tabfs_engine::dispatcher::Dispatcher;
use tabfs_engine::protocol::{Op, Request, Response};
use tabfs_engine::routes::{self, CatalogState};

fn req(path: &str, op: Op, fields: Vec<(&str, Value)>) -> Request {
    let mut map = Map::new();
    for (k, v) in fields {
        map.insert(k.to_string(), v);
    }
    Request {
        id: 1,
        op,
        path: path.to_string(),
        fields: map,
    }
}

async fn run(dispatcher: &Dispatcher, request: Request) -> Response {
    let (tx, mut rx) = mpsc::unbounded_channel();
    dispatcher.dispatch(request, move |response| {
        let _ = tx.send(response);
    });
    rx.recv().await.expect("dispatcher must reply")
}

async fn catalog() -> (Arc<CatalogState>, Dispatcher) {
    let browser = Arc::new(FixtureBrowser::new());
    browser.tabs.lock().await.insert(
        1,
        TabInfo {
            id: 1,
            window_id: 10,
            title: "Example Domain".to_string(),
            url: "https://example.com/".to_string(),
        },
    );
    browser.windows.lock().await.insert(
        10,
        WindowInfo {
            id: 10,
            focused: true,
            top: 0,
            left: 0,
            width: 800,
            height: 600,
            state: "normal".to_string(),
        },
    );

    let state = CatalogState::new(browser);
    let routes = routes::build_table(state.clone());
    let dispatcher = Dispatcher::new(routes, Duration::from_secs(5));
    (state, dispatcher)
}

#[tokio::test]
async fn ancestor_directories_are_readable_without_being_declared() {
    let (_state, dispatcher) = catalog().await;

    let response = run(&dispatcher, req("/tabs/by-id/1", Op::Readdir, vec![])).await;
    match response {
        Response::Ok { fields, .. } => {
            let entries = fields["entries"].as_array().unwrap();
            let names: Vec<&str> = entries.iter().map(|v| v.as_str().unwrap()).collect();
            assert!(names.contains(&"url.txt"));
            assert!(names.contains(&"title.txt"));
            assert!(names.contains(&"screenshot.png"));
            assert!(names.contains(&"evals"));
            assert!(names.contains(&"watches"));
        }
        _ => panic!("expected a directory listing"),
    }
}

#[tokio::test]
async fn url_file_round_trips_through_open_write_release_read() {
    let (_state, dispatcher) = catalog().await;

    let open = run(&dispatcher, req("/tabs/by-id/1/url.txt", Op::Open, vec![])).await;
    let fh = match open {
        Response::Ok { fields, .. } => fields["fh"].as_u64().unwrap(),
        _ => panic!("expected a handle"),
    };

    let buf = STANDARD.encode(b"https://rust-lang.org/");
    let write = run(
        &dispatcher,
        req(
            "/tabs/by-id/1/url.txt",
            Op::Write,
            vec![("fh", Value::from(fh)), ("offset", Value::from(0)), ("buf", Value::from(buf))],
        ),
    )
    .await;
    match write {
        Response::Ok { fields, .. } => assert_eq!(fields["size"], 22),
        _ => panic!("expected a written size"),
    }

    run(
        &dispatcher,
        req("/tabs/by-id/1/url.txt", Op::Release, vec![("fh", Value::from(fh))]),
    )
    .await;

    let reopened = run(&dispatcher, req("/tabs/by-id/1/url.txt", Op::Open, vec![])).await;
    let fh2 = match reopened {
        Response::Ok { fields, .. } => fields["fh"].as_u64().unwrap(),
        _ => panic!("expected a handle"),
    };
    let read = run(
        &dispatcher,
        req(
            "/tabs/by-id/1/url.txt",
            Op::Read,
            vec![("fh", Value::from(fh2)), ("offset", Value::from(0)), ("size", Value::from(64))],
        ),
    )
    .await;
    match read {
        Response::Ok { fields, .. } => {
            let bytes = STANDARD.decode(fields["buf"].as_str().unwrap()).unwrap();
            assert_eq!(bytes, b"https://rust-lang.org/");
        }
        _ => panic!("expected data"),
    }
}

#[tokio::test]
async fn by_title_symlink_resolves_to_by_id() {
    let (_state, dispatcher) = catalog().await;

    let listing = run(&dispatcher, req("/tabs/by-title", Op::Readdir, vec![])).await;
    let name = match listing {
        Response::Ok { fields, .. } => {
            let entries = fields["entries"].as_array().unwrap();
            entries
                .iter()
                .map(|v| v.as_str().unwrap().to_string())
                .find(|n| n != "." && n != "..")
                .expect("at least one tab symlink")
        }
        _ => panic!("expected a directory listing"),
    };
    assert_eq!(name, "Example_Domain.1");

    let path = format!("/tabs/by-title/{name}");
    let link = run(&dispatcher, req(&path, Op::Readlink, vec![])).await;
    match link {
        Response::Ok { fields, .. } => assert_eq!(fields["target"], "../by-id/1"),
        _ => panic!("expected a readlink target"),
    }
}

#[tokio::test]
async fn evals_mknod_write_then_read_result() {
    let (_state, dispatcher) = catalog().await;

    run(
        &dispatcher,
        req("/tabs/by-id/1/evals/e1", Op::Mknod, vec![]),
    )
    .await;

    let code = STANDARD.encode(b"1 + 1");
    run(
        &dispatcher,
        req(
            "/tabs/by-id/1/evals/e1",
            Op::Write,
            vec![("fh", Value::from(1u64)), ("offset", Value::from(0)), ("buf", Value::from(code))],
        ),
    )
    .await;

    let result = run(&dispatcher, req("/tabs/by-id/1/evals/e1.result", Op::Read, vec![])).await;
    match result {
        Response::Ok { fields, .. } => assert_eq!(fields["buf"], STANDARD.encode(b"null")),
        _ => panic!("expected a result read"),
    }

    let listing = run(&dispatcher, req("/tabs/by-id/1/evals", Op::Readdir, vec![])).await;
    match listing {
        Response::Ok { fields, .. } => {
            let entries = fields["entries"].as_array().unwrap();
            let names: Vec<&str> = entries.iter().map(|v| v.as_str().unwrap()).collect();
            assert!(names.contains(&"e1"));
            assert!(names.contains(&"e1.result"));
            assert!(!names.iter().any(|n| n.contains("FILENAME")));
        }
        _ => panic!("expected a directory listing"),
    }
}

#[tokio::test]
async fn watches_and_inputs_directories_list_real_entries_not_the_wildcard_pattern() {
    let (state, dispatcher) = catalog().await;

    let watches = run(&dispatcher, req("/tabs/by-id/1/watches", Op::Readdir, vec![])).await;
    match watches {
        Response::Ok { fields, .. } => {
            let entries = fields["entries"].as_array().unwrap();
            assert_eq!(entries, &vec![Value::from("."), Value::from("..")]);
        }
        _ => panic!("expected a directory listing"),
    }

    state.browser.set_input_value(1, "q", "hello").await.unwrap();
    let inputs = run(&dispatcher, req("/tabs/by-id/1/inputs", Op::Readdir, vec![])).await;
    match inputs {
        Response::Ok { fields, .. } => {
            let entries = fields["entries"].as_array().unwrap();
            let names: Vec<&str> = entries.iter().map(|v| v.as_str().unwrap()).collect();
            assert!(names.contains(&"q.txt"));
            assert!(!names.iter().any(|n| n.contains("FILENAME")));
        }
        _ => panic!("expected a directory listing"),
    }
}

#[tokio::test]
async fn background_js_release_persists_and_evaluates_source() {
    let (state, dispatcher) = catalog().await;

    let open = run(&dispatcher, req("/runtime/background.js", Op::Open, vec![])).await;
    let fh = match open {
        Response::Ok { fields, .. } => fields["fh"].as_u64().unwrap(),
        _ => panic!("expected a handle"),
    };

    let buf = STANDARD.encode(b"console.log('hi')");
    run(
        &dispatcher,
        req(
            "/runtime/background.js",
            Op::Write,
            vec![("fh", Value::from(fh)), ("offset", Value::from(0)), ("buf", Value::from(buf))],
        ),
    )
    .await;
    run(
        &dispatcher,
        req("/runtime/background.js", Op::Release, vec![("fh", Value::from(fh))]),
    )
    .await;

    assert_eq!(
        state.background_source.lock().await.as_deref(),
        Some("console.log('hi')")
    );
}

#[tokio::test]
async fn window_scalar_files_round_trip() {
    let (state, dispatcher) = catalog().await;

    let open = run(&dispatcher, req("/windows/by-id/10/width.txt", Op::Open, vec![])).await;
    let fh = match open {
        Response::Ok { fields, .. } => fields["fh"].as_u64().unwrap(),
        _ => panic!("expected a handle"),
    };
    let buf = STANDARD.encode(b"1024");
    run(
        &dispatcher,
        req(
            "/windows/by-id/10/width.txt",
            Op::Write,
            vec![("fh", Value::from(fh)), ("offset", Value::from(0)), ("buf", Value::from(buf))],
        ),
    )
    .await;
    run(
        &dispatcher,
        req("/windows/by-id/10/width.txt", Op::Release, vec![("fh", Value::from(fh))]),
    )
    .await;

    let window = state.browser.get_window(10).await.unwrap();
    assert_eq!(window.width, 1024);
}

#[tokio::test]
async fn appledouble_companion_path_is_rejected() {
    let (_state, dispatcher) = catalog().await;
    let response = run(&dispatcher, req("/tabs/by-id/1/._url.txt", Op::Getattr, vec![])).await;
    match response {
        Response::Err { errno, .. } => assert_eq!(errno, 45),
        _ => panic!("expected an error"),
    }
}

#[tokio::test]
async fn unknown_tab_id_reports_enoent() {
    let (_state, dispatcher) = catalog().await;
    let response = run(&dispatcher, req("/tabs/by-id/999/url.txt", Op::Open, vec![])).await;
    match response {
        Response::Err { errno, .. } => assert_eq!(errno, libc::ENOENT),
        _ => panic!("expected an error"),
    }
}

#[tokio::test]
async fn routes_txt_lists_a_declared_pattern() {
    let (_state, dispatcher) = catalog().await;
    let open = run(&dispatcher, req("/runtime/routes.txt", Op::Open, vec![])).await;
    let fh = match open {
        Response::Ok { fields, .. } => fields["fh"].as_u64().unwrap(),
        _ => panic!("expected a handle"),
    };
    let read = run(
        &dispatcher,
        req(
            "/runtime/routes.txt",
            Op::Read,
            vec![("fh", Value::from(fh)), ("offset", Value::from(0)), ("size", Value::from(4096))],
        ),
    )
    .await;
    match read {
        Response::Ok { fields, .. } => {
            let bytes = STANDARD.decode(fields["buf"].as_str().unwrap()).unwrap();
            let text = String::from_utf8(bytes).unwrap();
            assert!(text.contains("/tabs/by-id/#TAB_ID/url.txt"));
        }
        _ => panic!("expected data"),
    }
}
