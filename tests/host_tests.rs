mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use common::fixture::DocRoot;
use common::http::{get, header, parse_parts, send_raw, send_request};
use common::test_server::setup_may_runtime;
use meteor_host::{BackgroundHost, HostController, HostError, MainContext};
use serde_json::Value;

fn start(doc: &DocRoot) -> (HostController, std::net::SocketAddr) {
    setup_may_runtime();
    let mut host = HostController::new(doc.config());
    let addr = host.start().unwrap();
    (host, addr)
}

#[test]
fn test_root_serves_index() {
    let doc = DocRoot::new();
    let (mut host, addr) = start(&doc);
    let resp = get(&addr, "/");
    host.stop();
    let (status, ct, body) = parse_parts(&resp);
    assert_eq!(status, 200);
    assert_eq!(ct, "text/html");
    assert_eq!(body, "<h1>meteor</h1>");
    assert_eq!(header(&resp, "access-control-allow-origin"), Some("*"));
    assert_eq!(header(&resp, "content-length"), Some("15"));
}

#[test]
fn test_mime_types() {
    let doc = DocRoot::new();
    let (mut host, addr) = start(&doc);
    let cases = [
        ("/index.html", "text/html"),
        ("/app.js", "application/javascript"),
        ("/style.css", "text/css"),
        ("/x.png", "image/png"),
        ("/covers/b.jpg", "image/jpeg"),
        ("/x.unknownext", "application/octet-stream"),
    ];
    for (path, expected) in cases {
        let (status, ct, _) = parse_parts(&get(&addr, path));
        assert_eq!(status, 200, "{path}");
        assert_eq!(ct, expected, "{path}");
    }
    host.stop();
}

#[test]
fn test_binary_body_intact() {
    let doc = DocRoot::new();
    let (mut host, addr) = start(&doc);
    let raw = send_raw(&addr, b"GET /x.png HTTP/1.1\r\n\r\n");
    host.stop();
    assert!(raw.ends_with(&[0x89, b'P', b'N', b'G']));
}

#[test]
fn test_traversal_blocked() {
    let doc = DocRoot::new();
    let (mut host, addr) = start(&doc);
    for path in ["/../secret.txt", "/../../etc/passwd", "/%2e%2e/secret.txt", "/covers/../../secret.txt"] {
        let resp = get(&addr, path);
        let (status, _, body) = parse_parts(&resp);
        assert_eq!(status, 404, "{path}");
        assert!(body.is_empty());
        assert!(!resp.contains("top secret"));
    }
    host.stop();
}

#[test]
fn test_missing_file_404() {
    let doc = DocRoot::new();
    let (mut host, addr) = start(&doc);
    let resp = get(&addr, "/nope.html");
    host.stop();
    let (status, _, body) = parse_parts(&resp);
    assert_eq!(status, 404);
    assert_eq!(header(&resp, "content-length"), Some("0"));
    assert!(body.is_empty());
}

#[test]
fn test_query_and_percent_decoding() {
    let doc = DocRoot::new();
    let (mut host, addr) = start(&doc);
    let (status, ct, _) = parse_parts(&get(&addr, "/api/covers?x=1"));
    assert_eq!(status, 200);
    assert_eq!(ct, "application/json");
    let (status, _, body) = parse_parts(&get(&addr, "/my%20file.html?v=2#top"));
    assert_eq!(status, 200);
    assert_eq!(body, "spaced");
    host.stop();
}

#[test]
fn test_covers_listing() {
    let doc = DocRoot::new();
    let (mut host, addr) = start(&doc);
    let (_, _, body) = parse_parts(&get(&addr, "/api/covers"));
    host.stop();
    let list: Vec<String> = serde_json::from_str(&body).unwrap();
    let got: HashSet<_> = list.into_iter().collect();
    let want: HashSet<_> = ["covers/a.png", "covers/b.jpg"].iter().map(|s| s.to_string()).collect();
    assert_eq!(got, want);
}

#[test]
fn test_covers_without_directory() {
    setup_may_runtime();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "x").unwrap();
    let config = meteor_host::HostConfig::new()
        .with_bind_ip([127, 0, 0, 1].into())
        .with_port(0)
        .with_document_root(dir.path());
    let mut host = HostController::new(config);
    let addr = host.start().unwrap();
    let (status, _, body) = parse_parts(&get(&addr, "/api/covers"));
    host.stop();
    assert_eq!(status, 200);
    assert_eq!(body, "[]");
}

#[test]
fn test_server_info_fields() {
    let doc = DocRoot::new();
    let (mut host, addr) = start(&doc);
    let (status, _, body) = parse_parts(&get(&addr, "/api/server_info"));
    host.stop();
    assert_eq!(status, 200);
    let info: Value = serde_json::from_str(&body).unwrap();
    for key in ["version", "machine", "description", "owner", "url"] {
        assert!(info[key].is_string(), "{key}");
    }
    assert_eq!(info["description"], "A web server for Meteor");
}

#[test]
fn test_non_get_gets_no_response() {
    let doc = DocRoot::new();
    let (mut host, addr) = start(&doc);
    for req in [
        "POST /api/covers HTTP/1.1\r\nContent-Length: 0\r\n\r\n",
        "DELETE /index.html HTTP/1.1\r\n\r\n",
        "garbage\r\n\r\n",
    ] {
        let resp = send_raw(&addr, req.as_bytes());
        assert!(resp.is_empty(), "{req:?}");
    }
    // still serving afterwards
    let (status, _, _) = parse_parts(&get(&addr, "/index.html"));
    assert_eq!(status, 200);
    host.stop();
}

#[test]
fn test_split_request_and_eof_after_request_line() {
    use std::io::{Read, Write};
    use std::net::{Shutdown, TcpStream};

    let doc = DocRoot::new();
    let (mut host, addr) = start(&doc);

    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(b"GET /inde").unwrap();
    thread::sleep(Duration::from_millis(20));
    stream.write_all(b"x.html HTTP/1.1\r\nHost: x\r\n").unwrap();
    thread::sleep(Duration::from_millis(20));
    stream.write_all(b"\r\n").unwrap();
    let mut buf = String::new();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream.read_to_string(&mut buf).unwrap();
    assert_eq!(parse_parts(&buf).0, 200);

    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(b"GET /style.css HTTP/1.1\r\n").unwrap();
    stream.shutdown(Shutdown::Write).unwrap();
    let mut buf = String::new();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream.read_to_string(&mut buf).unwrap();
    let (status, ct, _) = parse_parts(&buf);
    assert_eq!(status, 200);
    assert_eq!(ct, "text/css");

    host.stop();
}

#[test]
fn test_every_response_closes() {
    let doc = DocRoot::new();
    let (mut host, addr) = start(&doc);
    // send_request reads until the server closes the socket
    let resp = send_request(&addr, "GET /app.js HTTP/1.1\r\nConnection: keep-alive\r\n\r\n");
    host.stop();
    assert_eq!(resp.matches("HTTP/1.1 ").count(), 1);
    assert_eq!(header(&resp, "connection"), Some("close"));
    assert!(resp.ends_with("console.log(1)"));
}

#[test]
fn test_stop_is_idempotent() {
    let doc = DocRoot::new();
    let (mut host, _) = start(&doc);
    assert!(host.is_running());
    host.stop();
    assert!(!host.is_running());
    host.stop();
    host.stop();
    assert!(!host.is_running());
    assert_eq!(host.local_addr(), None);
}

#[test]
fn test_restart_after_stop() {
    let doc = DocRoot::new();
    let (mut host, _) = start(&doc);
    host.stop();
    let addr = host.start().unwrap();
    assert_eq!(parse_parts(&get(&addr, "/")).0, 200);
    host.stop();
}

#[test]
fn test_second_start_keeps_first() {
    let doc = DocRoot::new();
    let (mut host, addr) = start(&doc);
    match host.start() {
        Err(HostError::AlreadyRunning { port }) => assert_eq!(port, addr.port()),
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }
    assert_eq!(host.local_addr(), Some(addr));
    assert_eq!(parse_parts(&get(&addr, "/")).0, 200);
    host.stop();
}

#[test]
fn test_second_host_on_same_port_fails_to_bind() {
    let doc = DocRoot::new();
    let (mut first, addr) = start(&doc);
    let mut second = HostController::new(doc.config().with_port(addr.port()));
    let err = second.start().unwrap_err();
    assert!(matches!(err, HostError::Bind { .. }), "{err:?}");
    assert!(err.is_port_in_use());
    assert!(!second.is_running());
    assert_eq!(parse_parts(&get(&addr, "/")).0, 200);
    first.stop();
}

#[test]
fn test_drop_stops_foreground_host() {
    let doc = DocRoot::new();
    let (host, addr) = start(&doc);
    drop(host);
    // the port is free again
    let mut again = HostController::new(doc.config().with_port(addr.port()));
    again.start().unwrap();
    again.stop();
}

#[test]
fn test_setup_callback_runs_on_main_context() {
    let doc = DocRoot::new();
    setup_may_runtime();
    let ctx = MainContext::new();
    let count = Arc::new(AtomicUsize::new(0));
    let ran_on = Arc::new(Mutex::new(None));

    let mut host = HostController::new(doc.config());
    let (c, r) = (Arc::clone(&count), Arc::clone(&ran_on));
    host.set_setup_complete_callback(
        ctx.handle(),
        Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            *r.lock().unwrap() = Some(thread::current().id());
        }),
    );
    let addr = host.start().unwrap();

    let (status, ct, body) = parse_parts(&get(&addr, "/api/setup_complete"));
    assert_eq!(status, 200);
    assert_eq!(ct, "application/json");
    assert_eq!(body, r#"{"status":"ok"}"#);

    ctx.run_for(Duration::from_millis(200));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(*ran_on.lock().unwrap(), Some(ctx.owner()));
    assert_eq!(ctx.owner(), thread::current().id());
    host.stop();
}

#[test]
fn test_panicking_callback_does_not_kill_host() {
    let doc = DocRoot::new();
    setup_may_runtime();
    let ctx = MainContext::new();
    let mut host = HostController::new(doc.config());
    host.set_setup_complete_callback(ctx.handle(), Arc::new(|| panic!("bad callback")));
    let addr = host.start().unwrap();
    assert_eq!(parse_parts(&get(&addr, "/api/setup_complete")).0, 200);
    ctx.run_for(Duration::from_millis(100));
    assert_eq!(parse_parts(&get(&addr, "/")).0, 200);
    host.stop();
}

#[test]
fn test_background_host_survives_dropped_handles() {
    let doc = DocRoot::new();
    setup_may_runtime();
    let host = BackgroundHost::new();
    let window = host.clone();
    let addr = window.start(&doc.config(), None).unwrap();
    drop(window);

    assert!(host.is_running());
    assert_eq!(parse_parts(&get(&addr, "/")).0, 200);

    let err = host.start(&doc.config(), None).unwrap_err();
    assert!(matches!(err, HostError::AlreadyRunning { .. }));
    assert_eq!(parse_parts(&get(&addr, "/")).0, 200);

    host.stop();
    assert!(!host.is_running());
    host.stop();
}

#[test]
fn test_background_host_bind_failure_leaves_nothing() {
    let doc = DocRoot::new();
    let (mut first, addr) = start(&doc);
    let bg = BackgroundHost::new();
    let err = bg.start(&doc.config().with_port(addr.port()), None).unwrap_err();
    assert!(matches!(err, HostError::Bind { .. }));
    assert!(!bg.is_running());
    first.stop();
}

#[test]
fn test_index_outside_root_served_at_root_only() {
    let doc = DocRoot::new();
    setup_may_runtime();
    let outside = doc.dir.path().join("landing.html");
    std::fs::write(&outside, "<p>landing</p>").unwrap();
    let mut host = HostController::new(doc.config().with_index_file(outside.clone()));
    let addr = host.start().unwrap();

    let (status, ct, body) = parse_parts(&get(&addr, "/"));
    assert_eq!(status, 200);
    assert_eq!(ct, "text/html");
    assert_eq!(body, "<p>landing</p>");
    for path in ["/../landing.html", "/../secret.txt", "/%2e%2e/secret.txt"] {
        let resp = get(&addr, path);
        assert_eq!(parse_parts(&resp).0, 404, "{path}");
        assert!(!resp.contains("top secret"));
    }
    // the document root is unchanged
    assert_eq!(parse_parts(&get(&addr, "/app.js")).0, 200);
    host.stop();
}

#[test]
fn test_idle_connection_closed_by_server() {
    use std::io::{ErrorKind, Read};
    use std::net::TcpStream;
    use std::time::Instant;

    let doc = DocRoot::new();
    setup_may_runtime();
    let mut host = HostController::new(doc.config().with_idle_timeout(Duration::from_millis(300)));
    let addr = host.start().unwrap();

    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    let started = Instant::now();
    let mut buf = [0u8; 64];
    match stream.read(&mut buf) {
        Ok(n) => assert_eq!(n, 0),
        Err(e) => assert_eq!(e.kind(), ErrorKind::ConnectionReset, "{e:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());

    // other clients are unaffected
    assert_eq!(parse_parts(&get(&addr, "/")).0, 200);
    host.stop();
}

#[test]
fn test_page_aliases_and_accounts_list() {
    let doc = DocRoot::new();
    std::fs::create_dir_all(doc.root.join("main")).unwrap();
    std::fs::write(doc.root.join("main/skeleton.html"), "skeleton").unwrap();
    std::fs::write(doc.root.join("main/videos.html"), "videos").unwrap();
    let (mut host, addr) = start(&doc);

    for (path, want) in [("/main", "skeleton"), ("/videos?x=1", "videos")] {
        let (status, ct, body) = parse_parts(&get(&addr, path));
        assert_eq!(status, 200, "{path}");
        assert_eq!(ct, "text/html", "{path}");
        assert_eq!(body, want);
    }
    // alias target missing
    assert_eq!(parse_parts(&get(&addr, "/music")).0, 404);

    let (status, ct, body) = parse_parts(&get(&addr, "/api/accounts/list"));
    assert_eq!(status, 200);
    assert_eq!(ct, "application/json");
    assert_eq!(body, r#"{"status":"ok"}"#);
    host.stop();
}
