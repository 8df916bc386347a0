//! Status classification of every verb against a scripted server
//!
//! The server answers with the status code named by the last path segment
//! of the request, e.g. `/code/404`.

mod common;

use common::{MockServer, Reply};
use davnode::dav::{method, DavError, Depth, Name, Property};
use davnode::http::{Root, Scheme};
use std::io::{Read, Write};
use std::sync::Arc;

fn code_of(uri: &str) -> u16 {
    uri.rsplit('/').next().unwrap().parse().unwrap()
}

fn start() -> (MockServer, Arc<Root>) {
    let server = MockServer::start(|request| {
        let code = code_of(&request.uri);
        match code {
            207 if request.uri.contains("/rejected/") => Reply::multistatus(&format!(
                r#"<D:multistatus xmlns:D="DAV:"><D:response><D:href>{}</D:href><D:propstat><D:prop><x:color xmlns:x="urn:test"/></D:prop><D:status>HTTP/1.1 403 Forbidden</D:status></D:propstat></D:response></D:multistatus>"#,
                request.uri
            )),
            207 if request.uri.contains("/accepted/") => Reply::multistatus(&format!(
                r#"<D:multistatus xmlns:D="DAV:"><D:response><D:href>/sibling</D:href><D:propstat><D:prop><x:color xmlns:x="urn:test"/></D:prop><D:status>HTTP/1.1 403 Forbidden</D:status></D:propstat></D:response><D:response><D:href>http://dav.example{}/</D:href><D:propstat><D:prop><x:color xmlns:x="urn:test"/></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response></D:multistatus>"#,
                request.uri
            )),
            207 => Reply::multistatus(&common::property(&request.uri, "getcontentlength", "5")),
            302 => Reply::new(302).header("Location", "http://elsewhere/x"),
            200 => Reply::new(200).body("hello"),
            _ => Reply::new(code).body(format!("status {}", code)),
        }
    });
    let root = Root::builder(Scheme::Http, "127.0.0.1", server.port()).build().unwrap();
    (server, root)
}

#[test]
fn test_get_classification() {
    let (_server, root) = start();

    let mut stream = method::get(&root, "/code/200").unwrap();
    let mut body = String::new();
    stream.read_to_string(&mut body).unwrap();
    stream.close().unwrap();
    assert_eq!(body, "hello");

    match method::get(&root, "/code/302") {
        Err(DavError::MovedTemporarily { location }) => assert_eq!(location, "http://elsewhere/x"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(method::get(&root, "/code/301"), Err(DavError::MovedPermanently { .. })));
    assert!(matches!(method::get(&root, "/code/404"), Err(DavError::NotFound { .. })));
    assert!(matches!(method::get(&root, "/code/410"), Err(DavError::NotFound { .. })));
    assert_eq!(method::get(&root, "/code/500").unwrap_err().status_code(), Some(500));

    assert_eq!(root.allocated(), 0);
}

#[test]
fn test_head_classification() {
    let (_server, root) = start();

    let response = method::head(&root, "/code/200").unwrap();
    assert_eq!(response.status().code(), 200);
    assert!(response.body().is_none());

    let err = method::head(&root, "/code/404").unwrap_err();
    assert!(matches!(err, DavError::Status { .. }));
    assert!(err.is_not_found());
    assert_eq!(root.allocated(), 0);
}

#[test]
fn test_put_classification() {
    let (_server, root) = start();

    for code in [200, 201, 204] {
        let mut stream = method::put(&root, &format!("/code/{}", code), None).unwrap();
        stream.write_all(b"data").unwrap();
        stream.close().unwrap();
    }

    let mut stream = method::put(&root, "/code/500", Some(4)).unwrap();
    stream.write_all(b"data").unwrap();
    let err = stream.close().unwrap_err();
    match &err {
        DavError::Status { line, body, .. } => {
            assert_eq!(line.code(), 500);
            assert_eq!(body.as_deref(), Some(&b"status 500"[..]));
        }
        other => panic!("unexpected {:?}", other),
    }

    // A second close does nothing
    stream.close().unwrap();
    assert_eq!(root.allocated(), 0);
}

#[test]
fn test_put_short_body_is_refused() {
    let (_server, root) = start();

    let mut stream = method::put(&root, "/code/201", Some(10)).unwrap();
    stream.write_all(b"short").unwrap();
    assert!(matches!(stream.close(), Err(DavError::Protocol(_))));
    assert_eq!(root.allocated(), 0);
    assert_eq!(root.pooled(), 0);
}

#[test]
fn test_delete_classification() {
    let (_server, root) = start();

    method::delete(&root, "/code/200").unwrap();
    method::delete(&root, "/code/204").unwrap();
    assert!(matches!(method::delete(&root, "/code/301"), Err(DavError::MovedPermanently { .. })));
    assert!(matches!(method::delete(&root, "/code/404"), Err(DavError::NotFound { .. })));
    assert_eq!(method::delete(&root, "/code/423").unwrap_err().status_code(), Some(423));
    assert_eq!(root.allocated(), 0);
}

#[test]
fn test_mkcol_classification() {
    let (_server, root) = start();

    method::mkcol(&root, "/code/201").unwrap();
    assert_eq!(method::mkcol(&root, "/code/200").unwrap_err().status_code(), Some(200));
    assert_eq!(method::mkcol(&root, "/code/405").unwrap_err().status_code(), Some(405));
}

#[test]
fn test_move_classification() {
    let (server, root) = start();
    let dest = server.url("/target");

    method::move_to(&root, "/code/201", &dest, true).unwrap();
    method::move_to(&root, "/code/204", &dest, false).unwrap();
    assert!(matches!(
        method::move_to(&root, "/code/301", &dest, true),
        Err(DavError::MovedPermanently { .. })
    ));
    assert!(matches!(
        method::move_to(&root, "/code/404", &dest, true),
        Err(DavError::NotFound { .. })
    ));

    let requests = server.requests();
    assert_eq!(requests[0].header("Destination"), Some(dest.as_str()));
    assert_eq!(requests[0].header("Overwrite"), Some("T"));
    assert_eq!(requests[1].header("Overwrite"), Some("F"));
}

#[test]
fn test_propfind_classification() {
    let (server, root) = start();

    let records = method::propfind(&root, "/code/207", Depth::Zero, &[Name::GETCONTENTLENGTH]).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].property().value(), "5");

    for code in [400, 301] {
        let result = method::propfind(&root, &format!("/code/{}", code), Depth::One, &[Name::RESOURCETYPE]);
        assert!(matches!(result, Err(DavError::MovedPermanently { .. })));
    }
    assert!(matches!(
        method::propfind(&root, "/code/404", Depth::Zero, &[Name::RESOURCETYPE]),
        Err(DavError::NotFound { .. })
    ));
    assert_eq!(
        method::propfind(&root, "/code/405", Depth::Zero, &[Name::RESOURCETYPE])
            .unwrap_err()
            .status_code(),
        Some(405)
    );

    let first = &server.requests()[0];
    assert_eq!(first.header("Depth"), Some("0"));
    assert!(first.body_text().contains("getcontentlength"));
    assert_eq!(root.allocated(), 0);
}

#[test]
fn test_proppatch_classification() {
    let (_server, root) = start();
    let color = Property::text(Name::new("urn:test", "color"), "blue");

    method::proppatch(&root, "/code/200", &color).unwrap();
    assert!(matches!(
        method::proppatch(&root, "/code/301", &color),
        Err(DavError::MovedPermanently { .. })
    ));

    // The record for the patched href wins over an earlier failure elsewhere
    method::proppatch(&root, "/accepted/207", &color).unwrap();

    let err = method::proppatch(&root, "/rejected/207", &color).unwrap_err();
    assert_eq!(err.status_code(), Some(403));
    assert_eq!(root.allocated(), 0);
}

#[test]
fn test_connections_are_reused() {
    let (server, root) = start();

    for _ in 0..5 {
        method::delete(&root, "/code/204").unwrap();
        let _ = method::get(&root, "/code/404");
    }
    assert_eq!(server.connections(), 1);
    assert_eq!(root.pooled(), 1);
}
