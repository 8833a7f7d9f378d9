/*!
 * End-to-end tests for archive-audit against a local mock lookup service
 */

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tempfile::tempdir;
use url::Url;

use crate::auditor::Auditor;
use crate::config::EndpointConfig;
use crate::error::AuditError;
use crate::export::{ExportSink, JsonSink, TabularSink};
use crate::lookup::{Lookup, LookupClient};
use crate::progress::{AuditEvent, Silent};
use crate::types::{LookupOutcome, LookupStatus};
use crate::walker::{TransientFilter, Walker};

/// Request as seen by the mock server
#[derive(Debug, Clone)]
struct SeenRequest {
    request_line: String,
    headers: String,
    body: String,
    file_name: String,
}

/// Minimal HTTP/1.1 server answering one request per connection
struct MockServer {
    url: Url,
    requests: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockServer {
    fn start<F>(respond: F) -> Self
    where
        F: Fn(usize, &str) -> (u16, String) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
        let port = listener.local_addr().unwrap().port();
        let url = Url::parse(&format!("http://127.0.0.1:{}/api/archived_or_not", port)).unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let _ = handle_connection(stream, &seen, &respond);
            }
        });

        Self { url, requests }
    }

    fn endpoint(&self) -> EndpointConfig {
        EndpointConfig {
            timeout: Duration::from_secs(10),
            ..EndpointConfig::new(self.url.clone())
        }
    }

    fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().unwrap().clone()
    }
}

// The request is logged before the response goes out, so a client that has
// its answer can always see its own request in the log.
fn handle_connection<F>(
    mut stream: TcpStream,
    seen: &Mutex<Vec<SeenRequest>>,
    respond: &F,
) -> io::Result<()>
where
    F: Fn(usize, &str) -> (u16, String),
{
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let mut headers = String::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        if line == "\r\n" || line.is_empty() {
            break;
        }
        if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap_or(0);
        }
        headers.push_str(&line);
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    let body = String::from_utf8_lossy(&body).to_string();

    let file_name = body
        .split("filename=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap_or_default()
        .to_string();

    let (status, payload) = {
        let mut seen = seen.lock().unwrap();
        let answer = respond(seen.len(), &file_name);
        seen.push(SeenRequest {
            request_line,
            headers,
            body,
            file_name,
        });
        answer
    };

    write!(
        stream,
        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        payload.len(),
        payload
    )?;
    stream.flush()
}

// Helper function to create files with known content
fn setup_files(names: &[(&str, &str)]) -> io::Result<tempfile::TempDir> {
    let temp_dir = tempdir()?;
    for (name, content) in names {
        let path = temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        write!(file, "{}", content)?;
    }
    Ok(temp_dir)
}

fn absolute(walker: &Walker, name: &str) -> String {
    walker.root().join(name).to_string_lossy().to_string()
}

#[test]
fn test_found_and_missing_scenario() -> io::Result<()> {
    let temp_dir = setup_files(&[("a.txt", "alpha"), ("b.txt", "bravo")])?;
    let server = MockServer::start(|_, file_name| match file_name {
        "a.txt" => (404, String::new()),
        _ => (200, r#"["x/a.txt"]"#.to_string()),
    });

    let walker = Walker::new(temp_dir.path(), false, TransientFilter::default())?;
    let a = absolute(&walker, "a.txt");
    let b = absolute(&walker, "b.txt");
    let client = LookupClient::new(&server.endpoint())?;
    let outcome = Auditor::new(walker, client, false).run(&Silent);

    assert!(outcome.is_complete());
    let result = &outcome.result;
    assert_eq!(result.len(), 2);

    let record_a = result.get(&a).unwrap();
    assert_eq!(record_a.status(), LookupStatus::NotFound);
    assert!(record_a.locations().is_empty());
    assert_eq!(record_a.relative_path(), "a.txt");

    let record_b = result.get(&b).unwrap();
    assert_eq!(record_b.status(), LookupStatus::Found);
    assert_eq!(record_b.locations(), ["x/a.txt"]);

    let mut buffer = Vec::new();
    JsonSink.write_to(result, &mut buffer)?;
    let parsed: serde_json::Value = serde_json::from_slice(&buffer)?;
    let mut expected = serde_json::Map::new();
    expected.insert(a, serde_json::json!("None"));
    expected.insert(b, serde_json::json!(["x/a.txt"]));
    assert_eq!(parsed, serde_json::Value::Object(expected));

    Ok(())
}

#[test]
fn test_server_error_aborts_and_keeps_partial_result() -> io::Result<()> {
    let temp_dir = setup_files(&[("one.txt", "1"), ("two.txt", "2"), ("three.txt", "3")])?;
    let server = MockServer::start(|index, _| match index {
        1 => (500, "database offline".to_string()),
        _ => (404, String::new()),
    });

    let walker = Walker::new(temp_dir.path(), false, TransientFilter::default())?;
    let client = LookupClient::new(&server.endpoint())?;
    let outcome = Auditor::new(walker, client, false).run(&Silent);

    match &outcome.error {
        Some(AuditError::Request { status, body }) => {
            assert_eq!(*status, 500);
            assert_eq!(body, "database offline");
        }
        other => panic!("expected request error, got {other:?}"),
    }
    assert!(!outcome.cancelled);
    assert_eq!(server.requests().len(), 2);

    // Only the first file was resolved, and it matches the first request
    assert_eq!(outcome.result.len(), 1);
    let first = &outcome.result.records()[0];
    assert_eq!(
        Path::new(first.source_path()).file_name().unwrap().to_string_lossy(),
        server.requests()[0].file_name
    );

    // The partial result is still exportable
    let export_dir = tempdir()?;
    let path = TabularSink.export(&outcome.result, Some(export_dir.path()), "partial")?;
    let text = fs::read_to_string(path)?;
    assert!(text.contains(first.source_path()));
    assert!(text.contains("None"));

    Ok(())
}

#[test]
fn test_request_shape_and_credentials() -> io::Result<()> {
    let temp_dir = setup_files(&[("plans.dwg", "drawing bytes")])?;
    let server = MockServer::start(|_, _| (404, String::new()));

    let endpoint = EndpointConfig {
        query: vec![("user".to_string(), "auditor".to_string())],
        headers: vec![("X-Api-Key".to_string(), "k-123".to_string())],
        ..server.endpoint()
    };
    let client = LookupClient::new(&endpoint)?;
    let outcome = client.lookup(&temp_dir.path().join("plans.dwg"))?;
    assert_eq!(outcome, LookupOutcome::NotFound);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request
        .request_line
        .starts_with("POST /api/archived_or_not?user=auditor "));
    assert!(request.headers.to_ascii_lowercase().contains("x-api-key: k-123"));
    assert!(request
        .headers
        .to_ascii_lowercase()
        .contains("content-type: multipart/form-data"));
    assert!(request.body.contains("name=\"file\""));
    assert!(request.body.contains("drawing bytes"));
    assert_eq!(request.file_name, "plans.dwg");

    Ok(())
}

#[test]
fn test_only_missing_end_to_end() -> io::Result<()> {
    let temp_dir = setup_files(&[
        ("kept.txt", "k"),
        ("archived.txt", "a"),
        ("nested/also-archived.txt", "n"),
        ("nested/also-kept.txt", "m"),
    ])?;
    let server = MockServer::start(|_, file_name| {
        if file_name.contains("archived") {
            (200, format!(r#"["records/{}"]"#, file_name))
        } else {
            (404, String::new())
        }
    });

    let walker = Walker::new(temp_dir.path(), true, TransientFilter::default())?;
    let client = LookupClient::new(&server.endpoint())?;

    let progress = RefCell::new(Vec::new());
    let outcome = Auditor::new(walker, client, true).run(&|event: &AuditEvent<'_>| {
        if let AuditEvent::Progress { current, total } = event {
            progress.borrow_mut().push((*current, *total));
        }
    });

    assert!(outcome.is_complete());
    assert_eq!(server.requests().len(), 4);
    assert_eq!(outcome.result.len(), 2);
    assert_eq!(outcome.result.found_count(), 0);
    assert_eq!(progress.into_inner().last(), Some(&(4, 4)));

    Ok(())
}

#[test]
fn test_unreachable_service_is_fatal() -> io::Result<()> {
    let temp_dir = setup_files(&[("a.txt", "a"), ("b.txt", "b")])?;

    // Grab a free port and close it again so nothing is listening
    let port = TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
    let endpoint = EndpointConfig {
        timeout: Duration::from_secs(5),
        ..EndpointConfig::new(Url::parse(&format!("http://127.0.0.1:{}/lookup", port)).unwrap())
    };

    let walker = Walker::new(temp_dir.path(), false, TransientFilter::default())?;
    let client = LookupClient::new(&endpoint)?;
    let outcome = Auditor::new(walker, client, false).run(&Silent);

    let error = outcome.error.expect("transport error");
    assert!(matches!(error, AuditError::Transport(_)));
    assert!(error.is_fatal());
    assert!(outcome.result.is_empty());

    Ok(())
}

#[test]
fn test_missing_file_is_a_local_error() -> io::Result<()> {
    let server = MockServer::start(|_, _| (404, String::new()));
    let client = LookupClient::new(&server.endpoint())?;

    let missing = PathBuf::from("/definitely/not/here.txt");
    match client.lookup(&missing) {
        Err(error @ AuditError::Filesystem { .. }) => assert!(!error.is_fatal()),
        other => panic!("expected filesystem error, got {other:?}"),
    }
    assert!(server.requests().is_empty());

    Ok(())
}

#[test]
fn test_json_export_round_trip_keeps_order() -> io::Result<()> {
    let temp_dir = setup_files(&[("c.txt", "c"), ("a.txt", "a"), ("b.txt", "b")])?;
    let server = MockServer::start(|_, file_name| (200, format!(r#"["z/{0}","a/{0}"]"#, file_name)));

    let walker = Walker::new(temp_dir.path(), false, TransientFilter::default())?;
    let client = LookupClient::new(&server.endpoint())?;
    let outcome = Auditor::new(walker, client, false).run(&Silent);

    let export_dir = tempdir()?;
    let path = JsonSink.export(&outcome.result, Some(export_dir.path()), "archived_or_not_results")?;
    let text = fs::read_to_string(&path)?;

    // Keys appear in processing order
    let positions: Vec<usize> = outcome
        .result
        .records()
        .iter()
        .map(|r| text.find(&format!("\"{}\"", r.source_path().replace('\\', "\\\\"))).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    // Locations stay in server order
    let parsed: serde_json::Value = serde_json::from_str(&text)?;
    for record in outcome.result.records() {
        let name = Path::new(record.source_path()).file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(
            parsed[record.source_path()],
            serde_json::json!([format!("z/{}", name), format!("a/{}", name)])
        );
    }

    Ok(())
}
