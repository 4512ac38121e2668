//! Integration tests which talk to a tiny local HTTP server.

use fcm_client::{
    AlgorithmVariant, Client, ClientOptions, ErrorKind, Field, Session, SubmissionState,
};
use serde_json::{json, Value};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// A canned HTTP response.
struct Reply {
    status: &'static str,
    body: String,
    /// Wait this long before answering.
    delay: Option<Duration>,
}

impl Reply {
    fn json(status: &'static str, body: Value) -> Reply {
        Reply {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    fn text(status: &'static str, body: &str) -> Reply {
        Reply {
            status,
            body: body.to_owned(),
            delay: None,
        }
    }
}

/// Serve exactly one request with `reply`. Returns the endpoint URL and a
/// receiver for the JSON body the client sent.
async fn serve_once(reply: Reply) -> (String, oneshot::Receiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let body_start;
        let content_length;
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers were read");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                body_start = pos + 4;
                let headers = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                content_length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .map(|len| len.trim().parse::<usize>().unwrap())
                    .unwrap_or(0);
                break;
            }
        }
        while buf.len() < body_start + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before body was read");
            buf.extend_from_slice(&chunk[..n]);
        }
        let sent: Value =
            serde_json::from_slice(&buf[body_start..body_start + content_length])
                .unwrap();
        let _ = tx.send(sent);

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        let mut response = Vec::new();
        write!(
            &mut response,
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            reply.status,
            reply.body.len(),
            reply.body,
        )
        .unwrap();
        // The client may have given up already.
        let _ = socket.write_all(&response).await;
        let _ = socket.shutdown().await;
    });
    (format!("http://{}/run_fcm", addr), rx)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn sample_result() -> Value {
    json!({
        "centers": [[1.0, 2.5], [8.5, 9.0]],
        "updated_u": [[0.95, 0.9, 0.05, 0.1], [0.05, 0.1, 0.95, 0.9]],
        "data_point_cluster_map": {"0": 0, "1": 0, "2": 1, "3": 1},
    })
}

#[tokio::test]
async fn submits_entropy_regularized_request() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (endpoint, sent) = serve_once(Reply::json("200 OK", sample_result())).await;
    let client = Client::new(&endpoint).unwrap();

    let mut session = Session::new();
    let input = session.collector_mut();
    input.set_dataset_text("1,2\n1,3\n8,9\n9,9\n");
    input.set_variant(AlgorithmVariant::EntropyRegularized);
    input.set_field(Field::Alpha, "0.5").unwrap();
    input.set_field(Field::Beta, "1.0").unwrap();
    input.set_supervised_membership_text("[[0.1,0.9]]");

    let result = session.submit(&client).await.unwrap();
    assert_eq!(result.summary().unwrap().cluster_sizes(), vec![2, 2]);
    assert_eq!(session.state(), &SubmissionState::Succeeded);

    assert_eq!(
        sent.await.unwrap(),
        json!({
            "data": "1,2\n1,3\n8,9\n9,9\n",
            "fcm_type": "Entropy Regularized FCM",
            "clusters": 2,
            "m": 2.0,
            "eps": 0.01,
            "lmax": 50,
            "alpha": 0.5,
            "beta": 1.0,
            "u_supervised": [[0.1, 0.9]],
        })
    );
}

#[tokio::test]
async fn server_error_carries_message() {
    let (endpoint, _sent) = serve_once(Reply::json(
        "400 Bad Request",
        json!({"message": "data must be numeric"}),
    ))
    .await;
    let client = Client::new(&endpoint).unwrap();

    let mut session = Session::new();
    session.collector_mut().set_dataset_text("a,b\n");
    let err = session.submit(&client).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert!(err.to_string().contains("data must be numeric"));
    match session.state() {
        SubmissionState::Failed(report) => {
            assert_eq!(report.kind, ErrorKind::Server);
            assert!(report.message.contains("data must be numeric"));
        }
        other => panic!("unexpected state {:?}", other),
    }
    assert!(session.presenter().current().is_none());
}

#[tokio::test]
async fn malformed_success_body_is_a_server_error() {
    let (endpoint, _sent) =
        serve_once(Reply::text("200 OK", "<html>not json</html>")).await;
    let client = Client::new(&endpoint).unwrap();

    let mut session = Session::new();
    session.collector_mut().set_dataset_text("1,2\n");
    let err = session.submit(&client).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    // Grab a free port, then close it again so nothing is listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Client::new(&format!("http://{}/run_fcm", addr)).unwrap();
    let mut session = Session::new();
    session.collector_mut().set_dataset_text("1,2\n");
    let err = session.submit(&client).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(err.might_be_temporary());
}

#[tokio::test]
async fn timeout_is_a_network_error() {
    let (endpoint, _sent) = serve_once(Reply {
        delay: Some(Duration::from_secs(5)),
        ..Reply::json("200 OK", sample_result())
    })
    .await;
    let options = ClientOptions::default().timeout(Duration::from_millis(200));
    let client = Client::with_options(&endpoint, &options).unwrap();

    let mut session = Session::new();
    session.collector_mut().set_dataset_text("1,2\n");
    let err = session.submit(&client).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn select_file_loads_dataset() {
    let dir = std::env::temp_dir().join(format!("fcm_client_test_{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join("data.csv");
    tokio::fs::write(&path, "1,2\n3,4\n").await.unwrap();

    let mut session = Session::new();
    session.select_file(&path).await.unwrap();
    assert_eq!(session.collector().parameters().dataset_text, "1,2\n3,4\n");
    assert_eq!(session.collector().dataset_path(), Some(path.as_path()));
    assert_eq!(session.state(), &SubmissionState::Idle);

    let err = session
        .select_file(dir.join("missing.csv"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileRead);
    assert_eq!(session.collector().parameters().dataset_text, "1,2\n3,4\n");
    match session.state() {
        SubmissionState::Failed(report) => assert_eq!(report.kind, ErrorKind::FileRead),
        other => panic!("unexpected state {:?}", other),
    }

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn abandoned_submit_does_not_leave_session_busy() {
    let (endpoint, _sent) = serve_once(Reply {
        delay: Some(Duration::from_secs(5)),
        ..Reply::json("200 OK", sample_result())
    })
    .await;
    let client = Client::new(&endpoint).unwrap();

    let mut session = Session::new();
    session.collector_mut().set_dataset_text("1,2\n");
    let outcome = tokio::time::timeout(Duration::from_millis(200), session.submit(&client)).await;
    assert!(outcome.is_err());
    assert_eq!(session.state(), &SubmissionState::Idle);
    assert!(session.begin_submit().is_ok());
}
