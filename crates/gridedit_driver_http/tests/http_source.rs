use gridedit_core::{
    ChangeSet, Filters, GridError, PageRequest, RecordSource, RowUpdate, SaveBatch, SortDirection,
    TableRef, Value,
};
use gridedit_driver_http::HttpRecordSource;
use gridedit_test_support::fixtures::{item, test_session};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Raw request as seen by the stub server.
struct Captured {
    request_line: String,
    headers: Vec<String>,
    body: String,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        let prefix = format!("{}:", name.to_ascii_lowercase());
        self.headers
            .iter()
            .find(|h| h.to_ascii_lowercase().starts_with(&prefix))
            .map(|h| h[prefix.len()..].trim())
    }
}

/// Serve exactly one request with a canned response.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
    let addr = listener.local_addr().expect("local addr");

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

        let mut request_line = String::new();
        reader.read_line(&mut request_line).expect("request line");

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).expect("header line");
            let line = line.trim_end().to_string();
            if line.is_empty() {
                break;
            }
            headers.push(line);
        }

        let length = headers
            .iter()
            .find_map(|h| {
                let lower = h.to_ascii_lowercase();
                lower
                    .strip_prefix("content-length:")
                    .and_then(|v| v.trim().parse::<usize>().ok())
            })
            .unwrap_or(0);

        let mut request_body = vec![0; length];
        reader.read_exact(&mut request_body).expect("request body");

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let mut stream = stream;
        stream.write_all(response.as_bytes()).expect("write response");
        stream.flush().expect("flush");

        Captured {
            request_line: request_line.trim_end().to_string(),
            headers,
            body: String::from_utf8(request_body).expect("utf-8 body"),
        }
    });

    (format!("http://{}", addr), handle)
}

fn source(base: &str) -> HttpRecordSource {
    HttpRecordSource::new(base, Duration::from_secs(5)).expect("client should build")
}

#[tokio::test]
async fn fetch_page_sends_query_and_decodes_rows() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"data":[{"Item_Code":"A1","Qty":10},{"Item_Code":"A2","Qty":null}],"total_rows":120,"page_number":2}"#,
    );

    let request = PageRequest {
        table: TableRef::new("BOQ", "Civil Works"),
        page: 2,
        limit: 50,
        sort_column: "Qty".to_string(),
        sort_direction: SortDirection::Descending,
        filters: Filters::from_inputs([("Description", "pipe")]),
    };

    let page = source(&base)
        .fetch_page(&request)
        .await
        .expect("page should load");

    assert_eq!(page.total_rows(), 120);
    assert_eq!(page.page_number(), 2);
    let records = page.into_records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].get("Qty"), Some(&Value::Null));

    let captured = server.join().expect("server thread");
    assert!(captured.request_line.starts_with("GET /api/data/BOQ/Civil%20Works?"));
    assert!(captured.request_line.contains("page=2"));
    assert!(captured.request_line.contains("limit=50"));
    assert!(captured.request_line.contains("sortBy=Qty"));
    assert!(captured.request_line.contains("sortOrder=desc"));
    assert!(captured.request_line.contains("filters="));
}

#[tokio::test]
async fn null_aggregates_default_to_zero() {
    let (base, server) = serve_once("200 OK", r#"{"total_le":null,"total_euro":"12.5"}"#);

    let aggregates = source(&base)
        .fetch_aggregates(&TableRef::new("BOQ", "Items"))
        .await
        .expect("aggregates should load");

    assert_eq!(aggregates.total_le, 0.0);
    assert_eq!(aggregates.total_euro, 12.5);

    let captured = server.join().expect("server thread");
    assert!(captured.request_line.starts_with("GET /api/aggregates/BOQ/Items"));
}

#[tokio::test]
async fn error_status_becomes_remote_error() {
    let (base, server) = serve_once(
        "500 Internal Server Error",
        r#"{"error":"function get_filtered_paginated_table does not exist"}"#,
    );

    let result = source(&base).list_tables("BOQ", None).await;

    match result {
        Err(GridError::Remote { status, message }) => {
            assert_eq!(status, 500);
            assert!(message.contains("does not exist"));
        }
        other => panic!("expected remote error, got {:?}", other),
    }

    let captured = server.join().expect("server thread");
    assert!(captured.request_line.starts_with("GET /api/tables/BOQ?pattern=%25"));
}

#[tokio::test]
async fn save_posts_camel_case_batch_with_bearer() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"success":true,"message":"Changes saved successfully!"}"#,
    );

    let mut changes = ChangeSet::default();
    changes.inserts.push(item("B1", "Flange", 3));
    changes.updates.push(RowUpdate {
        pk_value: "A1".to_string(),
        changes: [("Qty".to_string(), Value::Int(15))].into_iter().collect(),
    });
    let batch = SaveBatch::new("BOQ", "Items", "Item_Code", changes);

    let receipt = source(&base)
        .save_batch(&batch, &test_session())
        .await
        .expect("save should succeed");
    assert!(receipt.success);

    let captured = server.join().expect("server thread");
    assert!(captured.request_line.starts_with("POST /api/save"));
    assert_eq!(captured.header("authorization"), Some("Bearer test-token"));

    let body: serde_json::Value = serde_json::from_str(&captured.body).expect("json body");
    assert_eq!(body["schemaName"], "BOQ");
    assert_eq!(body["tableName"], "Items");
    assert_eq!(body["primaryKey"], "Item_Code");
    assert_eq!(body["inserts"][0]["Item_Code"], "B1");
    assert_eq!(body["updates"][0]["pkValue"], "A1");
    assert_eq!(body["updates"][0]["changes"]["Qty"], 15);
    assert_eq!(body["deletes"], serde_json::json!([]));
}

#[tokio::test]
async fn unauthorized_save_is_an_auth_error() {
    let (base, server) = serve_once("401 Unauthorized", r#"{"error":"Unauthorized"}"#);

    let batch = SaveBatch::new("BOQ", "Items", "Item_Code", ChangeSet::default());
    let result = source(&base).save_batch(&batch, &test_session()).await;

    assert!(matches!(result, Err(GridError::Auth(_))));
    server.join().expect("server thread");
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let result = source(&format!("http://{}", addr))
        .fetch_aggregates(&TableRef::new("BOQ", "Items"))
        .await;

    assert!(matches!(result, Err(GridError::Network(_))));
}
