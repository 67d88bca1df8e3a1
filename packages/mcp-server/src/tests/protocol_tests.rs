use crate::mcp::*;
use crate::server::{handle_message, serve, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR};
use crate::tests::test_helpers::create_test_context;
use kubexec_executor::FakePlatform;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, BufReader};

#[tokio::test]
async fn test_initialize_request() {
    let request = InitializeRequest {
        protocol_version: "2024-11-05".to_string(),
        capabilities: ClientCapabilities {
            roots: Some(ListChanged {
                list_changed: Some(true),
            }),
            sampling: None,
        },
        client_info: ClientInfo {
            name: "test-client".to_string(),
            version: "1.0.0".to_string(),
        },
    };

    let response = initialize(Some(request)).await.unwrap();

    assert_eq!(response.protocol_version, "2024-11-05");
    assert_eq!(response.server_info.name, "kubexec");
    assert!(response.capabilities.tools.is_some());
}

#[tokio::test]
async fn test_initialize_serializes_camel_case() {
    let value = serde_json::to_value(initialize(None).await.unwrap()).unwrap();
    assert_eq!(value["protocolVersion"], "2024-11-05");
    assert_eq!(value["serverInfo"]["name"], "kubexec");
    assert_eq!(value["capabilities"]["tools"]["listChanged"], false);
}

#[rstest]
#[case("resources/list", json!({"resources": [], "nextCursor": null}))]
#[case("prompts/list", json!({"prompts": [], "nextCursor": null}))]
#[case("ping", json!({}))]
#[case("logging/setLevel", json!({}))]
#[tokio::test]
async fn test_static_methods(#[case] method: &str, #[case] expected: Value) {
    let (context, _fake) = create_test_context(FakePlatform::new());
    let line = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": {"level": "info"}});

    let response = handle_message(&line.to_string(), &context).await.unwrap();

    assert_eq!(response["id"], 1);
    assert_eq!(response["result"], expected);
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let (context, _fake) = create_test_context(FakePlatform::new());

    let initialized = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    assert!(handle_message(&initialized.to_string(), &context)
        .await
        .is_none());

    let no_id = json!({"jsonrpc": "2.0", "method": "ping"});
    assert!(handle_message(&no_id.to_string(), &context).await.is_none());
}

#[tokio::test]
async fn test_unknown_method() {
    let (context, _fake) = create_test_context(FakePlatform::new());
    let line = json!({"jsonrpc": "2.0", "id": "a", "method": "sampling/createMessage"});

    let response = handle_message(&line.to_string(), &context).await.unwrap();

    assert_eq!(response["id"], "a");
    assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_json() {
    let (context, _fake) = create_test_context(FakePlatform::new());

    let response = handle_message("{not json", &context).await.unwrap();

    assert_eq!(response["id"], Value::Null);
    assert_eq!(response["error"]["code"], PARSE_ERROR);
}

#[tokio::test]
async fn test_invalid_params() {
    let (context, _fake) = create_test_context(FakePlatform::new());
    let line = json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"arguments": {}}});

    let response = handle_message(&line.to_string(), &context).await.unwrap();

    assert_eq!(response["error"]["code"], INVALID_PARAMS);
}

#[tokio::test(start_paused = true)]
async fn test_serve_answers_every_request() {
    let (context, fake) = create_test_context(FakePlatform::new().with_log("42"));
    let input = [
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "test", "version": "0.1"}
        }}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {
            "name": "run_code",
            "arguments": {"code": "print(42)", "libraries_used": []}
        }}),
    ]
    .iter()
    .map(Value::to_string)
    .collect::<Vec<_>>()
    .join("\n");

    let (mut client, server_side) = tokio::io::duplex(64 * 1024);
    serve(
        BufReader::new(input.as_bytes()),
        server_side,
        context,
        std::future::pending(),
    )
    .await
    .unwrap();

    let mut output = String::new();
    client.read_to_string(&mut output).await.unwrap();

    let mut responses: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    responses.sort_by_key(|r| r["id"].as_i64());

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "kubexec");
    assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 2);
    assert_eq!(responses[2]["result"]["content"][0]["text"], "42");
    assert!(fake.run_names().is_empty());
}
