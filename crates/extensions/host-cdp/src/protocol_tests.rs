use super::*;

#[test]
fn test_cdp_request_serialize() {
    let req = CdpRequest {
        id: 1,
        method: "Page.navigate".to_string(),
        params: Some(serde_json::json!({"url": "https://example.com"})),
        session_id: Some("s1".to_string()),
    };
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["method"], "Page.navigate");
    assert_eq!(json["sessionId"], "s1");
}

#[test]
fn test_event_deserialize() {
    let json = r#"{"method": "Network.requestWillBeSent", "params": {"requestId": "7"}, "sessionId": "s1"}"#;
    let resp: CdpResponse = serde_json::from_str(json).unwrap();
    assert!(resp.id.is_none());
    assert_eq!(resp.method.as_deref(), Some("Network.requestWillBeSent"));
    assert_eq!(resp.params.unwrap()["requestId"], "7");
}

#[test]
fn test_error_response_deserialize() {
    let json = r#"{"id": 3, "error": {"code": -32000, "message": "No node"}}"#;
    let resp: CdpResponse = serde_json::from_str(json).unwrap();
    let error = resp.error.unwrap();
    assert_eq!(error.code, -32000);
    assert_eq!(error.message, "No node");
}

#[test]
fn test_page_info_deserialize() {
    let json = r#"{
        "id": "page123",
        "type": "page",
        "title": "Test",
        "url": "https://example.com",
        "webSocketDebuggerUrl": "ws://localhost:9222/devtools/page/page123"
    }"#;
    let info: PageInfo = serde_json::from_str(json).unwrap();
    assert_eq!(info.id, "page123");
    assert_eq!(info.page_type, "page");
}

#[test]
fn test_input_enums_serialize() {
    assert_eq!(serde_json::to_string(&CdpMouseButton::Left).unwrap(), "\"left\"");
    assert_eq!(
        serde_json::to_string(&MouseEventType::MousePressed).unwrap(),
        "\"mousePressed\""
    );
    assert_eq!(serde_json::to_string(&KeyEventType::KeyUp).unwrap(), "\"keyUp\"");
}
