use colloquy_llm::{parse_chat_sse_stream, StreamEvent};
use futures::{stream, StreamExt};

fn body(chunks: &[&str]) -> impl futures::Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    let owned: Vec<Result<Vec<u8>, std::io::Error>> =
        chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
    stream::iter(owned)
}

fn delta(content: &str) -> String {
    format!(
        "data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"{}\"}},\"finish_reason\":null}}]}}\n\n",
        content
    )
}

#[tokio::test]
async fn test_deltas_then_final() {
    let first = delta("Hel");
    let second = delta("lo");
    let events: Vec<_> = parse_chat_sse_stream(body(&[first.as_str(), second.as_str(), "data: [DONE]\n\n"]))
        .collect()
        .await;

    let events: Vec<StreamEvent> = events.into_iter().map(|e| e.unwrap()).collect();
    assert_eq!(
        events,
        vec![
            StreamEvent::Delta { content: "Hel".to_string() },
            StreamEvent::Delta { content: "lo".to_string() },
            StreamEvent::Final { content: "Hello".to_string() },
        ]
    );
}

#[tokio::test]
async fn test_event_split_across_chunks() {
    let line = delta("split");
    let (head, tail) = line.split_at(17);
    let events: Vec<_> = parse_chat_sse_stream(body(&[head, tail, "data: [DONE]\n"]))
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0].as_ref().unwrap(),
        &StreamEvent::Delta { content: "split".to_string() }
    );
}

#[tokio::test]
async fn test_role_only_and_comment_lines_are_skipped() {
    let role_only = "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}\n";
    let events: Vec<_> = parse_chat_sse_stream(body(&[": keep-alive\n", role_only, delta("x").as_str(), "data: [DONE]\n"]))
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1].as_ref().unwrap(),
        &StreamEvent::Final { content: "x".to_string() }
    );
}

#[tokio::test]
async fn test_provider_error_event() {
    let error = "data: {\"error\":{\"message\":\"rate limited\",\"type\":\"requests\"}}\n";
    let events: Vec<_> = parse_chat_sse_stream(body(&[delta("a").as_str(), error])).collect().await;

    assert_eq!(
        events.last().unwrap().as_ref().unwrap(),
        &StreamEvent::Error { message: "rate limited".to_string() }
    );
}

#[tokio::test]
async fn test_malformed_chunk_is_an_error() {
    let events: Vec<_> = parse_chat_sse_stream(body(&["data: {not json\n"])).collect().await;

    assert_eq!(events.len(), 1);
    assert!(events[0].is_err());
}

#[tokio::test]
async fn test_transport_error_is_yielded() {
    let items: Vec<Result<Vec<u8>, std::io::Error>> = vec![
        Ok(delta("a").into_bytes()),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
    ];
    let events: Vec<_> = parse_chat_sse_stream(stream::iter(items)).collect().await;

    assert_eq!(events.len(), 2);
    let err = events[1].as_ref().unwrap_err();
    assert!(err.to_string().contains("reset"));
}

#[tokio::test]
async fn test_body_ending_without_done_has_no_final() {
    let events: Vec<_> = parse_chat_sse_stream(body(&[delta("cut").as_str()])).collect().await;

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Ok(StreamEvent::Delta { .. })));
}

#[test]
fn test_stream_event_serialization() {
    let json = serde_json::to_string(&StreamEvent::Delta { content: "Test".to_string() }).unwrap();
    assert!(json.contains("\"type\":\"delta\""));
    assert!(json.contains("Test"));
}
