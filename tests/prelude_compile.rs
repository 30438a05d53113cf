//! Compile-time prelude coverage test.
use convergence::prelude::*;
use std::time::Duration;

#[tokio::test]
async fn prelude_reexports_core_types() {
    let policy = WaitPolicy::new(Duration::from_millis(50), Duration::from_millis(5))
        .expect("valid policy");
    let ready = policy.execute(|| async { Check::<_, ApiError>::Ready(1) }).await;
    assert_eq!(ready.ok(), Some(1));

    let options = ModelResponseOptions::default().response_check(ResponseCheck::Choices);
    assert_eq!(options.model_name, "default-model");

    let key = ObjectKey::new("svc", "ns");
    let _kind: ResourceKind = ResourceKind::LLM_INFERENCE_SERVICE;
    let _err: Result<String, UrlError> = resolve_url(&key.name, &serde_json::json!({}));
    let _status = ModelStatus::default();
    let _reply = HttpReply { status: 200, body: String::new() };
    let _transport_err = TransportError("refused".into());
    let _build: Result<WaitPolicy, BuildError> = WaitPolicy::builder().build();
    let _wait_err: Option<WaitError<ProbeError>> = None;
}
