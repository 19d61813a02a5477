//! Verify the executors against JSON test vectors stored in `test-vectors/`.
//!
//! Each case describes the client and call-site headers, the payload, the
//! request the executor must hand to the transport, a simulated response and
//! the expected parse result. Bodies are compared as parsed JSON (not raw
//! strings) to avoid false negatives from field ordering.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fetcher_core::schema::{any, null, string, Schema, SchemaExt};
use fetcher_core::{
    ExecOptions, FetchError, Headers, HttpRequest, HttpResponse, RequestOptions, Result,
    Transport,
};
use serde_json::Value;

/// Replays one simulated response and keeps the request it was given.
struct Replay {
    response: HttpResponse,
    seen: Mutex<Option<HttpRequest>>,
}

#[async_trait]
impl Transport for Replay {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        *self.seen.lock().unwrap() = Some(request);
        Ok(self.response.clone())
    }
}

fn headers(raw: &Value) -> Option<Headers> {
    let pairs = raw.as_array()?;
    Some(
        pairs
            .iter()
            .map(|pair| {
                let pair = pair.as_array().unwrap();
                (pair[0].as_str().unwrap(), pair[1].as_str().unwrap())
            })
            .collect(),
    )
}

fn schema(kind: &str) -> Box<dyn Schema<Output = Value>> {
    match kind {
        "any" => Box::new(any()),
        "string" => Box::new(string().map(Value::String)),
        "null" => Box::new(null().map(|()| Value::Null)),
        other => panic!("unknown schema: {other}"),
    }
}

#[tokio::test]
async fn executor_test_vectors() {
    let raw = include_str!("../../test-vectors/executors.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let base_url = vectors["base_url"].as_str().unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let sim = &case["simulated_response"];
        let transport = Arc::new(Replay {
            response: HttpResponse::new(
                sim["status"].as_u64().unwrap() as u16,
                sim["body"].as_str().unwrap(),
            ),
            seen: Mutex::new(None),
        });

        let exec = ExecOptions::new(
            base_url.to_string(),
            headers(&case["client_headers"]),
            Arc::clone(&transport) as Arc<dyn Transport>,
        );
        let url = format!("{}{}", exec.ctx(), case["path"].as_str().unwrap());
        let schema = schema(case["schema"].as_str().unwrap());
        let builder = match case["method"].as_str().unwrap() {
            "GET" => exec.get(url, schema),
            "POST" => exec.post(url, schema),
            "PUT" => exec.put(url, schema),
            "PATCH" => exec.patch(url, schema),
            "DELETE" => exec.delete(url, schema),
            other => panic!("{name}: unknown method: {other}"),
        };
        let mut call_options = RequestOptions::new();
        for (header, value) in headers(&case["call_headers"]).unwrap_or_default() {
            call_options = call_options.header(header, value);
        }
        let builder = builder.options(call_options);
        let builder = match &case["body"] {
            Value::Null => builder,
            body => builder.json(body),
        };
        let result = builder.await;

        // Verify the request handed to the transport.
        let req = transport.seen.lock().unwrap().take().unwrap();
        let expected_req = &case["expected_request"];
        assert_eq!(req.method.as_str(), expected_req["method"], "{name}: method");
        assert_eq!(req.url, expected_req["url"].as_str().unwrap(), "{name}: url");
        assert_eq!(
            req.headers,
            headers(&expected_req["headers"]).unwrap(),
            "{name}: headers"
        );
        let sent_body: Value = req
            .body
            .as_deref()
            .map(|body| serde_json::from_str(body).unwrap())
            .unwrap_or(Value::Null);
        assert_eq!(sent_body, expected_req["body"], "{name}: body");
        assert_eq!(
            req.cache.map(|c| c.as_str()),
            expected_req["cache"].as_str(),
            "{name}: cache"
        );
        assert_eq!(
            req.referrer_policy.as_str(),
            expected_req["referrer_policy"],
            "{name}: referrer policy"
        );

        // Verify the parse.
        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            match expected_error.as_str().unwrap() {
                "ResponseShape" => assert!(
                    matches!(err, FetchError::ResponseShape { .. }),
                    "{name}: expected ResponseShape, got {err}"
                ),
                "InvalidBody" => assert!(
                    matches!(err, FetchError::InvalidBody { .. }),
                    "{name}: expected InvalidBody, got {err}"
                ),
                other => panic!("{name}: unknown expected_error: {other}"),
            }
        } else {
            let envelope = result.unwrap();
            assert_eq!(envelope.status(), sim["status"].as_u64().unwrap() as u16, "{name}: status");
            assert_eq!(envelope.data, case["expected_data"], "{name}: parsed result");
        }
    }
}
