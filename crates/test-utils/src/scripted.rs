//! Scripted stand-in for the external map renderer.

use async_trait::async_trait;
use bytes::Bytes;
use renderer::{parse_render_output, MapRenderer, RenderRequest};
use route_common::{RenderVariant, RouteError, RouteResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// What the scripted renderer answers with.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// `render:{variant}:{call number}` as the image bytes
    Echo,
    /// Fixed image bytes
    Image(Bytes),
    /// Raw renderer stdout, parsed like real output
    Output(String),
    /// Fail with a render failure carrying this message
    Failure(String),
}

/// Counts invocations and answers each request from a script.
pub struct ScriptedRenderer {
    response: Mutex<ScriptedResponse>,
    calls: AtomicUsize,
    variants: Mutex<Vec<RenderVariant>>,
    delay: Option<Duration>,
}

impl ScriptedRenderer {
    pub fn new(response: ScriptedResponse) -> Self {
        Self {
            response: Mutex::new(response),
            calls: AtomicUsize::new(0),
            variants: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn echo() -> Self {
        Self::new(ScriptedResponse::Echo)
    }

    pub fn failing(message: &str) -> Self {
        Self::new(ScriptedResponse::Failure(message.to_string()))
    }

    /// Sleep before answering, to widen race windows in concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_response(&self, response: ScriptedResponse) {
        *self.response.lock().expect("response lock") = response;
    }

    /// Number of render calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Variants requested so far, in call order.
    pub fn variants(&self) -> Vec<RenderVariant> {
        self.variants.lock().expect("variants lock").clone()
    }
}

#[async_trait]
impl MapRenderer for ScriptedRenderer {
    async fn render(&self, request: &RenderRequest) -> RouteResult<Bytes> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.variants
            .lock()
            .expect("variants lock")
            .push(request.variant);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.response.lock().expect("response lock").clone();
        match response {
            ScriptedResponse::Echo => Ok(Bytes::from(format!(
                "render:{}:{}",
                request.variant.discriminator(),
                call
            ))),
            ScriptedResponse::Image(bytes) => Ok(bytes),
            ScriptedResponse::Output(stdout) => parse_render_output(&stdout),
            ScriptedResponse::Failure(message) => Err(RouteError::RenderFailure(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{corners, tracks};

    fn request(variant: RenderVariant) -> RenderRequest {
        RenderRequest {
            raster: Bytes::from_static(b"raster"),
            track: tracks::equator_track(),
            corners: corners::square(),
            variant,
            timezone: "UTC".to_string(),
        }
    }

    #[tokio::test]
    async fn test_echo_counts_calls() {
        let renderer = ScriptedRenderer::echo();
        let first = renderer.render(&request(RenderVariant::Route)).await.unwrap();
        let second = renderer.render(&request(RenderVariant::Header)).await.unwrap();

        assert_eq!(first, Bytes::from("render:route:1"));
        assert_eq!(second, Bytes::from("render:header:2"));
        assert_eq!(renderer.calls(), 2);
        assert_eq!(
            renderer.variants(),
            vec![RenderVariant::Route, RenderVariant::Header]
        );
    }

    #[test]
    fn test_failure_is_render_failure() {
        let renderer = ScriptedRenderer::failing("renderer crashed");
        let err = tokio_test::block_on(renderer.render(&request(RenderVariant::Route))).unwrap_err();
        assert!(matches!(err, RouteError::RenderFailure(ref m) if m == "renderer crashed"));
        assert_eq!(renderer.calls(), 1);
    }

    #[tokio::test]
    async fn test_output_is_parsed() {
        let renderer = ScriptedRenderer::new(ScriptedResponse::Output("oops".into()));
        let err = renderer.render(&request(RenderVariant::Blank)).await.unwrap_err();
        assert!(matches!(err, RouteError::RenderFailure(_)));

        renderer.set_response(ScriptedResponse::Output(
            "data:image/jpeg;base64,/9j/4A==".into(),
        ));
        let bytes = renderer.render(&request(RenderVariant::Blank)).await.unwrap();
        assert_eq!(bytes.len(), 4);
    }
}
