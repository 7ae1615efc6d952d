//! Tests running SubprocessRenderer against small shell scripts.

#![cfg(unix)]

use bytes::Bytes;
use renderer::{MapRenderer, RenderRequest, RendererConfig, SubprocessRenderer};
use route_common::{Corners, RenderVariant, RouteError, Track, TrackPoint};
use std::collections::HashMap;
use std::path::Path;

fn request(variant: RenderVariant) -> RenderRequest {
    RenderRequest {
        raster: Bytes::from_static(b"\xff\xd8raster"),
        track: Track::from_points(vec![
            TrackPoint::new(Some(0.0), 60.5, 22.1),
            TrackPoint::new(Some(10.0), 60.6, 22.2),
        ])
        .unwrap(),
        corners: Corners::parse("60.519,22.078,60.518,22.115,60.491,22.112,60.492,22.073")
            .unwrap(),
        variant,
        timezone: "Europe/Helsinki".to_string(),
    }
}

fn renderer_for(dir: &Path, body: &str, timeout_secs: u64) -> SubprocessRenderer {
    let script = dir.join("render.sh");
    std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();

    SubprocessRenderer::new(RendererConfig {
        program: "sh".to_string(),
        script: Some(script),
        timeout_secs,
        env: HashMap::new(),
    })
    .with_scratch_dir(dir)
}

#[tokio::test]
async fn test_renders_with_expected_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = renderer_for(
        dir.path(),
        r#"[ -s "$1" ] || exit 5
grep -q latlon "$2" || exit 6
case "$3" in *top_left*) ;; *) exit 7 ;; esac
[ "$4" = "hr" ] || exit 3
[ "$5" = "Europe/Helsinki" ] || exit 4
echo "data:image/jpeg;base64,/9j/4A==""#,
        10,
    );

    let bytes = renderer
        .render(&request(RenderVariant::HeaderAndRoute))
        .await
        .unwrap();
    assert_eq!(&bytes[..], &[0xFF, 0xD8, 0xFF, 0xE0]);
}

#[tokio::test]
async fn test_blank_variant_passes_empty_flag() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = renderer_for(
        dir.path(),
        r#"[ -z "$4" ] || exit 3
echo "data:image/jpeg;base64,/9j/4A==""#,
        10,
    );

    assert!(renderer.render(&request(RenderVariant::Blank)).await.is_ok());
}

#[tokio::test]
async fn test_non_zero_exit_is_render_failure() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = renderer_for(dir.path(), "echo boom >&2\nexit 2", 10);

    let err = renderer
        .render(&request(RenderVariant::Route))
        .await
        .unwrap_err();
    match err {
        RouteError::RenderFailure(msg) => assert!(msg.contains("boom"), "{}", msg),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_garbage_output_is_render_failure() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = renderer_for(dir.path(), "echo 'TypeError: undefined'", 10);

    let err = renderer
        .render(&request(RenderVariant::Route))
        .await
        .unwrap_err();
    assert!(matches!(err, RouteError::RenderFailure(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_slow_renderer_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = renderer_for(dir.path(), "sleep 30", 1);

    let err = renderer
        .render(&request(RenderVariant::Route))
        .await
        .unwrap_err();
    assert!(matches!(err, RouteError::RenderTimeout(_)));
}

#[tokio::test]
async fn test_missing_program_is_render_failure() {
    let renderer = SubprocessRenderer::new(RendererConfig {
        program: "/nonexistent/renderer".to_string(),
        script: None,
        timeout_secs: 5,
        env: HashMap::new(),
    });

    let err = renderer
        .render(&request(RenderVariant::Route))
        .await
        .unwrap_err();
    assert!(matches!(err, RouteError::RenderFailure(_)));
}

#[tokio::test]
async fn test_temp_inputs_are_removed() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = renderer_for(dir.path(), r#"echo "data:image/jpeg;base64,/9j/4A==""#, 10);
    renderer.render(&request(RenderVariant::Route)).await.unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name() != "render.sh")
        .collect();
    assert!(leftovers.is_empty());
}
