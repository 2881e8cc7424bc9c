//! Integration tests for replaying recorded traces through a session.

use glripper::export::{export_batch, MemorySink};
use glripper::gl::ContextId;
use glripper::harness::RecordingExporter;
use glripper::trace::{replay, Trace, TraceEvent};
use glripper::{GlCall, Session};
use shared::CaptureSettings;

const TEXTURED_QUAD: &str = include_str!("../demos/textured_quad.json");

fn session_for(trace: &Trace, exporter: &RecordingExporter) -> Session<glripper::trace::ScriptedContext> {
    let settings = trace.settings.clone().unwrap_or_default();
    Session::new(settings, Box::new(exporter.clone()))
}

#[test]
fn test_demo_trace_captures_one_frame() {
    let trace = Trace::from_json(TEXTURED_QUAD).unwrap();
    let exporter = RecordingExporter::new();
    let mut session = session_for(&trace, &exporter);

    let summary = replay(&trace, &mut session);
    assert_eq!(summary.contexts, 1);
    assert_eq!(summary.calls, 24);
    assert_eq!(summary.suppressed, 0);

    let batches = exporter.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].context, ContextId(0));
    let mesh = &batches[0].meshes[0];
    assert_eq!(batches[0].meshes.len(), 1);
    assert_eq!(mesh.vertex_count(), 4);
    assert!(mesh.has_uvs());
    assert!(mesh.is_transformed());
    assert!(mesh.positions.chunks_exact(3).all(|p| p[2] == -4.0));
    assert_eq!(mesh.textures.len(), 1);
}

#[tokio::test]
async fn test_demo_trace_exports_files() {
    let trace = Trace::from_json(TEXTURED_QUAD).unwrap();
    let exporter = RecordingExporter::new();
    let mut session = session_for(&trace, &exporter);
    replay(&trace, &mut session);

    let sink = MemorySink::new();
    for batch in exporter.batches() {
        let report = export_batch(&sink, batch).await;
        assert_eq!(report.failed, 0);
    }

    let names = sink.filenames();
    assert_eq!(names.len(), 3);
    assert!(names.contains(&"RIP0.obj".to_string()));
    assert!(names.contains(&"RIP0.mtl".to_string()));
    let png = names.iter().find(|n| n.ends_with(".png")).unwrap();
    let image = image::load_from_memory(&sink.bytes(png).unwrap()).unwrap();
    assert_eq!((image.width(), image.height()), (2, 2));
}

#[test]
fn test_settings_event_takes_effect_at_next_clear() {
    let mut trace = Trace::from_json(TEXTURED_QUAD).unwrap();
    // Switch to zip packaging right after the key press.
    let key_index = trace
        .events
        .iter()
        .position(|e| matches!(e, TraceEvent::KeyPress { .. }))
        .unwrap();
    trace.events.insert(
        key_index + 1,
        TraceEvent::UpdateSettings {
            settings: CaptureSettings {
                download_zip: true,
                ..Default::default()
            },
        },
    );

    let exporter = RecordingExporter::new();
    let mut session = session_for(&trace, &exporter);
    replay(&trace, &mut session);

    let batches = exporter.batches();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].options.download_zip);
    assert!(session.settings().download_zip);
}

#[test]
fn test_trace_events_round_trip_through_json() {
    let trace = Trace::from_json(TEXTURED_QUAD).unwrap();
    let json = serde_json::to_string(&trace).unwrap();
    let again = Trace::from_json(&json).unwrap();
    assert_eq!(again.events, trace.events);
    assert!(again.events.iter().any(|e| matches!(
        e,
        TraceEvent::Call {
            gl: GlCall::DrawElements { count: 6, .. },
            ..
        }
    )));
}

#[test]
fn test_wrong_key_never_arms() {
    let mut trace = Trace::from_json(TEXTURED_QUAD).unwrap();
    for event in &mut trace.events {
        if let TraceEvent::KeyPress { shift, .. } = event {
            *shift = true;
        }
    }
    let exporter = RecordingExporter::new();
    let mut session = session_for(&trace, &exporter);
    replay(&trace, &mut session);
    assert!(exporter.batches().is_empty());
}
