//! Integration tests for captured batches flowing into asset sinks.

use std::io::Read;

use glripper::export::{export_batch, ExportBatch, MemorySink};
use glripper::fixtures;
use glripper::gl::TextureId;
use glripper::harness::TestHarness;
use glripper::trace::TextureScript;
use shared::CaptureSettings;

/// Capture one frame of two textured draws sharing one texture.
fn captured_batch(settings: CaptureSettings) -> ExportBatch {
    let mut h = TestHarness::with_settings(settings);
    let ctx = h.create_context();
    h.use_program(ctx, fixtures::textured_program(1));
    h.define_texture(ctx, TextureScript::solid(TextureId(5), [200, 10, 10, 255]));
    h.calls(ctx, fixtures::float_attribute_calls(1, 0, 3, &fixtures::quad_positions()));
    h.calls(ctx, fixtures::float_attribute_calls(2, 1, 2, &fixtures::quad_uvs()));
    h.calls(ctx, fixtures::index_buffer_calls(3, &fixtures::quad_indices()));
    h.calls(ctx, fixtures::texture_calls(5, 0, Some((2, 2))));

    h.start_capture(ctx);
    h.call(ctx, fixtures::draw_indexed_triangles(6));
    h.call(ctx, fixtures::draw_indexed_triangles(3));
    h.call(ctx, fixtures::clear());

    let mut batches = h.batches();
    assert_eq!(batches.len(), 1);
    batches.remove(0)
}

#[tokio::test]
async fn test_individual_files_written_per_asset() {
    let batch = captured_batch(CaptureSettings::default());
    let texture_name = format!("{}.png", batch.meshes[0].textures[0].filename);
    let sink = MemorySink::new();

    let report = export_batch(&sink, batch).await;
    assert_eq!(report.failed, 0);
    assert_eq!(report.written, 5);

    let names = sink.filenames();
    for expected in ["RIP0.obj", "RIP0.mtl", "RIP1.obj", "RIP1.mtl", texture_name.as_str()] {
        assert!(names.iter().any(|n| n == expected), "missing {expected} in {names:?}");
    }

    let png = sink.bytes(&texture_name).unwrap();
    let image = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (2, 2));
    assert_eq!(image.get_pixel(0, 0).0, [200, 10, 10, 255]);

    let mtl = sink.text("RIP0.mtl").unwrap();
    assert!(mtl.starts_with("newmtl RIP0\n"));
    assert!(mtl.contains(&format!("map_Kd {texture_name}")));
    let obj = sink.text("RIP1.obj").unwrap();
    assert!(obj.starts_with("mtllib RIP1.mtl\n"));
}

#[tokio::test]
async fn test_zip_mode_writes_one_archive() {
    let batch = captured_batch(CaptureSettings {
        download_zip: true,
        ..Default::default()
    });
    let sink = MemorySink::new();

    let report = export_batch(&sink, batch).await;
    assert_eq!(report.written, 1);
    assert_eq!(sink.pause_count(), 0);

    let files = sink.files();
    assert_eq!(files.len(), 1);
    assert!(files[0].filename.ends_with("-rip.zip"));

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(files[0].bytes.clone())).unwrap();
    assert_eq!(archive.len(), 5);
    let mut obj = String::new();
    archive.by_name("RIP0.obj").unwrap().read_to_string(&mut obj).unwrap();
    assert!(obj.contains("f 1/1 2/2 3/3"));
}

#[tokio::test]
async fn test_failed_asset_does_not_stop_export() {
    let batch = captured_batch(CaptureSettings::default());
    let sink = MemorySink::new().failing_on("RIP0.obj");

    let report = export_batch(&sink, batch).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.written, 3);
    let names = sink.filenames();
    assert!(!names.iter().any(|n| n.starts_with("RIP0.")));
    assert!(names.iter().any(|n| n == "RIP1.obj"));
}

#[tokio::test]
async fn test_filesystem_sink_receives_batch() {
    let dir = tempfile::tempdir().unwrap();
    let batch = captured_batch(CaptureSettings {
        export_pacing_ms: 0,
        ..Default::default()
    });
    let sink = glripper::export::FsSink::new(dir.path());

    let report = export_batch(&sink, batch).await;
    assert_eq!(report.failed, 0);
    let obj = std::fs::read_to_string(dir.path().join("RIP0.obj")).unwrap();
    assert_eq!(obj.lines().filter(|l| l.starts_with("f ")).count(), 2);
    assert!(dir.path().join("RIP1.mtl").exists());
}
