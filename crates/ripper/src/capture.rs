//! Per-context frame state machine and draw capture.
//!
//! Capture is armed by an external trigger and starts at the next frame
//! boundary (`clear`). Every supported draw issued while capturing becomes
//! one [`Mesh`]. The following frame boundary hands the batch to the
//! exporter and returns the context to idle.

use shared::CaptureSettings;

use crate::backend::{GlBackend, ReadbackDraw};
use crate::export::{BatchExporter, ExportBatch, ExportOptions};
use crate::gl::{index_width, read_index, ContextId, DrawMode, ELEMENT_ARRAY_BUFFER};
use crate::intercept::HookOutcome;
use crate::mesh::{Mesh, PositionSource, Primitive};
use crate::shadow::GraphicsContextShadow;
use crate::texture::{resolve_model_matrix, resolve_textures};
use crate::validation::MeshValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapturePhase {
    #[default]
    Idle,
    ArmedForNextFrame,
    Capturing,
    Exporting,
}

#[derive(Debug, Default)]
pub struct FrameCapture {
    phase: CapturePhase,
    batch: Vec<Mesh>,
    /// Texture cache is cleared at the next frame boundary
    needs_reset: bool,
    warned_indexed_readback: bool,
}

impl FrameCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn is_capturing(&self) -> bool {
        self.phase == CapturePhase::Capturing
    }

    pub fn batch(&self) -> &[Mesh] {
        &self.batch
    }

    pub fn needs_reset(&self) -> bool {
        self.needs_reset
    }

    /// Frame boundary handling. `armed` is the session-wide trigger flag;
    /// it is consumed when this context starts capturing.
    pub fn on_frame_boundary(
        &mut self,
        context: ContextId,
        shadow: &mut GraphicsContextShadow,
        armed: &mut bool,
        settings: &CaptureSettings,
        exporter: &mut dyn BatchExporter,
    ) {
        if self.is_capturing() && !self.batch.is_empty() {
            self.phase = CapturePhase::Exporting;
            let batch = ExportBatch {
                context,
                meshes: std::mem::take(&mut self.batch),
                options: ExportOptions::from_settings(settings),
            };
            tracing::info!(?context, meshes = batch.meshes.len(), "frame captured");
            exporter.submit(batch);
            self.phase = CapturePhase::Idle;
            self.needs_reset = true;
        }

        if *armed {
            *armed = false;
            self.phase = CapturePhase::Capturing;
            tracing::info!(?context, "capturing next frame");
        }

        if self.needs_reset {
            shadow.clear_texture_cache();
            self.needs_reset = false;
        }

        shadow.streams.clear();
    }

    /// Non-indexed draw.
    pub fn capture_draw_arrays<B: GlBackend + ?Sized>(
        &mut self,
        shadow: &mut GraphicsContextShadow,
        backend: &mut B,
        settings: &CaptureSettings,
        mode: u32,
        first: i32,
        count: i32,
    ) -> HookOutcome {
        if !self.is_capturing() {
            return HookOutcome::PassThrough;
        }
        let Some(draw_mode) = capturable(mode) else {
            return HookOutcome::PassThrough;
        };

        shadow.refresh_streams(&backend.active_attributes(), &settings.roles);
        if shadow.streams.positions.is_empty() {
            tracing::debug!("drawArrays without position data");
            return HookOutcome::PassThrough;
        }

        let mut outcome = HookOutcome::PassThrough;
        let mut source = PositionSource::RawAttributes;
        if settings.shader_readback {
            let input_vertices = shadow.streams.positions.len() / 3;
            let draw = ReadbackDraw {
                mode,
                first,
                count,
                capacity: input_vertices * 4,
            };
            match backend.readback_positions(draw) {
                Some(xyzw) => {
                    replace_positions(&mut shadow.streams.positions, &xyzw, count);
                    source = PositionSource::VertexStageReadback;
                    outcome = HookOutcome::Suppress;
                }
                None => tracing::warn!("vertex output capture failed, using raw attributes"),
            }
        }

        let vertex_count = (shadow.streams.positions.len() / 3) as u32;
        let start = first.max(0) as u32;
        let end = start.saturating_add(count.max(0) as u32).min(vertex_count);
        let indices: Vec<u32> = (start.min(end)..end).collect();

        self.finish(shadow, backend, settings, draw_mode, indices, source);
        outcome
    }

    /// Indexed draw; `offset` is a byte offset into the element buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn capture_draw_elements<B: GlBackend + ?Sized>(
        &mut self,
        shadow: &mut GraphicsContextShadow,
        backend: &mut B,
        settings: &CaptureSettings,
        mode: u32,
        count: i32,
        index_type: u32,
        offset: i64,
    ) -> HookOutcome {
        if !self.is_capturing() {
            return HookOutcome::PassThrough;
        }
        let Some(draw_mode) = capturable(mode) else {
            return HookOutcome::PassThrough;
        };

        let Some(indices) = read_indices(shadow, count, index_type, offset) else {
            return HookOutcome::PassThrough;
        };

        shadow.refresh_streams(&backend.active_attributes(), &settings.roles);
        if shadow.streams.positions.is_empty() {
            tracing::debug!("drawElements without position data");
            return HookOutcome::PassThrough;
        }

        if settings.shader_readback {
            if !self.warned_indexed_readback {
                tracing::warn!(
                    "vertex output capture is not supported for indexed draws; \
                     capturing raw attribute positions"
                );
                self.warned_indexed_readback = true;
            } else {
                tracing::debug!("indexed draw captured from raw attributes");
            }
        }

        self.finish(
            shadow,
            backend,
            settings,
            draw_mode,
            indices,
            PositionSource::RawAttributes,
        );
        HookOutcome::PassThrough
    }

    /// Build the mesh from the current streams, append it if valid, and
    /// clear the streams.
    fn finish<B: GlBackend + ?Sized>(
        &mut self,
        shadow: &mut GraphicsContextShadow,
        backend: &mut B,
        settings: &CaptureSettings,
        mode: DrawMode,
        indices: Vec<u32>,
        source: PositionSource,
    ) {
        let mut streams = std::mem::take(&mut shadow.streams);
        let whole = streams.positions.len() / 3 * 3;
        streams.positions.truncate(whole);

        let name = format!("RIP{}", self.batch.len());
        let mut mesh = Mesh::new(name, streams.positions, Primitive { mode, indices })
            .with_normals(streams.normals)
            .with_uvs(streams.uvs)
            .with_position_source(source);

        let check = MeshValidator::new(&mesh);
        if !check.are_indices_in_range() {
            tracing::debug!(name = %mesh.name, "{}", check.validate_all().join("; "));
            return;
        }
        let (normals_ok, uvs_ok) = (check.is_normal_stride_valid(), check.is_uv_stride_valid());
        if !normals_ok {
            tracing::debug!(name = %mesh.name, "dropping partial normals");
            mesh.normals.clear();
        }
        if !uvs_ok {
            tracing::debug!(name = %mesh.name, "dropping partial uvs");
            mesh.uvs.clear();
        }

        mesh.textures = resolve_textures(shadow, backend, settings);
        if settings.apply_model_matrix {
            if let Some(matrix) = resolve_model_matrix(backend, &settings.roles) {
                mesh.transform(&matrix);
            }
        }

        tracing::debug!(
            name = %mesh.name,
            vertices = mesh.vertex_count(),
            indices = mesh.primitive.indices.len(),
            textures = mesh.textures.len(),
            "captured mesh"
        );
        self.batch.push(mesh);
    }
}

fn capturable(mode: u32) -> Option<DrawMode> {
    match DrawMode::from_gl(mode) {
        Some(m) if m.is_capturable() => Some(m),
        _ => {
            tracing::debug!(mode, "unsupported draw mode");
            None
        }
    }
}

/// Indices `[offset / width, offset / width + count)` of the bound element
/// buffer.
fn read_indices(
    shadow: &GraphicsContextShadow,
    count: i32,
    index_type: u32,
    offset: i64,
) -> Option<Vec<u32>> {
    let Some(record) = shadow.buffers.bound_record(ELEMENT_ARRAY_BUFFER) else {
        tracing::debug!("no indices bound for drawElements");
        return None;
    };
    let bytes = record.as_bytes();
    let width = index_width(index_type);
    let start = usize::try_from(offset.max(0)).ok()? / width;
    let count = usize::try_from(count.max(0)).ok()?;

    let end = start.checked_add(count).and_then(|n| n.checked_mul(width));
    if end.map_or(true, |end| end > bytes.len()) {
        tracing::debug!(start, count, len = bytes.len(), "index range past element buffer");
        return None;
    }
    Some(
        (start..start + count)
            .map(|i| read_index(&bytes[i * width..(i + 1) * width], width))
            .collect(),
    )
}

/// Overwrite positions with the xyz of the first `count` captured vertices.
/// Vertices past `count` are zeroed.
fn replace_positions(positions: &mut [f32], xyzw: &[f32], count: i32) {
    positions.iter_mut().for_each(|p| *p = 0.0);
    let count = (count.max(0) as usize)
        .min(positions.len() / 3)
        .min(xyzw.len() / 4);
    for i in 0..count {
        positions[i * 3..i * 3 + 3].copy_from_slice(&xyzw[i * 4..i * 4 + 3]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_positions_drops_w() {
        let mut positions = vec![9.0; 9];
        let xyzw = [1.0, 2.0, 3.0, 1.0, 4.0, 5.0, 6.0, 1.0];
        replace_positions(&mut positions, &xyzw, 2);
        assert_eq!(positions, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_replace_positions_short_readback() {
        let mut positions = vec![9.0; 6];
        replace_positions(&mut positions, &[1.0, 1.0, 1.0, 1.0], 2);
        assert_eq!(positions, vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_read_indices_offset_and_width() {
        use crate::gl::{BufferId, UNSIGNED_BYTE, UNSIGNED_INT};
        use crate::shadow::BufferPayload;

        let mut shadow = GraphicsContextShadow::new();
        shadow.buffers.bind(ELEMENT_ARRAY_BUFFER, Some(BufferId(1)));
        shadow
            .buffers
            .upload(ELEMENT_ARRAY_BUFFER, &BufferPayload::U32(vec![7, 8, 9, 10]))
            .unwrap();

        assert_eq!(read_indices(&shadow, 2, UNSIGNED_INT, 8), Some(vec![9, 10]));
        assert_eq!(read_indices(&shadow, 3, UNSIGNED_INT, 8), None);
        assert_eq!(read_indices(&shadow, 2, UNSIGNED_BYTE, 0), Some(vec![7, 0]));
    }

    #[test]
    fn test_read_indices_huge_offset_is_rejected() {
        use crate::gl::{BufferId, UNSIGNED_INT};
        use crate::shadow::BufferPayload;

        let mut shadow = GraphicsContextShadow::new();
        shadow.buffers.bind(ELEMENT_ARRAY_BUFFER, Some(BufferId(1)));
        shadow
            .buffers
            .upload(ELEMENT_ARRAY_BUFFER, &BufferPayload::U32(vec![0, 1, 2]))
            .unwrap();

        assert_eq!(read_indices(&shadow, i32::MAX, UNSIGNED_INT, i64::MAX), None);
        assert_eq!(read_indices(&shadow, 3, UNSIGNED_INT, i64::MAX - 3), None);
    }

    #[test]
    fn test_read_indices_defaults_to_short() {
        use crate::gl::BufferId;
        use crate::shadow::BufferPayload;

        let mut shadow = GraphicsContextShadow::new();
        shadow.buffers.bind(ELEMENT_ARRAY_BUFFER, Some(BufferId(1)));
        shadow
            .buffers
            .upload(ELEMENT_ARRAY_BUFFER, &BufferPayload::U16(vec![3, 4, 5]))
            .unwrap();
        assert_eq!(read_indices(&shadow, 2, 0x1234, 2), Some(vec![4, 5]));
    }

    #[test]
    fn test_read_indices_requires_element_buffer() {
        let shadow = GraphicsContextShadow::new();
        assert_eq!(read_indices(&shadow, 3, 0, 0), None);
    }

    #[test]
    fn test_idle_draw_passes_through() {
        let mut capture = FrameCapture::new();
        let mut shadow = GraphicsContextShadow::new();
        let mut ctx = crate::trace::ScriptedContext::new();
        let outcome = capture.capture_draw_arrays(
            &mut shadow,
            &mut ctx,
            &CaptureSettings::default(),
            crate::gl::TRIANGLES,
            0,
            3,
        );
        assert_eq!(outcome, HookOutcome::PassThrough);
        assert!(capture.batch().is_empty());
    }
}
