//! Headless test harness: a session wired to scripted contexts and a
//! recording exporter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use shared::CaptureSettings;

use crate::capture::CapturePhase;
use crate::export::{BatchExporter, ExportBatch};
use crate::gl::{ContextId, ProgramId};
use crate::intercept::{GlCall, HookOutcome};
use crate::session::Session;
use crate::shadow::GraphicsContextShadow;
use crate::trace::{ProgramScript, ScriptedContext, TextureScript};

/// Keeps every submitted batch; clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct RecordingExporter {
    batches: Arc<Mutex<Vec<ExportBatch>>>,
}

impl RecordingExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<ExportBatch> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl BatchExporter for RecordingExporter {
    fn submit(&mut self, batch: ExportBatch) {
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(batch);
        }
    }
}

/// Headless harness: session, one scripted backend per context, exported batches.
pub struct TestHarness {
    pub session: Session<ScriptedContext>,
    backends: HashMap<ContextId, ScriptedContext>,
    exporter: RecordingExporter,
    next_host: u64,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_settings(CaptureSettings::default())
    }

    pub fn with_settings(settings: CaptureSettings) -> Self {
        let exporter = RecordingExporter::new();
        Self {
            session: Session::new(settings, Box::new(exporter.clone())),
            backends: HashMap::new(),
            exporter,
            next_host: 1,
        }
    }

    // ── Contexts ─────────────────────────────────────────────

    /// Request a `webgl` context from a fresh host object.
    pub fn create_context(&mut self) -> ContextId {
        let host = self.next_host;
        self.next_host += 1;
        self.create_context_for(host, "webgl")
            .unwrap_or(ContextId(u32::MAX))
    }

    /// Request a context of `kind` from host object `host`.
    pub fn create_context_for(&mut self, host: u64, kind: &str) -> Option<ContextId> {
        let id = self.session.install_context(host, kind)?.id();
        self.backends.entry(id).or_default();
        Some(id)
    }

    pub fn backend_mut(&mut self, id: ContextId) -> &mut ScriptedContext {
        self.backends.entry(id).or_default()
    }

    pub fn backend(&self, id: ContextId) -> Option<&ScriptedContext> {
        self.backends.get(&id)
    }

    /// Define a program on the context and make it current.
    pub fn use_program(&mut self, id: ContextId, program: ProgramScript) {
        let program_id: ProgramId = program.id;
        let backend = self.backend_mut(id);
        backend.define_program(program);
        backend.use_program(Some(program_id));
    }

    pub fn define_texture(&mut self, id: ContextId, texture: TextureScript) {
        self.backend_mut(id).define_texture(texture);
    }

    pub fn shadow(&self, id: ContextId) -> Option<&GraphicsContextShadow> {
        self.session.registry().get(id).map(|c| &c.shadow)
    }

    pub fn phase(&self, id: ContextId) -> Option<CapturePhase> {
        self.session.phase(id)
    }

    pub fn captured(&self, id: ContextId) -> usize {
        self.session
            .registry()
            .get(id)
            .map(|c| c.capture.batch().len())
            .unwrap_or(0)
    }

    // ── Calls ────────────────────────────────────────────────

    pub fn call(&mut self, id: ContextId, call: GlCall) -> HookOutcome {
        let backend = self.backends.entry(id).or_default();
        self.session.dispatch(id, backend, &call)
    }

    pub fn calls(&mut self, id: ContextId, calls: impl IntoIterator<Item = GlCall>) {
        for call in calls {
            self.call(id, call);
        }
    }

    /// Arm capture and run one frame boundary so `id` is capturing.
    pub fn start_capture(&mut self, id: ContextId) -> bool {
        self.session.arm();
        self.call(id, GlCall::Clear { mask: 0 });
        self.phase(id) == Some(CapturePhase::Capturing)
    }

    pub fn press_key(&mut self, key_code: u32, shift: bool) -> bool {
        self.session.on_key(key_code, shift)
    }

    // ── Results ──────────────────────────────────────────────

    pub fn batches(&self) -> Vec<ExportBatch> {
        self.exporter.batches()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_harness_start_capture() {
        let mut h = TestHarness::new();
        let ctx = h.create_context();
        assert_eq!(h.phase(ctx), Some(CapturePhase::Idle));
        assert!(h.start_capture(ctx));
    }

    #[test]
    fn test_harness_records_batches() {
        let mut h = TestHarness::new();
        let ctx = h.create_context();
        h.use_program(ctx, fixtures::position_program(1));
        h.calls(ctx, fixtures::float_attribute_calls(1, 0, 3, &fixtures::quad_positions()));
        h.start_capture(ctx);
        h.call(ctx, fixtures::draw_triangles(3));
        assert_eq!(h.captured(ctx), 1);

        h.call(ctx, fixtures::clear());
        let batches = h.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].context, ctx);
        assert_eq!(batches[0].meshes[0].name, "RIP0");
    }
}
