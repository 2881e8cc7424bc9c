//! One capture session: settings, hooked contexts, and the trigger.

use std::collections::HashMap;

use shared::CaptureSettings;

use crate::backend::GlBackend;
use crate::capture::{CapturePhase, FrameCapture};
use crate::export::BatchExporter;
use crate::gl::ContextId;
use crate::intercept::{GlCall, HookCtx, HookOutcome, HookTable};
use crate::shadow::GraphicsContextShadow;

/// Context types the engine hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Webgl,
    Webgl2,
    ExperimentalWebgl,
}

impl ContextKind {
    /// Case-insensitive match against the `getContext` type string.
    pub fn parse(name: &str) -> Option<Self> {
        [Self::Webgl, Self::Webgl2, Self::ExperimentalWebgl]
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKind::Webgl => "webgl",
            ContextKind::Webgl2 => "webgl2",
            ContextKind::ExperimentalWebgl => "experimental-webgl",
        }
    }

    /// Kind to actually create for a request. Vertex output capture needs
    /// a WebGL2 context, so readback upgrades every request.
    pub fn for_request(name: &str, shader_readback: bool) -> Option<Self> {
        let kind = Self::parse(name)?;
        Some(if shader_readback {
            ContextKind::Webgl2
        } else {
            kind
        })
    }
}

/// Shadow state and frame state of one hooked context.
#[derive(Debug)]
pub struct ContextState {
    pub kind: ContextKind,
    pub shadow: GraphicsContextShadow,
    pub capture: FrameCapture,
}

/// Result of offering a host context to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installation {
    /// First sighting; the adapter must wrap the context's entry points
    New(ContextId),
    /// Already hooked; nothing to wrap
    Existing(ContextId),
}

impl Installation {
    pub fn id(&self) -> ContextId {
        match *self {
            Installation::New(id) | Installation::Existing(id) => id,
        }
    }
}

/// Host context identity → hooked context.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    by_host: HashMap<u64, ContextId>,
    contexts: HashMap<ContextId, ContextState>,
    next_id: u32,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host context. `host_key` identifies the host object; a
    /// repeated key returns the existing context.
    pub fn install(&mut self, host_key: u64, kind: ContextKind) -> Installation {
        if let Some(id) = self.by_host.get(&host_key) {
            return Installation::Existing(*id);
        }
        let id = ContextId(self.next_id);
        self.next_id += 1;
        self.by_host.insert(host_key, id);
        self.contexts.insert(
            id,
            ContextState {
                kind,
                shadow: GraphicsContextShadow::new(),
                capture: FrameCapture::new(),
            },
        );
        tracing::info!(?id, kind = kind.as_str(), "hooked context");
        Installation::New(id)
    }

    pub fn get(&self, id: ContextId) -> Option<&ContextState> {
        self.contexts.get(&id)
    }

    pub fn get_mut(&mut self, id: ContextId) -> Option<&mut ContextState> {
        self.contexts.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn any_capturing(&self) -> bool {
        self.contexts.values().any(|c| c.capture.is_capturing())
    }
}

/// Active settings plus a staged replacement.
///
/// Staged settings take effect at the next frame boundary so a draw never
/// sees a mix of old and new values.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    active: CaptureSettings,
    pending: Option<CaptureSettings>,
}

impl SessionConfig {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            active: settings,
            pending: None,
        }
    }

    pub fn active(&self) -> &CaptureSettings {
        &self.active
    }

    pub fn update(&mut self, settings: CaptureSettings) {
        self.pending = Some(settings);
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Promote staged settings. Returns `true` if anything changed.
    pub fn apply_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(settings) => {
                self.active = settings;
                true
            }
            None => false,
        }
    }
}

pub struct Session<B> {
    config: SessionConfig,
    armed: bool,
    registry: ContextRegistry,
    hooks: HookTable<B>,
    exporter: Box<dyn BatchExporter>,
}

impl<B: GlBackend> Session<B> {
    pub fn new(settings: CaptureSettings, exporter: Box<dyn BatchExporter>) -> Self {
        Self::with_hooks(settings, exporter, HookTable::with_defaults())
    }

    pub fn with_hooks(
        settings: CaptureSettings,
        exporter: Box<dyn BatchExporter>,
        hooks: HookTable<B>,
    ) -> Self {
        Self {
            config: SessionConfig::new(settings),
            armed: false,
            registry: ContextRegistry::new(),
            hooks,
            exporter,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        self.config.active()
    }

    pub fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    pub fn hooks_mut(&mut self) -> &mut HookTable<B> {
        &mut self.hooks
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    /// Offer a `getContext` result. `None` for context kinds the engine
    /// does not hook.
    pub fn install_context(&mut self, host_key: u64, requested: &str) -> Option<Installation> {
        let Some(kind) = ContextKind::for_request(requested, self.config.active().shader_readback)
        else {
            tracing::debug!(requested, "unsupported context kind");
            return None;
        };
        Some(self.registry.install(host_key, kind))
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Arm capture for the next frame unless a context is already capturing.
    pub fn arm(&mut self) -> bool {
        if self.registry.any_capturing() {
            tracing::debug!("capture already in progress");
            return false;
        }
        self.armed = true;
        tracing::info!("capture armed");
        true
    }

    /// Key press from the host; only the configured key without shift arms.
    pub fn on_key(&mut self, key_code: u32, shift: bool) -> bool {
        if !self.config.active().is_capture_key(key_code, shift) {
            return false;
        }
        self.arm()
    }

    pub fn phase(&self, context: ContextId) -> Option<CapturePhase> {
        let state = self.registry.get(context)?;
        Some(match state.capture.phase() {
            CapturePhase::Idle if self.armed => CapturePhase::ArmedForNextFrame,
            phase => phase,
        })
    }

    /// Run the hook for one intercepted call on `context`.
    pub fn dispatch(&mut self, context: ContextId, backend: &mut B, call: &GlCall) -> HookOutcome {
        if matches!(call, GlCall::Clear { .. }) && self.config.apply_pending() {
            tracing::info!("settings updated");
        }

        let Some(state) = self.registry.get_mut(context) else {
            tracing::debug!(?context, "call on unknown context");
            return HookOutcome::PassThrough;
        };

        let mut ctx = HookCtx {
            context,
            shadow: &mut state.shadow,
            capture: &mut state.capture,
            backend,
            settings: self.config.active(),
            armed: &mut self.armed,
            exporter: &mut *self.exporter,
        };
        self.hooks.dispatch(&mut ctx, call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::ScriptedContext;

    struct Discard;

    impl BatchExporter for Discard {
        fn submit(&mut self, _batch: crate::export::ExportBatch) {}
    }

    fn session(settings: CaptureSettings) -> Session<ScriptedContext> {
        Session::new(settings, Box::new(Discard))
    }

    #[test]
    fn test_context_kind_parse() {
        assert_eq!(ContextKind::parse("WebGL"), Some(ContextKind::Webgl));
        assert_eq!(ContextKind::parse("experimental-webgl"), Some(ContextKind::ExperimentalWebgl));
        assert_eq!(ContextKind::parse("2d"), None);
        assert_eq!(ContextKind::parse("webgpu"), None);
    }

    #[test]
    fn test_readback_forces_webgl2() {
        assert_eq!(ContextKind::for_request("webgl", true), Some(ContextKind::Webgl2));
        assert_eq!(ContextKind::for_request("webgl", false), Some(ContextKind::Webgl));
        assert_eq!(ContextKind::for_request("bitmaprenderer", true), None);
    }

    #[test]
    fn test_install_is_idempotent() {
        let mut s = session(CaptureSettings::default());
        let first = s.install_context(7, "webgl").unwrap();
        let again = s.install_context(7, "webgl").unwrap();
        assert!(matches!(first, Installation::New(_)));
        assert_eq!(again, Installation::Existing(first.id()));
        assert_eq!(s.registry().len(), 1);
        assert!(s.install_context(8, "2d").is_none());
    }

    #[test]
    fn test_key_trigger() {
        let mut s = session(CaptureSettings::default());
        let id = s.install_context(1, "webgl").unwrap().id();
        assert!(!s.on_key(45, true));
        assert!(!s.on_key(46, false));
        assert_eq!(s.phase(id), Some(CapturePhase::Idle));
        assert!(s.on_key(45, false));
        assert_eq!(s.phase(id), Some(CapturePhase::ArmedForNextFrame));
    }

    #[test]
    fn test_arm_refused_while_capturing() {
        let mut s = session(CaptureSettings::default());
        let id = s.install_context(1, "webgl").unwrap().id();
        let mut backend = ScriptedContext::new();
        s.arm();
        s.dispatch(id, &mut backend, &GlCall::Clear { mask: 0 });
        assert_eq!(s.phase(id), Some(CapturePhase::Capturing));
        assert!(!s.is_armed());
        assert!(!s.arm());
    }

    #[test]
    fn test_settings_apply_at_frame_boundary() {
        let mut s = session(CaptureSettings::default());
        let id = s.install_context(1, "webgl").unwrap().id();
        let mut backend = ScriptedContext::new();

        s.config_mut().update(CaptureSettings {
            capture_key_code: 80,
            ..Default::default()
        });
        assert_eq!(s.settings().capture_key_code, 45);

        s.dispatch(id, &mut backend, &GlCall::Viewport { x: 0, y: 0, width: 1, height: 1 });
        assert_eq!(s.settings().capture_key_code, 45);

        s.dispatch(id, &mut backend, &GlCall::Clear { mask: 0 });
        assert_eq!(s.settings().capture_key_code, 80);
        assert!(!s.config_mut().has_pending());
    }

    #[test]
    fn test_unknown_context_passes_through() {
        let mut s = session(CaptureSettings::default());
        let mut backend = ScriptedContext::new();
        let outcome = s.dispatch(ContextId(99), &mut backend, &GlCall::Clear { mask: 0 });
        assert_eq!(outcome, HookOutcome::PassThrough);
    }
}
