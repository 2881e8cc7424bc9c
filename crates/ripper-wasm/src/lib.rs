//! Browser entry points for the capture engine.

mod backend;
mod decode;
mod handles;
mod hooks;
mod sink;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Once;

use glripper::gl::ContextId;
use glripper::session::ContextKind;
use glripper::{HookOutcome, Installation, Session};
use js_sys::Array;
use shared::CaptureSettings;
use wasm_bindgen::prelude::*;

use backend::WasmBackend;
use handles::Handles;
use sink::SpawnExporter;

/// Hidden element the extension loader fills with the stored settings.
const SETTINGS_ELEMENT_ID: &str = "glripper-settings";

thread_local! {
    static ENGINE: RefCell<Option<Engine>> = const { RefCell::new(None) };
}

static LOGGING: Once = Once::new();

pub(crate) struct Engine {
    pub(crate) session: Session<WasmBackend>,
    handles: Rc<Handles>,
    backends: HashMap<ContextId, WasmBackend>,
}

impl Engine {
    fn new(settings: CaptureSettings) -> Self {
        Self {
            session: Session::new(settings, Box::new(SpawnExporter)),
            handles: Rc::new(Handles::new()),
            backends: HashMap::new(),
        }
    }

    pub(crate) fn install(&mut self, gl: &JsValue, kind: ContextKind) -> Option<Installation> {
        let host_key = u64::from(self.handles.id(gl)?);
        let installation = self.session.install_context(host_key, kind.as_str())?;
        if let Installation::New(context) = installation {
            self.backends
                .insert(context, WasmBackend::new(gl.clone(), self.handles.clone()));
        }
        Some(installation)
    }

    pub(crate) fn dispatch(&mut self, context: ContextId, entry_point: &str, args: &Array) -> HookOutcome {
        let call = decode::decode_call(entry_point, args, &self.handles);
        let Some(backend) = self.backends.get_mut(&context) else {
            return HookOutcome::PassThrough;
        };
        self.session.dispatch(context, backend, &call)
    }

    pub(crate) fn dispatch_created(&mut self, context: ContextId, entry_point: &str, created: &JsValue) {
        let Some(call) = decode::decode_created(entry_point, created, &self.handles) else {
            return;
        };
        if let Some(backend) = self.backends.get_mut(&context) {
            self.session.dispatch(context, backend, &call);
        }
    }
}

/// Run `f` on the engine. `None` when not installed or already borrowed
/// (a call made by the engine itself).
pub(crate) fn with_engine<R>(f: impl FnOnce(&mut Engine) -> R) -> Option<R> {
    ENGINE.with(|cell| {
        let mut engine = cell.try_borrow_mut().ok()?;
        engine.as_mut().map(f)
    })
}

fn init_logging(debug: bool) {
    LOGGING.call_once(|| {
        let level = if debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };
        tracing_wasm::set_as_global_default_with_config(
            tracing_wasm::WASMLayerConfigBuilder::new()
                .set_max_level(level)
                .build(),
        );
    });
}

fn settings_from_document() -> Option<String> {
    web_sys::window()?
        .document()?
        .get_element_by_id(SETTINGS_ELEMENT_ID)?
        .text_content()
}

fn parse_settings(json: &str) -> Result<CaptureSettings, JsError> {
    CaptureSettings::from_json(json).map_err(|e| JsError::new(&format!("invalid settings: {e}")))
}

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Hook `getContext` and the capture key. Settings come from the argument,
/// else from the loader's hidden element, else the defaults.
#[wasm_bindgen]
pub fn install(settings_json: Option<String>) -> Result<(), JsError> {
    let settings = match settings_json.or_else(settings_from_document) {
        Some(json) => parse_settings(&json)?,
        None => CaptureSettings::default(),
    };
    init_logging(settings.debug_logging);

    let installed = ENGINE.with(|cell| {
        let mut engine = cell.borrow_mut();
        if engine.is_some() {
            return false;
        }
        *engine = Some(Engine::new(settings));
        true
    });
    if !installed {
        return Err(JsError::new("already installed"));
    }

    hooks::patch_get_context().map_err(|e| JsError::new(&format!("getContext hook: {e:?}")))?;
    hooks::listen_for_keys().map_err(|e| JsError::new(&format!("key listener: {e:?}")))?;
    tracing::info!("glripper installed");
    Ok(())
}

/// Capture the next frame. `false` while a capture is in progress.
#[wasm_bindgen]
pub fn arm_capture() -> bool {
    with_engine(|engine| engine.session.arm()).unwrap_or(false)
}

/// Replace the settings; they take effect at the next frame boundary.
#[wasm_bindgen]
pub fn update_settings(settings_json: &str) -> Result<(), JsError> {
    let settings = parse_settings(settings_json)?;
    with_engine(|engine| engine.session.config_mut().update(settings))
        .ok_or_else(|| JsError::new("not installed"))
}

/// Number of hooked contexts.
#[wasm_bindgen]
pub fn hooked_contexts() -> usize {
    with_engine(|engine| engine.session.registry().len()).unwrap_or(0)
}
