//! Patching `getContext` and the context entry points.
//!
//! Each patched function is a small JS trampoline that forwards `this`, the
//! arguments and the real function to a Rust closure. The trampoline's
//! `toString` is the real function's, bound, so source inspection sees the
//! native function.

use glripper::gl::ContextId;
use glripper::session::ContextKind;
use glripper::{HookOutcome, Installation, HOOKED_ENTRY_POINTS};
use js_sys::{Array, Function, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::KeyboardEvent;

use crate::{decode, with_engine};

type HookFn = dyn FnMut(JsValue, Array, Function) -> JsValue;

const TRAMPOLINE: &str =
    "return function () { return hook(this, Array.prototype.slice.call(arguments), original); };";

fn wrap(original: &Function, hook: &Closure<HookFn>) -> Result<Function, JsValue> {
    let factory = Function::new_with_args("hook, original", TRAMPOLINE);
    let wrapper = factory
        .call2(&JsValue::NULL, hook.as_ref(), original)?
        .dyn_into::<Function>()?;
    hide(&wrapper, original)?;
    Ok(wrapper)
}

fn hide(wrapper: &Function, original: &Function) -> Result<(), JsValue> {
    let to_string = Reflect::get(original, &JsValue::from_str("toString"))?.dyn_into::<Function>()?;
    Reflect::set(wrapper, &JsValue::from_str("toString"), &to_string.bind(original))?;
    Ok(())
}

/// Call the real function; exceptions propagate to the page unchanged.
fn forward(original: &Function, this: &JsValue, args: &Array) -> JsValue {
    match original.apply(this, args) {
        Ok(value) => value,
        Err(e) => wasm_bindgen::throw_val(e),
    }
}

/// Replace `HTMLCanvasElement.prototype.getContext`.
pub fn patch_get_context() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let class = Reflect::get(&window, &JsValue::from_str("HTMLCanvasElement"))?;
    let prototype = Reflect::get(&class, &JsValue::from_str("prototype"))?;
    let original = Reflect::get(&prototype, &JsValue::from_str("getContext"))?.dyn_into::<Function>()?;

    let hook = Closure::wrap(Box::new(on_get_context) as Box<HookFn>);
    let wrapper = wrap(&original, &hook)?;
    Reflect::set(&prototype, &JsValue::from_str("getContext"), &wrapper)?;
    hook.forget();
    Ok(())
}

fn on_get_context(canvas: JsValue, args: Array, original: Function) -> JsValue {
    let requested = args.get(0).as_string().unwrap_or_default();
    let kind = with_engine(|engine| {
        ContextKind::for_request(&requested, engine.session.settings().shader_readback)
    })
    .flatten();
    let Some(kind) = kind else {
        tracing::debug!(requested = %requested, "context not hooked");
        return forward(&original, &canvas, &args);
    };

    args.set(0, JsValue::from_str(kind.as_str()));
    let gl = forward(&original, &canvas, &args);
    if gl.is_null() || gl.is_undefined() {
        return gl;
    }

    if let Some(Some(Installation::New(context))) = with_engine(|engine| engine.install(&gl, kind)) {
        if let Err(e) = hook_context(&gl, context) {
            tracing::warn!(?context, error = ?e, "failed to hook context");
        }
    }
    gl
}

/// Wrap every entry point the context has. WebGL1 contexts lack some.
fn hook_context(gl: &JsValue, context: ContextId) -> Result<(), JsValue> {
    for &name in HOOKED_ENTRY_POINTS {
        let Ok(original) = Reflect::get(gl, &JsValue::from_str(name)).and_then(|f| f.dyn_into::<Function>())
        else {
            continue;
        };
        let hook = Closure::wrap(Box::new(move |this: JsValue, args: Array, original: Function| {
            on_call(context, name, this, args, original)
        }) as Box<HookFn>);
        let wrapper = wrap(&original, &hook)?;
        Reflect::set(gl, &JsValue::from_str(name), &wrapper)?;
        hook.forget();
    }
    Ok(())
}

fn on_call(context: ContextId, name: &'static str, this: JsValue, args: Array, original: Function) -> JsValue {
    if decode::is_create(name) {
        let created = forward(&original, &this, &args);
        with_engine(|engine| engine.dispatch_created(context, name, &created));
        return created;
    }

    // `None` while the engine is busy: its own calls go straight through.
    let outcome = with_engine(|engine| engine.dispatch(context, name, &args)).unwrap_or_default();
    match outcome {
        HookOutcome::PassThrough => forward(&original, &this, &args),
        HookOutcome::Suppress => JsValue::UNDEFINED,
    }
}

/// Arm capture from the configured key.
pub fn listen_for_keys() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let listener = Closure::wrap(Box::new(move |event: KeyboardEvent| {
        with_engine(|engine| engine.session.on_key(event.key_code(), event.shift_key()));
    }) as Box<dyn FnMut(KeyboardEvent)>);
    window.add_event_listener_with_callback("keydown", listener.as_ref().unchecked_ref())?;
    listener.forget();
    Ok(())
}
