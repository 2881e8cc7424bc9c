//! Download sink: every asset becomes a click on a temporary anchor.

use std::time::Duration;

use glripper::error::{Result, RipperError};
use glripper::export::{AssetSink, BatchExporter, ExportBatch};
use js_sys::{Array, Promise, Uint8Array};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

/// Object URLs outlive their download click by this long.
const REVOKE_DELAY_MS: i32 = 60_000;

fn js_error(value: JsValue) -> RipperError {
    RipperError::Sink(format!("{value:?}"))
}

#[derive(Debug, Default)]
pub struct BrowserSink;

impl BrowserSink {
    pub fn new() -> Self {
        Self
    }

    fn click_download(&self, filename: &str, href: &str) -> Result<()> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| RipperError::Sink("no document".into()))?;
        let body = document
            .body()
            .ok_or_else(|| RipperError::Sink("no document body".into()))?;
        let anchor = document
            .create_element("a")
            .map_err(js_error)?
            .dyn_into::<HtmlAnchorElement>()
            .map_err(|_| RipperError::Sink("anchor element".into()))?;
        anchor.set_href(href);
        anchor.set_download(filename);

        // Firefox only follows clicks on attached anchors.
        body.append_child(&anchor).map_err(js_error)?;
        anchor.click();
        anchor.remove();
        Ok(())
    }

    fn download_blob(&self, filename: &str, parts: &JsValue, mime: &str) -> Result<()> {
        let options = BlobPropertyBag::new();
        options.set_type(mime);
        let blob = Blob::new_with_u8_array_sequence_and_options(parts, &options).map_err(js_error)?;
        let url = Url::create_object_url_with_blob(&blob).map_err(js_error)?;
        let clicked = self.click_download(filename, &url);
        revoke_later(url);
        clicked
    }
}

/// The download resolves the object URL asynchronously after the click,
/// so it is released only once the browser has had time to fetch it.
fn revoke_later(url: String) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let revoke = Closure::once_into_js(move || {
        if let Err(e) = Url::revoke_object_url(&url) {
            tracing::debug!(error = ?e, "revokeObjectURL failed");
        }
    });
    if let Err(e) = window.set_timeout_with_callback_and_timeout_and_arguments_0(
        revoke.unchecked_ref(),
        REVOKE_DELAY_MS,
    ) {
        tracing::debug!(error = ?e, "setTimeout failed; object URL kept");
    }
}

impl AssetSink for BrowserSink {
    async fn write_text(&self, filename: &str, content: &str) -> Result<()> {
        let parts: Array = std::iter::once(JsValue::from_str(content)).collect();
        self.download_blob(filename, &parts, "text/plain")
    }

    async fn write_image(&self, filename: &str, url: &str) -> Result<()> {
        self.click_download(filename, url)
    }

    async fn write_blob(&self, filename: &str, bytes: Vec<u8>) -> Result<()> {
        let data = Uint8Array::from(bytes.as_slice());
        let parts: Array = std::iter::once(JsValue::from(data)).collect();
        self.download_blob(filename, &parts, "application/zip")
    }

    async fn pause(&self, duration: Duration) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let ms = duration.as_millis().min(i32::MAX as u128) as i32;
        let promise = Promise::new(&mut |resolve, _reject| {
            if let Err(e) = window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms) {
                tracing::debug!(error = ?e, "setTimeout failed");
                let _ = resolve.call0(&JsValue::NULL);
            }
        });
        let _ = JsFuture::from(promise).await;
    }
}

/// Runs each batch on the browser event loop.
pub struct SpawnExporter;

impl BatchExporter for SpawnExporter {
    fn submit(&mut self, batch: ExportBatch) {
        wasm_bindgen_futures::spawn_local(async move {
            let report = glripper::export_batch(&BrowserSink::new(), batch).await;
            if report.failed > 0 {
                tracing::warn!(failed = report.failed, written = report.written, "export incomplete");
            }
        });
    }
}
