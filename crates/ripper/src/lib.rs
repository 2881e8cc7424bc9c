// Library crate: the capture engine plus the headless harness used by the
// integration tests and the replay binary. Host adapters (browser, replay)
// live outside and talk to it through `Session` and `GlBackend`.

pub mod backend;
pub mod capture;
#[cfg(not(target_arch = "wasm32"))]
pub mod config;
pub mod error;
pub mod export;
pub mod fixtures;
pub mod gl;
pub mod harness;
pub mod intercept;
pub mod mesh;
pub mod session;
pub mod shadow;
pub mod texture;
pub mod trace;
pub mod validation;

pub use backend::GlBackend;
pub use capture::CapturePhase;
pub use error::{Result, RipperError};
pub use export::{export_batch, AssetSink, BatchExporter, ExportBatch};
pub use intercept::{GlCall, HookOutcome, HookTable, HOOKED_ENTRY_POINTS};
pub use mesh::{Mesh, Texture};
pub use session::{ContextKind, Installation, Session};
