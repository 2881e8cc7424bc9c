//! Turning a frozen batch into files.
//!
//! A batch becomes an [`ExportPlan`]: one OBJ (plus MTL when textured) per
//! mesh and one PNG per distinct texture URL. The plan is then written either
//! as a single zip archive or asset by asset through an [`AssetSink`].

pub mod archive;
#[cfg(not(target_arch = "wasm32"))]
pub mod fs;
pub mod memory;
pub mod queue;

use std::collections::HashSet;
use std::time::Duration;

use base64::Engine as _;
use shared::CaptureSettings;

use crate::error::{Result, RipperError};
use crate::gl::ContextId;
use crate::mesh::{build_mtl, build_obj, Mesh};

pub use archive::{archive_name, build_archive, Archive};
#[cfg(not(target_arch = "wasm32"))]
pub use fs::FsSink;
pub use memory::MemorySink;
pub use queue::{ExportQueue, ExportReport};

/// Export settings frozen with the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub download_zip: bool,
    pub pacing: Duration,
    pub concurrency: usize,
}

impl ExportOptions {
    pub fn from_settings(settings: &CaptureSettings) -> Self {
        Self {
            download_zip: settings.download_zip,
            pacing: Duration::from_millis(settings.export_pacing_ms),
            concurrency: settings.export_concurrency.max(1),
        }
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from_settings(&CaptureSettings::default())
    }
}

/// Meshes captured during one frame, moved out of the capture state.
#[derive(Debug, Clone)]
pub struct ExportBatch {
    pub context: ContextId,
    pub meshes: Vec<Mesh>,
    pub options: ExportOptions,
}

/// Receives batches at frame boundaries. Must not block the caller.
pub trait BatchExporter {
    fn submit(&mut self, batch: ExportBatch);
}

#[cfg(not(target_arch = "wasm32"))]
impl BatchExporter for tokio::sync::mpsc::UnboundedSender<ExportBatch> {
    fn submit(&mut self, batch: ExportBatch) {
        if self.send(batch).is_err() {
            tracing::error!("export channel closed, batch dropped");
        }
    }
}

/// Text files for one mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFiles {
    pub name: String,
    pub obj: String,
    pub mtl: Option<String>,
}

impl ModelFiles {
    pub fn obj_filename(&self) -> String {
        format!("{}.obj", self.name)
    }

    pub fn mtl_filename(&self) -> String {
        format!("{}.mtl", self.name)
    }
}

/// One distinct texture image.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureFile {
    /// Includes the `.png` extension
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportPlan {
    /// In capture order
    pub models: Vec<ModelFiles>,
    /// In first-reference order, deduplicated by URL
    pub textures: Vec<TextureFile>,
}

impl ExportPlan {
    pub fn file_count(&self) -> usize {
        self.models
            .iter()
            .map(|m| 1 + m.mtl.is_some() as usize)
            .sum::<usize>()
            + self.textures.len()
    }
}

pub fn plan(meshes: &[Mesh]) -> ExportPlan {
    let models = meshes
        .iter()
        .map(|mesh| ModelFiles {
            name: mesh.name.clone(),
            obj: build_obj(mesh),
            mtl: (!mesh.textures.is_empty()).then(|| build_mtl(mesh)),
        })
        .collect();

    let mut seen = HashSet::new();
    let mut textures = Vec::new();
    for texture in meshes.iter().flat_map(|m| m.textures.iter()) {
        if texture.url.is_empty() || !seen.insert(texture.url.as_str()) {
            continue;
        }
        textures.push(TextureFile {
            filename: format!("{}.png", texture.filename),
            url: texture.url.clone(),
        });
    }

    ExportPlan { models, textures }
}

/// Byte sink for exported files.
///
/// Futures are not required to be `Send`; the browser sink runs on the
/// page's event loop.
#[allow(async_fn_in_trait)]
pub trait AssetSink {
    async fn write_text(&self, filename: &str, content: &str) -> Result<()>;

    /// Fetch or decode `url` and write the image bytes.
    async fn write_image(&self, filename: &str, url: &str) -> Result<()>;

    async fn write_blob(&self, filename: &str, bytes: Vec<u8>) -> Result<()>;

    async fn pause(&self, duration: Duration);
}

/// Decode the payload of a base64 `data:` URI.
pub fn decode_data_uri(url: &str) -> Result<Vec<u8>> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| RipperError::InvalidDataUri(truncate(url)))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| RipperError::InvalidDataUri(truncate(url)))?;
    if !header.ends_with(";base64") {
        return Err(RipperError::InvalidDataUri(truncate(url)));
    }
    Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
}

fn truncate(url: &str) -> String {
    url.chars().take(40).collect()
}

/// Write a batch through `sink` according to its frozen options.
pub async fn export_batch<S: AssetSink>(sink: &S, batch: ExportBatch) -> ExportReport {
    let plan = plan(&batch.meshes);
    tracing::info!(
        context = ?batch.context,
        meshes = batch.meshes.len(),
        files = plan.file_count(),
        zip = batch.options.download_zip,
        "exporting batch"
    );

    if batch.options.download_zip {
        let name = archive_name(chrono::Utc::now());
        let archive = match build_archive(&plan) {
            Ok(archive) => archive,
            Err(e) => {
                tracing::error!(file = %name, "archive export failed: {e}");
                return ExportReport {
                    written: 0,
                    failed: 1,
                };
            }
        };
        let skipped = archive.skipped;
        return match sink.write_blob(&name, archive.bytes).await {
            Ok(()) => ExportReport {
                written: 1,
                failed: skipped,
            },
            Err(e) => {
                tracing::error!(file = %name, "archive export failed: {e}");
                ExportReport {
                    written: 0,
                    failed: 1 + skipped,
                }
            }
        };
    }

    ExportQueue::new(batch.options).run(sink, plan).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_plan_dedups_textures_by_url() {
        let shared_tex = fixtures::texture("a", "data:image/png;base64,AAAA");
        let other = fixtures::texture("b", "data:image/png;base64,BBBB");
        let meshes = vec![
            fixtures::triangle("RIP0").with_textures(vec![shared_tex.clone()]),
            fixtures::triangle("RIP1").with_textures(vec![shared_tex, other]),
            fixtures::triangle("RIP2"),
        ];

        let plan = plan(&meshes);
        assert_eq!(plan.models.len(), 3);
        assert!(plan.models[0].mtl.is_some());
        assert!(plan.models[2].mtl.is_none());
        let names: Vec<_> = plan.textures.iter().map(|t| t.filename.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
        assert_eq!(plan.file_count(), 3 + 2 + 2);
    }

    #[test]
    fn test_plan_skips_empty_urls() {
        let meshes = vec![fixtures::triangle("RIP0").with_textures(vec![fixtures::texture("x", "")])];
        assert!(plan(&meshes).textures.is_empty());
    }

    #[test]
    fn test_decode_data_uri() {
        assert_eq!(decode_data_uri("data:image/png;base64,AQID").unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            decode_data_uri("https://example.com/a.png"),
            Err(RipperError::InvalidDataUri(_))
        ));
        assert!(matches!(
            decode_data_uri("data:text/plain,hello"),
            Err(RipperError::InvalidDataUri(_))
        ));
        assert!(matches!(
            decode_data_uri("data:image/png;base64,@@@"),
            Err(RipperError::Encoding(_))
        ));
    }

    #[test]
    fn test_options_clamp_concurrency() {
        let settings = CaptureSettings {
            export_concurrency: 0,
            export_pacing_ms: 20,
            ..Default::default()
        };
        let options = ExportOptions::from_settings(&settings);
        assert_eq!(options.concurrency, 1);
        assert_eq!(options.pacing, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_export_batch_zip_mode() {
        let sink = MemorySink::new();
        let batch = ExportBatch {
            context: ContextId(0),
            meshes: vec![fixtures::triangle("RIP0")],
            options: ExportOptions {
                download_zip: true,
                ..Default::default()
            },
        };
        let report = export_batch(&sink, batch).await;
        assert_eq!(report.written, 1);
        let names = sink.filenames();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with("-rip.zip"));
    }

    #[tokio::test]
    async fn test_export_batch_zip_keeps_models_when_texture_fails() {
        let sink = MemorySink::new();
        let batch = ExportBatch {
            context: ContextId(0),
            meshes: vec![
                fixtures::triangle("RIP0"),
                fixtures::triangle("RIP1").with_textures(vec![fixtures::texture("t", "blob:x")]),
            ],
            options: ExportOptions {
                download_zip: true,
                ..Default::default()
            },
        };
        let report = export_batch(&sink, batch).await;
        assert_eq!(report, ExportReport { written: 1, failed: 1 });

        let names = sink.filenames();
        assert_eq!(names.len(), 1);
        let bytes = sink.bytes(&names[0]).unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut entries: Vec<String> = archive.file_names().map(String::from).collect();
        entries.sort();
        assert_eq!(entries, vec!["RIP0.obj", "RIP1.mtl", "RIP1.obj"]);
    }
}
