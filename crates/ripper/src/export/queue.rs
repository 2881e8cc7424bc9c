//! Paced, bounded-concurrency writer for individual assets.
//!
//! Models and textures run as two lanes side by side. Within a lane, items
//! are written in chunks of `concurrency` and the sink is given a pause
//! between chunks. A failed item is logged and the lane moves on.

use futures::future::join_all;

use super::{AssetSink, ExportOptions, ExportPlan, ModelFiles, TextureFile};
use crate::error::Result;

/// Files written and failed by one export run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub written: usize,
    pub failed: usize,
}

impl ExportReport {
    fn merge(self, other: Self) -> Self {
        Self {
            written: self.written + other.written,
            failed: self.failed + other.failed,
        }
    }
}

enum LaneItem {
    Model(ModelFiles),
    Texture(TextureFile),
}

impl LaneItem {
    fn label(&self) -> &str {
        match self {
            LaneItem::Model(m) => &m.name,
            LaneItem::Texture(t) => &t.filename,
        }
    }

    /// Files this item produces.
    fn file_count(&self) -> usize {
        match self {
            LaneItem::Model(m) => 1 + m.mtl.is_some() as usize,
            LaneItem::Texture(_) => 1,
        }
    }

    async fn write<S: AssetSink>(&self, sink: &S) -> Result<()> {
        match self {
            LaneItem::Model(model) => {
                sink.write_text(&model.obj_filename(), &model.obj).await?;
                if let Some(mtl) = &model.mtl {
                    sink.write_text(&model.mtl_filename(), mtl).await?;
                }
                Ok(())
            }
            LaneItem::Texture(texture) => sink.write_image(&texture.filename, &texture.url).await,
        }
    }
}

pub struct ExportQueue {
    options: ExportOptions,
}

impl ExportQueue {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    pub async fn run<S: AssetSink>(&self, sink: &S, plan: ExportPlan) -> ExportReport {
        let models = plan.models.into_iter().map(LaneItem::Model).collect();
        let textures = plan.textures.into_iter().map(LaneItem::Texture).collect();

        let (models, textures) = futures::join!(
            self.run_lane(sink, "models", models),
            self.run_lane(sink, "textures", textures)
        );
        let report = models.merge(textures);
        tracing::info!(written = report.written, failed = report.failed, "export finished");
        report
    }

    async fn run_lane<S: AssetSink>(
        &self,
        sink: &S,
        lane: &str,
        items: Vec<LaneItem>,
    ) -> ExportReport {
        let mut report = ExportReport::default();
        let concurrency = self.options.concurrency.max(1);

        for (i, chunk) in items.chunks(concurrency).enumerate() {
            if i > 0 {
                sink.pause(self.options.pacing).await;
            }
            let results = join_all(chunk.iter().map(|item| item.write(sink))).await;
            for (item, result) in chunk.iter().zip(results) {
                match result {
                    Ok(()) => report.written += item.file_count(),
                    Err(e) => {
                        tracing::error!(lane, asset = item.label(), "export failed: {e}");
                        report.failed += 1;
                    }
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{plan, MemorySink};
    use crate::fixtures;
    use std::time::Duration;

    fn options(concurrency: usize) -> ExportOptions {
        ExportOptions {
            download_zip: false,
            pacing: Duration::from_millis(1),
            concurrency,
        }
    }

    #[tokio::test]
    async fn test_models_written_in_capture_order() {
        let meshes: Vec<_> = (0..3).map(|i| fixtures::triangle(&format!("RIP{i}"))).collect();
        let sink = MemorySink::new();

        let report = ExportQueue::new(options(1)).run(&sink, plan(&meshes)).await;

        assert_eq!(report, ExportReport { written: 3, failed: 0 });
        assert_eq!(sink.filenames(), vec!["RIP0.obj", "RIP1.obj", "RIP2.obj"]);
        assert_eq!(sink.pause_count(), 2);
    }

    #[tokio::test]
    async fn test_chunking_controls_pauses() {
        let meshes: Vec<_> = (0..5).map(|i| fixtures::triangle(&format!("RIP{i}"))).collect();
        let sink = MemorySink::new();
        ExportQueue::new(options(2)).run(&sink, plan(&meshes)).await;
        // chunks of 2: [0,1] [2,3] [4]
        assert_eq!(sink.pause_count(), 2);
    }

    #[tokio::test]
    async fn test_mtl_follows_obj() {
        let meshes = vec![fixtures::triangle("RIP0")
            .with_textures(vec![fixtures::texture("t", "data:image/png;base64,AQID")])];
        let sink = MemorySink::new();
        ExportQueue::new(options(1)).run(&sink, plan(&meshes)).await;

        let names = sink.filenames();
        let obj = names.iter().position(|n| n == "RIP0.obj").unwrap();
        let mtl = names.iter().position(|n| n == "RIP0.mtl").unwrap();
        assert!(obj < mtl);
        assert_eq!(sink.bytes("t.png"), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_siblings() {
        let meshes = vec![
            fixtures::triangle("RIP0").with_textures(vec![
                fixtures::texture("bad", "not-a-data-uri"),
                fixtures::texture("good", "data:image/png;base64,AQID"),
            ]),
            fixtures::triangle("RIP1"),
        ];
        let sink = MemorySink::new().failing_on("RIP0.obj");

        let report = ExportQueue::new(options(1)).run(&sink, plan(&meshes)).await;

        assert_eq!(report.failed, 2);
        assert!(sink.filenames().contains(&"RIP1.obj".to_string()));
        assert!(sink.filenames().contains(&"good.png".to_string()));
    }
}
