//! Single-archive export.

use std::io::{Cursor, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{decode_data_uri, ExportPlan};
use crate::error::Result;

/// `<ISO-8601 UTC timestamp>-rip.zip`, millisecond precision.
pub fn archive_name(now: DateTime<Utc>) -> String {
    format!("{}-rip.zip", now.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// A packed archive and the number of assets that could not be added.
#[derive(Debug)]
pub struct Archive {
    pub bytes: Vec<u8>,
    pub skipped: usize,
}

/// Pack every file of the plan into one deflated zip. A texture whose data
/// cannot be decoded is logged and left out.
pub fn build_archive(plan: &ExportPlan) -> Result<Archive> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for model in &plan.models {
        zip.start_file(model.obj_filename(), options)?;
        zip.write_all(model.obj.as_bytes())?;
        if let Some(mtl) = &model.mtl {
            zip.start_file(model.mtl_filename(), options)?;
            zip.write_all(mtl.as_bytes())?;
        }
    }

    let mut skipped = 0;
    for texture in &plan.textures {
        let png = match decode_data_uri(&texture.url) {
            Ok(png) => png,
            Err(e) => {
                tracing::error!(file = %texture.filename, "texture left out of archive: {e}");
                skipped += 1;
                continue;
            }
        };
        zip.start_file(texture.filename.as_str(), options)?;
        zip.write_all(&png)?;
    }

    Ok(Archive {
        bytes: zip.finish()?.into_inner(),
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::plan;
    use crate::fixtures;
    use chrono::TimeZone;
    use std::io::Read;

    #[test]
    fn test_archive_name_is_iso_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 6).unwrap();
        assert_eq!(archive_name(now), "2024-03-09T14:05:06.000Z-rip.zip");
    }

    #[test]
    fn test_archive_contents() {
        let tex = fixtures::texture("t0", "data:image/png;base64,AQID");
        let meshes = vec![
            fixtures::triangle("RIP0").with_textures(vec![tex.clone()]),
            fixtures::triangle("RIP1").with_textures(vec![tex]),
        ];
        let archive = build_archive(&plan(&meshes)).unwrap();
        assert_eq!(archive.skipped, 0);
        let bytes = archive.bytes;

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(names, vec!["RIP0.mtl", "RIP0.obj", "RIP1.mtl", "RIP1.obj", "t0.png"]);

        let mut png = Vec::new();
        archive.by_name("t0.png").unwrap().read_to_end(&mut png).unwrap();
        assert_eq!(png, vec![1, 2, 3]);

        let mut obj = String::new();
        archive.by_name("RIP0.obj").unwrap().read_to_string(&mut obj).unwrap();
        assert!(obj.starts_with("mtllib RIP0.mtl\n"));
    }

    #[test]
    fn test_archive_skips_bad_texture_url() {
        let meshes = vec![
            fixtures::triangle("RIP0")
                .with_textures(vec![fixtures::texture("good", "data:image/png;base64,AQID")]),
            fixtures::triangle("RIP1")
                .with_textures(vec![fixtures::texture("bad", "blob:https://site/1")]),
        ];
        let archive = build_archive(&plan(&meshes)).unwrap();
        assert_eq!(archive.skipped, 1);

        let zip = zip::ZipArchive::new(Cursor::new(archive.bytes)).unwrap();
        let mut names: Vec<String> = zip.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["RIP0.mtl", "RIP0.obj", "RIP1.mtl", "RIP1.obj", "good.png"]
        );
    }
}
