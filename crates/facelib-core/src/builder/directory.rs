//! Directory library format: one subdirectory of face images per identity.
//!
//! Identities and their images are visited in lexical filename order. The
//! first image of an identity that yields exactly one face provides that
//! identity's embedding; the rest of the folder is not read.

use std::fs;
use std::path::{Path, PathBuf};

use super::BuildReport;
use crate::error::{LibraryError, SkipReason};
use crate::library::IdentityLibrary;
use crate::pipeline::FacePipeline;
use crate::types::Embedding;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Candidate images of one identity, in visit order.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityImages {
    pub name: String,
    pub images: Vec<PathBuf>,
}

/// List identities and their candidate images without running a pipeline.
pub fn scan_directory(root: &Path) -> Result<Vec<IdentityImages>, LibraryError> {
    if !root.is_dir() {
        tracing::error!(path = %root.display(), "face library directory does not exist");
        return Err(LibraryError::SourceNotFound(root.to_path_buf()));
    }

    let mut identities = Vec::new();
    for dir in sorted_entries(root)? {
        if !dir.is_dir() {
            continue;
        }
        let name = file_name(&dir);
        let images = match sorted_entries(&dir) {
            Ok(paths) => paths.into_iter().filter(|p| is_image(p)).collect(),
            Err(e) => {
                tracing::warn!(identity = %name, error = %e, "cannot read identity directory");
                Vec::new()
            }
        };
        identities.push(IdentityImages { name, images });
    }

    Ok(identities)
}

/// Build a library by running `pipeline` over a directory of identity folders.
pub fn build_from_directory<P: FacePipeline + ?Sized>(
    root: &Path,
    pipeline: &mut P,
) -> Result<(IdentityLibrary, BuildReport), LibraryError> {
    let identities = scan_directory(root)?;

    let mut library = IdentityLibrary::new();
    let mut report = BuildReport::new(root);

    for identity in identities {
        if identity.name.trim().is_empty() {
            tracing::warn!(identity = ?identity.name, "blank identity name, folder skipped");
            report.skipped_identities.push(identity.name);
            continue;
        }
        tracing::debug!(
            identity = %identity.name,
            images = identity.images.len(),
            "processing identity"
        );

        let mut found = None;
        for image_path in &identity.images {
            report.records_seen += 1;
            match embed_image(image_path, pipeline) {
                Ok(embedding) => {
                    found = Some(embedding);
                    break;
                }
                Err(reason) => report.skip(image_path.display().to_string(), reason),
            }
        }

        match found {
            Some(embedding) => {
                // Name and values are already checked; only a dimension change fails here.
                library.insert(identity.name.as_str(), embedding)?;
                report.entries_added += 1;
                tracing::debug!(identity = %identity.name, "identity enrolled");
            }
            None => {
                tracing::warn!(identity = %identity.name, "no usable image, identity skipped");
                report.skipped_identities.push(identity.name);
            }
        }
    }

    report.log();
    Ok((library, report))
}

/// Decode one image and turn its single face into an embedding.
fn embed_image<P: FacePipeline + ?Sized>(
    path: &Path,
    pipeline: &mut P,
) -> Result<Embedding, SkipReason> {
    let image = image::open(path)
        .map_err(|e| SkipReason::Decode(e.to_string()))?
        .to_rgb8();

    let faces = pipeline
        .detect(&image)
        .map_err(|e| SkipReason::Pipeline(e.to_string()))?;
    let face = match faces.as_slice() {
        [] => return Err(SkipReason::NoFace),
        [face] => face,
        _ => return Err(SkipReason::AmbiguousDetection { faces: faces.len() }),
    };

    let chip = pipeline
        .align(&image, face)
        .map_err(|e| SkipReason::Pipeline(e.to_string()))?;
    let embedding = pipeline
        .embed(&chip)
        .map_err(|e| SkipReason::Pipeline(e.to_string()))?;

    if embedding.dim() == 0 {
        return Err(SkipReason::Malformed("embedding has no components".into()));
    }
    if let Some(i) = embedding.values.iter().position(|v| !v.is_finite()) {
        return Err(SkipReason::Malformed(format!(
            "embedding component {i} is not finite"
        )));
    }
    Ok(embedding)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, LibraryError> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

fn is_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{FaceChip, FaceRegion, PipelineError};
    use image::{Rgb, RgbImage};
    use std::collections::VecDeque;

    /// Pixel (0,0) red channel = number of faces; green 255 = detector error.
    /// Face `i` embeds pixel (i, 0) as `[r, g, b]`.
    struct PixelPipeline;

    impl FacePipeline for PixelPipeline {
        fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, PipelineError> {
            let Rgb([count, flag, _]) = *image.get_pixel(0, 0);
            if flag == 255 {
                return Err(PipelineError::Detection("detector crashed".into()));
            }
            Ok((1..=count)
                .map(|i| FaceRegion {
                    x: i as f32,
                    y: 0.0,
                    width: 1.0,
                    height: 1.0,
                    confidence: 0.9,
                })
                .collect())
        }

        fn align(
            &mut self,
            image: &RgbImage,
            face: &FaceRegion,
        ) -> Result<FaceChip, PipelineError> {
            let px = *image.get_pixel(face.x as u32, 0);
            Ok(FaceChip(RgbImage::from_pixel(1, 1, px)))
        }

        fn embed(&mut self, chip: &FaceChip) -> Result<Embedding, PipelineError> {
            let Rgb([r, g, b]) = *chip.0.get_pixel(0, 0);
            Ok(Embedding::new(vec![r as f32, g as f32, b as f32]))
        }
    }

    /// One face per image; embeddings are handed out in call order.
    struct ScriptedPipeline {
        embeddings: VecDeque<Vec<f32>>,
    }

    impl ScriptedPipeline {
        fn new(embeddings: &[&[f32]]) -> Self {
            Self {
                embeddings: embeddings.iter().map(|e| e.to_vec()).collect(),
            }
        }
    }

    impl FacePipeline for ScriptedPipeline {
        fn detect(&mut self, _: &RgbImage) -> Result<Vec<FaceRegion>, PipelineError> {
            Ok(vec![FaceRegion {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
                confidence: 1.0,
            }])
        }

        fn align(&mut self, image: &RgbImage, _: &FaceRegion) -> Result<FaceChip, PipelineError> {
            Ok(FaceChip(image.clone()))
        }

        fn embed(&mut self, _: &FaceChip) -> Result<Embedding, PipelineError> {
            self.embeddings
                .pop_front()
                .map(Embedding::new)
                .ok_or_else(|| PipelineError::Embedding("script exhausted".into()))
        }
    }

    fn write_blank(dir: &Path, files: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        for file in files {
            RgbImage::new(1, 1).save(dir.join(file)).unwrap();
        }
    }

    fn write_face(path: &Path, faces: u8, color: [u8; 3]) {
        let mut img = RgbImage::new(4, 1);
        img.put_pixel(0, 0, Rgb([faces, 0, 0]));
        for x in 1..4 {
            img.put_pixel(x, 0, Rgb(color));
        }
        img.save(path).unwrap();
    }

    #[test]
    fn test_first_good_image_wins() {
        let root = tempfile::tempdir().unwrap();
        let alice = root.path().join("alice");
        fs::create_dir(&alice).unwrap();
        write_face(&alice.join("1.png"), 0, [1, 1, 1]);
        write_face(&alice.join("2.png"), 1, [10, 20, 30]);
        write_face(&alice.join("3.png"), 1, [99, 99, 99]);

        let (lib, report) = build_from_directory(root.path(), &mut PixelPipeline).unwrap();
        assert_eq!(lib.len(), 1);
        assert_eq!(lib.entries()[0].name, "alice");
        assert_eq!(lib.entries()[0].embedding.as_slice(), &[10.0, 20.0, 30.0]);
        assert_eq!(report.records_seen, 2, "3.png must not be read");
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, SkipReason::NoFace);
    }

    #[test]
    fn test_ambiguous_and_failing_images_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        let bob = root.path().join("bob");
        fs::create_dir(&bob).unwrap();
        write_face(&bob.join("a.png"), 2, [1, 1, 1]);
        let mut broken = RgbImage::new(2, 1);
        broken.put_pixel(0, 0, Rgb([1, 255, 0]));
        broken.save(bob.join("b.png")).unwrap();
        fs::write(bob.join("c.jpg"), b"not really a jpeg").unwrap();
        write_face(&bob.join("d.png"), 1, [4, 5, 6]);

        let (lib, report) = build_from_directory(root.path(), &mut PixelPipeline).unwrap();
        assert_eq!(lib.len(), 1);
        assert_eq!(lib.entries()[0].embedding.as_slice(), &[4.0, 5.0, 6.0]);

        let reasons: Vec<&SkipReason> = report.skipped.iter().map(|s| &s.reason).collect();
        assert_eq!(reasons[0], &SkipReason::AmbiguousDetection { faces: 2 });
        assert!(matches!(reasons[1], SkipReason::Pipeline(_)));
        assert!(matches!(reasons[2], SkipReason::Decode(_)));
    }

    #[test]
    fn test_identity_without_usable_image() {
        let root = tempfile::tempdir().unwrap();
        for name in ["carol", "alice", "empty"] {
            fs::create_dir(root.path().join(name)).unwrap();
        }
        write_face(&root.path().join("alice/1.png"), 1, [1, 2, 3]);
        write_face(&root.path().join("carol/1.png"), 1, [7, 8, 9]);
        fs::write(root.path().join("empty/notes.txt"), b"no images here").unwrap();

        let (lib, report) = build_from_directory(root.path(), &mut PixelPipeline).unwrap();
        let names: Vec<&str> = lib.names().collect();
        assert_eq!(names, vec!["alice", "carol"], "identities visited in lexical order");
        assert_eq!(report.skipped_identities, vec!["empty".to_string()]);
        assert_eq!(report.records_seen, 2, "non-image files are not records");
    }

    #[test]
    fn test_files_at_root_are_ignored() {
        let root = tempfile::tempdir().unwrap();
        write_face(&root.path().join("stray.png"), 1, [1, 2, 3]);
        let (lib, report) = build_from_directory(root.path(), &mut PixelPipeline).unwrap();
        assert!(lib.is_empty());
        assert_eq!(report.records_seen, 0);
    }

    #[test]
    fn test_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");
        let err = build_from_directory(&missing, &mut PixelPipeline).unwrap_err();
        assert!(matches!(err, LibraryError::SourceNotFound(p) if p == missing));
    }

    #[test]
    fn test_non_finite_embedding_falls_through_to_next_image() {
        let root = tempfile::tempdir().unwrap();
        write_blank(&root.path().join("alice"), &["1.png", "2.png"]);
        write_blank(&root.path().join("bob"), &["1.png"]);

        let mut pipeline = ScriptedPipeline::new(&[&[f32::NAN, 0.0], &[1.0, 2.0], &[3.0, 4.0]]);
        let (lib, report) = build_from_directory(root.path(), &mut pipeline).unwrap();

        let names: Vec<&str> = lib.names().collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(lib.entries()[0].embedding.as_slice(), &[1.0, 2.0]);
        assert_eq!(report.records_seen, 3);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].location.ends_with("1.png"));
        assert!(report.skipped[0].reason.is_malformed());
    }

    #[test]
    fn test_empty_embedding_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        write_blank(&root.path().join("alice"), &["1.png", "2.png"]);

        let mut pipeline = ScriptedPipeline::new(&[&[], &[5.0, 6.0]]);
        let (lib, report) = build_from_directory(root.path(), &mut pipeline).unwrap();

        assert_eq!(lib.len(), 1);
        assert_eq!(lib.entries()[0].embedding.as_slice(), &[5.0, 6.0]);
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::Malformed("embedding has no components".into())
        );
    }

    #[test]
    fn test_blank_identity_name_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        write_blank(&root.path().join(" "), &["1.png"]);
        write_blank(&root.path().join("bob"), &["1.png"]);

        let mut pipeline = ScriptedPipeline::new(&[&[1.0, 2.0]]);
        let (lib, report) = build_from_directory(root.path(), &mut pipeline).unwrap();

        let names: Vec<&str> = lib.names().collect();
        assert_eq!(names, vec!["bob"]);
        assert_eq!(report.skipped_identities, vec![" ".to_string()]);
        assert_eq!(report.records_seen, 1, "images of a blank-named folder are not read");
    }

    #[test]
    fn test_dimension_change_between_identities_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        write_blank(&root.path().join("alice"), &["1.png"]);
        write_blank(&root.path().join("bob"), &["1.png"]);

        let mut pipeline = ScriptedPipeline::new(&[&[1.0, 2.0], &[1.0, 2.0, 3.0]]);
        let err = build_from_directory(root.path(), &mut pipeline).unwrap_err();
        assert!(matches!(
            err,
            LibraryError::DimensionMismatch { expected: 2, actual: 3 }
        ));
    }

    #[test]
    fn test_scan_lists_images_in_order() {
        let root = tempfile::tempdir().unwrap();
        let dave = root.path().join("dave");
        fs::create_dir(&dave).unwrap();
        for file in ["b.JPG", "a.png", "c.txt", "d.jpeg"] {
            fs::write(dave.join(file), b"").unwrap();
        }

        let scan = scan_directory(root.path()).unwrap();
        assert_eq!(scan.len(), 1);
        let files: Vec<String> = scan[0].images.iter().map(|p| file_name(p)).collect();
        assert_eq!(files, vec!["a.png", "b.JPG", "d.jpeg"]);
    }
}
