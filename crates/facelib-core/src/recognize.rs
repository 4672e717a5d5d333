//! Per-frame recognition: detect every face, embed it, match it.

use image::RgbImage;

use crate::error::LibraryError;
use crate::matcher::{EuclideanMatcher, Matcher};
use crate::monitor::PerfMonitor;
use crate::pipeline::{FacePipeline, FaceRegion};
use crate::shared::LibraryHandle;
use crate::types::MatchResult;

/// One detected face and the decision made for it.
#[derive(Debug, Clone)]
pub struct FaceMatch {
    pub region: FaceRegion,
    pub result: MatchResult,
}

/// Drives a [`FacePipeline`] and a [`Matcher`] over incoming frames.
///
/// Each frame is matched against a single library snapshot, so a reload that
/// lands mid-frame only takes effect on the next frame.
pub struct Recognizer<P, M = EuclideanMatcher> {
    pipeline: P,
    matcher: M,
    library: LibraryHandle,
    threshold: f32,
    monitor: PerfMonitor,
}

impl<P: FacePipeline> Recognizer<P> {
    pub fn new(pipeline: P, library: LibraryHandle, threshold: f32) -> Self {
        Self::with_matcher(pipeline, EuclideanMatcher, library, threshold)
    }
}

impl<P: FacePipeline, M: Matcher> Recognizer<P, M> {
    pub fn with_matcher(pipeline: P, matcher: M, library: LibraryHandle, threshold: f32) -> Self {
        Self {
            pipeline,
            matcher,
            library,
            threshold,
            monitor: PerfMonitor::new(),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn library(&self) -> &LibraryHandle {
        &self.library
    }

    pub fn monitor(&self) -> &PerfMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut PerfMonitor {
        &mut self.monitor
    }

    /// Recognize every face in `frame`, in detection order.
    ///
    /// Pipeline failures and query dimension mismatches abort the frame.
    pub fn recognize(&mut self, frame: &RgbImage) -> Result<Vec<FaceMatch>, LibraryError> {
        self.monitor.start_frame();
        let result = self.recognize_inner(frame);
        self.monitor.stop_frame();
        result
    }

    fn recognize_inner(&mut self, frame: &RgbImage) -> Result<Vec<FaceMatch>, LibraryError> {
        let library = self.library.snapshot();
        let pipeline = &mut self.pipeline;
        let monitor = &mut self.monitor;

        let faces = monitor.measure("detect", || pipeline.detect(frame))?;
        tracing::trace!(faces = faces.len(), "faces detected");

        let mut matches = Vec::with_capacity(faces.len());
        for region in faces {
            let chip = monitor.measure("align", || pipeline.align(frame, &region))?;
            let embedding = monitor.measure("embed", || pipeline.embed(&chip))?;
            let result = monitor.measure("match", || {
                self.matcher.find(&embedding, &library, self.threshold)
            })?;

            tracing::debug!(
                identity = ?result.identity,
                distance = ?result.distance,
                threshold = self.threshold,
                "face matched"
            );
            matches.push(FaceMatch { region, result });
        }

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::IdentityLibrary;
    use crate::pipeline::{FaceChip, PipelineError};
    use crate::types::{Embedding, Identity};
    use image::Rgb;

    /// Each non-black pixel in row 0 is one face; its color is the embedding.
    struct RowPipeline;

    impl FacePipeline for RowPipeline {
        fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, PipelineError> {
            Ok((0..image.width())
                .filter(|&x| image.get_pixel(x, 0).0 != [0, 0, 0])
                .map(|x| FaceRegion {
                    x: x as f32,
                    y: 0.0,
                    width: 1.0,
                    height: 1.0,
                    confidence: 1.0,
                })
                .collect())
        }

        fn align(
            &mut self,
            image: &RgbImage,
            face: &FaceRegion,
        ) -> Result<FaceChip, PipelineError> {
            Ok(FaceChip(RgbImage::from_pixel(1, 1, *image.get_pixel(face.x as u32, 0))))
        }

        fn embed(&mut self, chip: &FaceChip) -> Result<Embedding, PipelineError> {
            Ok(Embedding::new(chip.0.get_pixel(0, 0).0.iter().map(|&v| v as f32).collect()))
        }
    }

    /// Embeds into two dimensions, to provoke a mismatch against a 3-D library.
    struct ShortPipeline;

    impl FacePipeline for ShortPipeline {
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
            Ok(Embedding::new(vec![0.0, 0.0]))
        }
    }

    fn library() -> LibraryHandle {
        let mut lib = IdentityLibrary::new();
        lib.insert("alice", Embedding::new(vec![10.0, 20.0, 30.0])).unwrap();
        lib.insert("bob", Embedding::new(vec![200.0, 100.0, 50.0])).unwrap();
        LibraryHandle::new(lib)
    }

    fn frame(colors: &[[u8; 3]]) -> RgbImage {
        let mut img = RgbImage::new(colors.len() as u32, 1);
        for (x, c) in colors.iter().enumerate() {
            img.put_pixel(x as u32, 0, Rgb(*c));
        }
        img
    }

    #[test]
    fn test_recognizes_every_face() {
        let mut recognizer = Recognizer::new(RowPipeline, library(), 5.0);
        let matches = recognizer
            .recognize(&frame(&[[10, 20, 31], [0, 0, 0], [90, 90, 90], [200, 100, 50]]))
            .unwrap();

        let identities: Vec<&Identity> = matches.iter().map(|m| &m.result.identity).collect();
        assert_eq!(
            identities,
            vec![
                &Identity::Known("alice".into()),
                &Identity::Unknown,
                &Identity::Known("bob".into()),
            ]
        );
        assert_eq!(matches[2].region.x, 3.0);
    }

    #[test]
    fn test_records_stage_timings() {
        let mut recognizer = Recognizer::new(RowPipeline, library(), 5.0);
        recognizer.recognize(&frame(&[[10, 20, 30], [200, 100, 50]])).unwrap();
        recognizer.recognize(&frame(&[[0, 0, 0]])).unwrap();

        let monitor = recognizer.monitor();
        assert_eq!(monitor.frames().runs, 2);
        assert_eq!(monitor.task("detect").unwrap().runs, 2);
        assert_eq!(monitor.task("embed").unwrap().runs, 2);
        assert_eq!(monitor.task("match").unwrap().runs, 2);
    }

    #[test]
    fn test_reload_takes_effect_next_frame() {
        let handle = library();
        let mut recognizer = Recognizer::new(RowPipeline, handle.clone(), 5.0);
        let face = frame(&[[10, 20, 30]]);
        assert!(recognizer.recognize(&face).unwrap()[0].result.identity.is_known());

        handle.replace(IdentityLibrary::new());
        let after = recognizer.recognize(&face).unwrap();
        assert_eq!(after[0].result.identity, Identity::Unknown);
    }

    #[test]
    fn test_dimension_mismatch_is_surfaced() {
        let mut recognizer = Recognizer::new(ShortPipeline, library(), 5.0);
        let err = recognizer.recognize(&frame(&[[1, 1, 1]])).unwrap_err();
        assert!(matches!(
            err,
            LibraryError::DimensionMismatch { expected: 3, actual: 2 }
        ));
        assert_eq!(recognizer.monitor().frames().runs, 1);
    }
}
