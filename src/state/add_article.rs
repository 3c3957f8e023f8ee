//! The add-article flow.
//!
//! Source photos are segmented one at a time. Each detected subject is shown
//! for review: the user can rotate it, tighten or broaden the mask threshold,
//! discard it, save it as a new article, or attach it to an existing one.
//! Photos without subjects and unreadable photos are skipped with a notice. A
//! segmenter that is not ready aborts the whole flow.

use std::path::{Path, PathBuf};

use anyhow::Result;
use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::{clamp_threshold, ImageQuality, Settings};
use crate::error::SegmentationError;
use crate::models::ArticleWithImages;
use crate::segmentation::{Rotation, SegmentedImage, SubjectSegmenter};

use super::{count_label, ChecklistState, Notice, NoticeKind, Reaction};

const THRESHOLD_STEP: f32 = 0.1;

#[derive(Debug, Clone, Default)]
pub enum AddArticleDialog {
    #[default]
    None,
    ConfirmExit,
    AttachArticle(ChecklistState<ArticleWithImages>),
}

/// The subject currently under review.
#[derive(Debug, Clone)]
pub struct Review {
    pub segmented: SegmentedImage,
    pub subject: usize,
    pub rotation: Rotation,
    pub threshold: f32,
    /// Article chosen in the attach dialog for this subject.
    pub attach_to: Option<i64>,
}

impl Review {
    fn new(segmented: SegmentedImage, subject: usize, threshold: f32) -> Self {
        Self {
            segmented,
            subject,
            rotation: Rotation::None,
            threshold,
            attach_to: None,
        }
    }

    /// The subject as it would be saved right now.
    pub fn preview(&self) -> Option<RgbaImage> {
        self.segmented
            .extract(self.subject, self.threshold, self.rotation)
    }
}

#[derive(Debug, Clone)]
pub enum Stage {
    /// Waiting for the current source to be segmented. `job` is set once it
    /// has been handed to the worker.
    Segmenting { job: Option<u64> },
    Reviewing(Box<Review>),
    Finished,
}

#[derive(Debug)]
pub struct AddArticleState {
    sources: Vec<PathBuf>,
    index: usize,
    target_article: Option<i64>,
    default_threshold: f32,
    quality: ImageQuality,
    stage: Stage,
    pub dialog: AddArticleDialog,
    saved: usize,
}

impl AddArticleState {
    pub fn new(sources: Vec<PathBuf>, target_article: Option<i64>, settings: &Settings) -> Self {
        let stage = if sources.is_empty() {
            Stage::Finished
        } else {
            Stage::Segmenting { job: None }
        };
        Self {
            sources,
            index: 0,
            target_article,
            default_threshold: clamp_threshold(settings.segmentation_threshold),
            quality: settings.image_quality,
            stage,
            dialog: AddArticleDialog::None,
            saved: 0,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn review(&self) -> Option<&Review> {
        match &self.stage {
            Stage::Reviewing(review) => Some(&**review),
            _ => None,
        }
    }

    fn review_mut(&mut self) -> Option<&mut Review> {
        match &mut self.stage {
            Stage::Reviewing(review) => Some(&mut **review),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.stage, Stage::Finished)
    }

    pub fn target_article(&self) -> Option<i64> {
        self.target_article
    }

    pub fn saved(&self) -> usize {
        self.saved
    }

    /// 1-based position of the current source, and the total.
    pub fn progress(&self) -> (usize, usize) {
        ((self.index + 1).min(self.sources.len()), self.sources.len())
    }

    pub fn current_source(&self) -> Option<&Path> {
        self.sources.get(self.index).map(PathBuf::as_path)
    }

    /// The source that still needs to be sent to a segmenter.
    pub fn pending_source(&self) -> Option<&Path> {
        match self.stage {
            Stage::Segmenting { job: None } => self.current_source(),
            _ => None,
        }
    }

    pub fn mark_submitted(&mut self, job_id: u64) {
        if let Stage::Segmenting { job } = &mut self.stage {
            *job = Some(job_id);
        }
    }

    /// Accept a worker result. Results for any other job are stale and
    /// dropped.
    pub fn accept_result(
        &mut self,
        job_id: u64,
        outcome: Result<SegmentedImage, SegmentationError>,
    ) -> Reaction {
        match self.stage {
            Stage::Segmenting { job: Some(expected) } if expected == job_id => {
                self.handle_outcome(outcome)
            }
            _ => {
                debug!(job_id, "dropping stale segmentation result");
                Reaction::none()
            }
        }
    }

    /// Segment the pending source synchronously.
    pub fn segment_with(&mut self, segmenter: &dyn SubjectSegmenter) -> Reaction {
        let Some(path) = self.pending_source().map(Path::to_path_buf) else {
            return Reaction::none();
        };
        let outcome = segmenter.segment(&path);
        self.handle_outcome(outcome)
    }

    fn handle_outcome(&mut self, outcome: Result<SegmentedImage, SegmentationError>) -> Reaction {
        match outcome {
            Ok(segmented) if segmented.subject_count() > 0 => {
                debug!(
                    source = %segmented.source.display(),
                    subjects = segmented.subject_count(),
                    "reviewing subjects"
                );
                self.stage = Stage::Reviewing(Box::new(Review::new(
                    segmented,
                    0,
                    self.default_threshold,
                )));
                Reaction::none()
            }
            Ok(segmented) => {
                info!(source = %segmented.source.display(), "no subject found");
                self.next_source(Some(Notice::error("No subject found.")))
            }
            Err(err @ (SegmentationError::NotFound(_) | SegmentationError::NotRecognized(_))) => {
                warn!(error = %err, "skipping source image");
                self.next_source(Some(Notice::error("Image not found or not recognized.")))
            }
            Err(SegmentationError::ModuleNotReady) => {
                warn!("segmentation not ready, leaving add-article flow");
                self.stage = Stage::Finished;
                self.dialog = AddArticleDialog::None;
                Reaction::back().with_notice(Notice::error(
                    "Segmentation model still loading. Try again in a moment.",
                ))
            }
        }
    }

    pub fn rotate_clockwise(&mut self) {
        if let Some(review) = self.review_mut() {
            review.rotation = review.rotation.clockwise();
        }
    }

    pub fn rotate_counter_clockwise(&mut self) {
        if let Some(review) = self.review_mut() {
            review.rotation = review.rotation.counter_clockwise();
        }
    }

    /// Raise the threshold so fewer uncertain pixels survive.
    pub fn tighten(&mut self) {
        if let Some(review) = self.review_mut() {
            review.threshold = clamp_threshold(review.threshold + THRESHOLD_STEP);
        }
    }

    /// Lower the threshold so more uncertain pixels survive.
    pub fn broaden(&mut self) {
        if let Some(review) = self.review_mut() {
            review.threshold = clamp_threshold(review.threshold - THRESHOLD_STEP);
        }
    }

    pub fn discard(&mut self) -> Reaction {
        if self.review().is_none() {
            return Reaction::none();
        }
        self.next_subject(None)
    }

    /// Extract the reviewed subject and store it, either as a new article or
    /// as another image of the attach target.
    pub fn save(&mut self, catalog: &mut Catalog) -> Result<Reaction> {
        let Some(review) = self.review() else {
            return Ok(Reaction::none());
        };
        let Some(image) = review.preview() else {
            return Ok(self.next_subject(None));
        };
        let notice = match review.attach_to.or(self.target_article) {
            Some(article_id) => {
                catalog.add_article_image(article_id, &image, self.quality)?;
                Notice::info(format!("Added image to article #{article_id}."))
            }
            None => {
                let article_id = catalog.add_article(&image, self.quality)?;
                Notice::info(format!("Saved article #{article_id}."))
            }
        };
        self.saved += 1;
        Ok(self.next_subject(Some(notice)))
    }

    pub fn open_attach(&mut self, catalog: &Catalog) -> Result<Reaction> {
        if self.review().is_none() {
            return Ok(Reaction::none());
        }
        let articles = catalog.articles()?;
        if articles.is_empty() {
            return Ok(Reaction::notice(Notice::error("There are no articles to attach to yet.")));
        }
        self.dialog = AddArticleDialog::AttachArticle(ChecklistState::new(articles));
        Ok(Reaction::none())
    }

    /// Use the article under the dialog cursor as the save target.
    pub fn confirm_attach(&mut self) -> Reaction {
        let chosen = match &self.dialog {
            AddArticleDialog::AttachArticle(list) => list.current().map(|a| a.article_id),
            _ => None,
        };
        self.dialog = AddArticleDialog::None;
        let Some(article_id) = chosen else {
            return Reaction::none();
        };
        if let Some(review) = self.review_mut() {
            review.attach_to = Some(article_id);
        }
        Reaction::notice(Notice::info(format!(
            "Saving will add this image to article #{article_id}."
        )))
    }

    /// Forget the attach choice so saving creates a new article again.
    pub fn clear_attach(&mut self) {
        if let Some(review) = self.review_mut() {
            review.attach_to = None;
        }
    }

    pub fn request_exit(&mut self) {
        self.dialog = AddArticleDialog::ConfirmExit;
    }

    pub fn confirm_exit(&mut self) -> Reaction {
        self.dialog = AddArticleDialog::None;
        self.stage = Stage::Finished;
        info!(saved = self.saved, "add-article flow abandoned");
        Reaction::back().with_notice(Notice::info(self.summary()))
    }

    pub fn dismiss_dialog(&mut self) {
        self.dialog = AddArticleDialog::None;
    }

    fn next_subject(&mut self, notice: Option<Notice>) -> Reaction {
        let next = match &mut self.stage {
            Stage::Reviewing(review) if review.subject + 1 < review.segmented.subject_count() => {
                review.subject += 1;
                review.rotation = Rotation::None;
                review.threshold = self.default_threshold;
                review.attach_to = None;
                true
            }
            _ => false,
        };
        if next {
            return notice.map(Reaction::notice).unwrap_or_default();
        }
        self.next_source(notice)
    }

    fn next_source(&mut self, notice: Option<Notice>) -> Reaction {
        self.index += 1;
        if self.index < self.sources.len() {
            self.stage = Stage::Segmenting { job: None };
            return notice.map(Reaction::notice).unwrap_or_default();
        }

        self.stage = Stage::Finished;
        info!(saved = self.saved, sources = self.sources.len(), "add-article flow finished");
        let summary = self.summary();
        let text = match notice {
            Some(notice) if notice.kind == NoticeKind::Error => {
                format!("{} {summary}", notice.text)
            }
            _ => summary,
        };
        Reaction::back().with_notice(Notice::info(text))
    }

    fn summary(&self) -> String {
        format!("Saved {}.", count_label(self.saved, "image", "images"))
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;
    use crate::catalog::testing::catalog;
    use crate::segmentation::testing::{canvas_with_rect, FixedSegmenter};
    use crate::segmentation::ThresholdSegmenter;
    use crate::state::Navigation;

    fn settings() -> Settings {
        Settings {
            image_quality: ImageQuality::Low,
            ..Settings::default()
        }
    }

    fn two_subjects() -> SegmentedImage {
        let mut image = canvas_with_rect(5, 5, 10, 10);
        for x in 40..90 {
            for y in 30..60 {
                image.put_pixel(x, y, Rgba([20, 20, 200, 255]));
            }
        }
        ThresholdSegmenter::default().segment_image("two.png".into(), image)
    }

    fn empty_result() -> SegmentedImage {
        ThresholdSegmenter::default()
            .segment_image("blank.png".into(), RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255])))
    }

    #[test]
    fn dialog_defaults_to_none() {
        let state = AddArticleState::new(vec!["a.png".into()], None, &settings());
        assert!(matches!(state.dialog, AddArticleDialog::None));
        assert_eq!(state.pending_source(), Some(Path::new("a.png")));
    }

    #[test]
    fn no_subject_advances_to_next_source() {
        let mut state =
            AddArticleState::new(vec!["a.png".into(), "b.png".into()], None, &settings());
        let reaction = state.segment_with(&FixedSegmenter(Ok(empty_result())));
        assert!(reaction.navigation.is_none());
        assert_eq!(reaction.notice.unwrap().text, "No subject found.");
        assert_eq!(state.pending_source(), Some(Path::new("b.png")));
    }

    #[test]
    fn unreadable_source_is_skipped() {
        let mut state =
            AddArticleState::new(vec!["a.png".into(), "b.png".into()], None, &settings());
        let missing = FixedSegmenter(Err(SegmentationError::NotFound("a.png".into())));
        let reaction = state.segment_with(&missing);
        assert_eq!(
            reaction.notice.unwrap().text,
            "Image not found or not recognized."
        );
        assert_eq!(state.progress(), (2, 2));
    }

    #[test]
    fn not_ready_aborts_the_flow() {
        let mut state =
            AddArticleState::new(vec!["a.png".into(), "b.png".into()], None, &settings());
        let reaction = state.segment_with(&FixedSegmenter(Err(SegmentationError::ModuleNotReady)));
        assert_eq!(reaction.navigation, Some(Navigation::Back));
        assert!(state.is_finished());
        assert_eq!(state.pending_source(), None);
    }

    #[test]
    fn stale_worker_results_are_dropped() {
        let mut state = AddArticleState::new(vec!["a.png".into()], None, &settings());
        state.mark_submitted(7);
        assert!(state
            .accept_result(6, Err(SegmentationError::ModuleNotReady))
            .is_none());
        assert!(!state.is_finished());

        state.accept_result(7, Ok(two_subjects()));
        assert!(state.review().is_some());
    }

    #[test]
    fn review_controls_are_clamped() {
        let mut state = AddArticleState::new(vec!["a.png".into()], None, &settings());
        state.segment_with(&FixedSegmenter(Ok(two_subjects())));
        assert_eq!(state.review().unwrap().threshold, 0.5);

        for _ in 0..10 {
            state.tighten();
        }
        assert_eq!(state.review().unwrap().threshold, 0.9);
        for _ in 0..20 {
            state.broaden();
        }
        assert_eq!(state.review().unwrap().threshold, 0.1);

        state.rotate_counter_clockwise();
        assert_eq!(state.review().unwrap().rotation, Rotation::ThreeQuarters);
        state.rotate_clockwise();
        assert_eq!(state.review().unwrap().rotation, Rotation::None);
    }

    #[test]
    fn saving_every_subject_creates_articles_and_finishes() {
        let (_dir, mut catalog) = catalog();
        let mut state = AddArticleState::new(vec!["a.png".into()], None, &settings());
        state.segment_with(&FixedSegmenter(Ok(two_subjects())));

        state.rotate_clockwise();
        let first = state.save(&mut catalog).unwrap();
        assert!(first.navigation.is_none());
        let review = state.review().unwrap();
        assert_eq!((review.subject, review.rotation), (1, Rotation::None));

        let done = state.save(&mut catalog).unwrap();
        assert_eq!(done.navigation, Some(Navigation::Back));
        assert_eq!(done.notice.unwrap().text, "Saved 2 images.");
        assert_eq!(catalog.articles().unwrap().len(), 2);

        // The larger subject came first and was rotated a quarter turn.
        let saved = catalog.articles().unwrap();
        let oldest = saved.last().unwrap();
        let stored = image::open(oldest.images.first().unwrap()).unwrap();
        assert_eq!((stored.width(), stored.height()), (30, 50));
    }

    #[test]
    fn target_article_receives_images() {
        let (_dir, mut catalog) = catalog();
        let article_id = catalog
            .add_article(&RgbaImage::new(4, 4), ImageQuality::Low)
            .unwrap();
        let mut state = AddArticleState::new(vec!["a.png".into()], Some(article_id), &settings());
        state.segment_with(&FixedSegmenter(Ok(two_subjects())));
        state.save(&mut catalog).unwrap();
        state.discard();

        assert!(state.is_finished());
        assert_eq!(catalog.articles().unwrap().len(), 1);
        assert_eq!(catalog.article(article_id).unwrap().unwrap().image_count(), 2);
    }

    #[test]
    fn attach_dialog_redirects_a_single_save() {
        let (_dir, mut catalog) = catalog();
        let existing = catalog
            .add_article(&RgbaImage::new(4, 4), ImageQuality::Low)
            .unwrap();
        let mut state = AddArticleState::new(vec!["a.png".into()], None, &settings());
        state.segment_with(&FixedSegmenter(Ok(two_subjects())));

        state.open_attach(&catalog).unwrap();
        assert!(matches!(state.dialog, AddArticleDialog::AttachArticle(_)));
        state.confirm_attach();
        assert_eq!(state.review().unwrap().attach_to, Some(existing));
        state.save(&mut catalog).unwrap();
        state.save(&mut catalog).unwrap();

        assert_eq!(catalog.article(existing).unwrap().unwrap().image_count(), 2);
        assert_eq!(catalog.articles().unwrap().len(), 2);
    }

    #[test]
    fn exit_confirmation_leaves_the_flow() {
        let mut state = AddArticleState::new(vec!["a.png".into()], None, &settings());
        state.request_exit();
        assert!(matches!(state.dialog, AddArticleDialog::ConfirmExit));
        let reaction = state.confirm_exit();
        assert_eq!(reaction.navigation, Some(Navigation::Back));
        assert!(state.is_finished());
    }
}
