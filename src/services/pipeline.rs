use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::services::ai_grading::{AiGradingService, EvaluationResult, GradingRequest};
use crate::services::errors::GradingError;
use crate::services::vision_ocr::TextExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OcrStage {
    Question,
    CorrectAnswer,
    StudentAnswer,
}

impl OcrStage {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::CorrectAnswer => "correct_answer",
            Self::StudentAnswer => "student_answer",
        }
    }
}

impl fmt::Display for OcrStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub(crate) enum PipelineError {
    #[error("text extraction failed for {stage} image: {error}")]
    Ocr { stage: OcrStage, error: GradingError },
    #[error(transparent)]
    Evaluation(GradingError),
}

impl PipelineError {
    pub(crate) fn cause(&self) -> &GradingError {
        match self {
            Self::Ocr { error, .. } => error,
            Self::Evaluation(source) => source,
        }
    }
}

pub(crate) struct AnswerSheetImages<'a> {
    pub(crate) question: &'a [u8],
    pub(crate) correct_answer: &'a [u8],
    pub(crate) student_answer: &'a [u8],
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GradingOutcome {
    pub(crate) question_text: String,
    pub(crate) correct_answer_text: String,
    pub(crate) student_answer_text: String,
    pub(crate) result: EvaluationResult,
}

/// OCR of the three sheets, in order, followed by one evaluation.
#[derive(Clone)]
pub(crate) struct GradingPipeline {
    extractor: TextExtractor,
    grader: AiGradingService,
}

impl GradingPipeline {
    pub(crate) fn new(extractor: TextExtractor, grader: AiGradingService) -> Self {
        Self { extractor, grader }
    }

    pub(crate) fn extractor(&self) -> &TextExtractor {
        &self.extractor
    }

    pub(crate) fn grader(&self) -> &AiGradingService {
        &self.grader
    }

    pub(crate) async fn grade_images(
        &self,
        images: AnswerSheetImages<'_>,
    ) -> Result<GradingOutcome, PipelineError> {
        let evaluation_id = Uuid::new_v4();
        self.run(images)
            .instrument(tracing::info_span!("grade_images", evaluation_id = %evaluation_id))
            .await
    }

    async fn run(&self, images: AnswerSheetImages<'_>) -> Result<GradingOutcome, PipelineError> {
        // Sequential: every text is needed before the prompt can be built.
        let question_text = self.extract(OcrStage::Question, images.question).await?;
        let correct_answer_text =
            self.extract(OcrStage::CorrectAnswer, images.correct_answer).await?;
        let student_answer_text =
            self.extract(OcrStage::StudentAnswer, images.student_answer).await?;

        let request =
            GradingRequest::new(&question_text, &correct_answer_text, &student_answer_text)
                .map_err(PipelineError::Evaluation)?;
        let result = self.grader.evaluate(&request).await.map_err(PipelineError::Evaluation)?;

        tracing::info!("Answer sheet graded");

        Ok(GradingOutcome { question_text, correct_answer_text, student_answer_text, result })
    }

    async fn extract(&self, stage: OcrStage, image: &[u8]) -> Result<String, PipelineError> {
        tracing::info!(stage = stage.as_str(), "Extracting text");
        self.extractor
            .extract_text(image)
            .await
            .map_err(|error| PipelineError::Ocr { stage, error })
    }
}
