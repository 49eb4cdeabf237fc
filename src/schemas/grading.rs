use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::ai_grading::EvaluationResult;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct EvaluateRequest {
    #[validate(length(min = 1, message = "question must not be empty"))]
    pub(crate) question: String,
    #[validate(length(min = 1, message = "correct_answer must not be empty"))]
    pub(crate) correct_answer: String,
    #[validate(length(min = 1, message = "student_answer must not be empty"))]
    pub(crate) student_answer: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct EvaluateResponse {
    pub(crate) result: EvaluationResult,
}

#[derive(Debug, Serialize)]
pub(crate) struct OcrResponse {
    pub(crate) text: String,
}
