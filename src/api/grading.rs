use axum::{
    extract::{Multipart, State},
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::validation::read_image_field;
use crate::core::state::AppState;
use crate::schemas::grading::{EvaluateRequest, EvaluateResponse, OcrResponse};
use crate::services::ai_grading::GradingRequest;
use crate::services::pipeline::{AnswerSheetImages, GradingOutcome};

pub(crate) async fn extract_text(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OcrResponse>, ApiError> {
    let mut image: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        if field.name() == Some("file") {
            image = Some(read_image_field(field, state.settings().storage()).await?);
        }
    }

    let image = image.ok_or_else(|| ApiError::BadRequest("File is required".to_string()))?;
    let text = state.pipeline().extractor().extract_text(&image).await?;

    Ok(Json(OcrResponse { text }))
}

pub(crate) async fn evaluate(
    State(state): State<AppState>,
    Json(payload): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let request =
        GradingRequest::new(payload.question, payload.correct_answer, payload.student_answer)?;
    let result = state.pipeline().grader().evaluate(&request).await?;

    Ok(Json(EvaluateResponse { result }))
}

/// All three sheets in one multipart request: `question`, `correct_answer`,
/// `student_answer`.
pub(crate) async fn grade(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<GradingOutcome>, ApiError> {
    let mut question = None;
    let mut correct_answer = None;
    let mut student_answer = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        let slot = match field.name() {
            Some("question") => &mut question,
            Some("correct_answer") => &mut correct_answer,
            Some("student_answer") => &mut student_answer,
            _ => continue,
        };
        *slot = Some(read_image_field(field, state.settings().storage()).await?);
    }

    let required = |image: Option<Vec<u8>>, name: &str| {
        image.ok_or_else(|| ApiError::BadRequest(format!("{name} image is required")))
    };
    let question = required(question, "question")?;
    let correct_answer = required(correct_answer, "correct_answer")?;
    let student_answer = required(student_answer, "student_answer")?;

    let outcome = state
        .pipeline()
        .grade_images(AnswerSheetImages {
            question: &question,
            correct_answer: &correct_answer,
            student_answer: &student_answer,
        })
        .await?;

    Ok(Json(outcome))
}
