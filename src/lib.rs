pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::path::Path;

use anyhow::Context;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::services::ai_grading::AiGradingService;
use crate::services::pipeline::{AnswerSheetImages, GradingPipeline};
use crate::services::vision_ocr::TextExtractor;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let pipeline = build_pipeline(&settings)?;
    let state = AppState::new(settings, pipeline);
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        contract = state.settings().grading().contract.as_str(),
        "Answer grader API listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await?;

    Ok(())
}

/// Grades three local image files and prints the outcome as JSON.
pub async fn run_grade(args: Vec<String>) -> anyhow::Result<()> {
    let [question, correct_answer, student_answer] = args.as_slice() else {
        anyhow::bail!("usage: grade <question-image> <correct-answer-image> <student-answer-image>");
    };

    let question = read_image(question).await?;
    let correct_answer = read_image(correct_answer).await?;
    let student_answer = read_image(student_answer).await?;

    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    let pipeline = build_pipeline(&settings)?;

    let outcome = pipeline
        .grade_images(AnswerSheetImages {
            question: &question,
            correct_answer: &correct_answer,
            student_answer: &student_answer,
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}

async fn read_image(path: &str) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(Path::new(path)).await.with_context(|| format!("Failed to read image {path}"))
}

/// Credentials are read once here. Outside strict mode a broken OCR setup only
/// disables text extraction instead of aborting startup.
fn build_pipeline(settings: &Settings) -> anyhow::Result<GradingPipeline> {
    let extractor = match TextExtractor::from_settings(settings) {
        Ok(extractor) => extractor,
        Err(err) if !settings.runtime().strict_config => {
            tracing::warn!(error = %err, "OCR client unavailable; text extraction disabled");
            TextExtractor::unconfigured(err.to_string())
        }
        Err(err) => return Err(err).context("Failed to initialize OCR client"),
    };

    let grader = AiGradingService::from_settings(settings).context("Failed to initialize grader")?;
    if !grader.is_configured() {
        tracing::warn!("LLM_API_KEY is not set; evaluation requests will be rejected");
    }

    Ok(GradingPipeline::new(extractor, grader))
}
