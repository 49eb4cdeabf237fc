pub(crate) mod ai_grading;
pub(crate) mod errors;
pub(crate) mod pipeline;
pub(crate) mod report;
pub(crate) mod scoring;
pub(crate) mod vision_ocr;
