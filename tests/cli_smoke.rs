#[tokio::test]
async fn grade_requires_exactly_three_images() {
    let err = answer_grader::run_grade(vec!["question.png".to_string()])
        .await
        .expect_err("one argument is not enough");

    assert!(err.to_string().starts_with("usage: grade"));
}

#[tokio::test]
async fn grade_reports_unreadable_image_path() {
    let missing = std::env::temp_dir().join("answer-grader-missing-question.png");
    let args = vec![
        missing.display().to_string(),
        "correct.png".to_string(),
        "student.png".to_string(),
    ];

    let err = answer_grader::run_grade(args).await.expect_err("missing file");

    let chain = format!("{err:#}");
    assert!(chain.contains("answer-grader-missing-question.png"), "{chain}");
}
