#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = answer_grader::run_grade(std::env::args().skip(1).collect()).await {
        eprintln!("grade: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
