#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = answer_grader::run().await {
        eprintln!("answer-grader fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
