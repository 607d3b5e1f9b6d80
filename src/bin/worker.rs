#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = exam_sessions::run_worker().await {
        eprintln!("exam-sessions-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
