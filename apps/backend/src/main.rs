#[tokio::main]
async fn main() -> anyhow::Result<()> {
    study_scheduler_backend::run().await
}
