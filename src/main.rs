#[tokio::main]
async fn main() -> anyhow::Result<()> {
    remixpilot::cli::app::run().await
}
