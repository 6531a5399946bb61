use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    scoop::cli::run().await
}
