use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    filer::run().await
}
