use filer::config::InternalState;
use filer::core::errors::Result;
use tempfile::TempDir;

#[tokio::test]
async fn first_run_setup_starts_pending() -> Result<()> {
    let dir = TempDir::new().map_err(|e| anyhow::anyhow!(e))?;
    let pool = filer::store::open(dir.path().join("app.db")).await?;
    filer::store::migrate(&pool).await?;

    let state = InternalState::fetch(&pool).await;
    assert!(!state.has_done_first_run_setup);
    Ok(())
}

#[tokio::test]
async fn completing_setup_persists() -> Result<()> {
    let dir = TempDir::new().map_err(|e| anyhow::anyhow!(e))?;
    let pool = filer::store::open(dir.path().join("app.db")).await?;
    filer::store::migrate(&pool).await?;

    InternalState::complete_first_run_setup(&pool).await?;
    assert!(InternalState::fetch(&pool).await.has_done_first_run_setup);

    // Completing twice is harmless.
    InternalState::complete_first_run_setup(&pool).await?;
    assert!(InternalState::fetch(&pool).await.has_done_first_run_setup);
    Ok(())
}

#[tokio::test]
async fn migration_is_idempotent() -> Result<()> {
    let dir = TempDir::new().map_err(|e| anyhow::anyhow!(e))?;
    let pool = filer::store::open(dir.path().join("app.db")).await?;
    filer::store::migrate(&pool).await?;
    filer::store::migrate(&pool).await?;

    let state = InternalState::fetch(&pool).await;
    assert!(!state.has_done_first_run_setup);
    Ok(())
}
