use std::sync::Arc;

use ldb_core::{config::Config, store::CredentialStore};
use ldb_store::FileStore;

#[tokio::main]
async fn main() -> Result<(), ldb_core::Error> {
    ldb_core::logging::init("ldb");

    let cfg = Arc::new(Config::load()?);
    let store: Arc<dyn CredentialStore> = Arc::new(FileStore::open(&cfg.store_path)?);

    ldb_telegram::router::run_polling(cfg, store)
        .await
        .map_err(|e| ldb_core::Error::Transport(format!("telegram bot failed: {e}")))?;

    Ok(())
}
