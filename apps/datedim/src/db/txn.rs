use std::future::Future;
use std::pin::Pin;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::error::AppError;

/// Execute a function within a database transaction.
///
/// Commits when the closure returns `Ok`, rolls back on `Err`. Callers write
/// `with_txn(&db, |txn| Box::pin(async move { ... }))`.
pub async fn with_txn<R, F>(db: &DatabaseConnection, f: F) -> Result<R, AppError>
where
    F: for<'c> FnOnce(
        &'c DatabaseTransaction,
    ) -> Pin<Box<dyn Future<Output = Result<R, AppError>> + Send + 'c>>,
{
    let txn = db.begin().await?;
    let out = f(&txn).await;

    match out {
        Ok(val) => {
            txn.commit().await?;
            Ok(val)
        }
        Err(err) => {
            // Best-effort rollback; preserve original error
            let _ = txn.rollback().await;
            Err(err)
        }
    }
}
