//! Transaction helpers for the stock ledger.
//!
//! Every multi-row change goes through [`in_transaction`]. The closure's error
//! aborts the transaction; sea-orm rolls back on drop, so an early `?` or a
//! panic inside the closure never leaves a half-applied change.

use crate::errors::ServiceError;
use metrics::{counter, histogram};
use sea_orm::{
    DatabaseConnection, DatabaseTransaction, DbBackend, EntityTrait, QuerySelect, Select,
    TransactionError, TransactionTrait,
};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};

/// Type alias for boxed future used in transactions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs `f` inside a database transaction, committing on `Ok` and rolling back on `Err`.
///
/// ```rust,ignore
/// let borrow = in_transaction(&db, "borrow_item", |txn| {
///     Box::pin(async move {
///         let item = lock_for_update(item::Entity::find_by_id(id), txn.get_database_backend())
///             .one(txn)
///             .await?;
///         // ...
///         Ok(borrow)
///     })
/// })
/// .await?;
/// ```
pub async fn in_transaction<F, T>(
    db: &DatabaseConnection,
    label: &'static str,
    f: F,
) -> Result<T, ServiceError>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>> + Send,
    T: Send,
{
    let start = std::time::Instant::now();
    counter!("lending_db.transaction.started", 1, "op" => label);

    let result = db.transaction::<F, T, ServiceError>(f).await;

    histogram!("lending_db.transaction.duration", start.elapsed(), "op" => label);

    match result {
        Ok(value) => {
            counter!("lending_db.transaction.committed", 1, "op" => label);
            debug!(op = label, "transaction committed");
            Ok(value)
        }
        Err(TransactionError::Transaction(err)) => {
            counter!("lending_db.transaction.rolled_back", 1, "op" => label);
            debug!(op = label, error = %err, "transaction rolled back");
            Err(err)
        }
        Err(TransactionError::Connection(err)) => {
            counter!("lending_db.transaction.rolled_back", 1, "op" => label);
            warn!(op = label, error = %err, "transaction failed at the connection level");
            Err(ServiceError::db_error(err))
        }
    }
}

/// Adds `FOR UPDATE` to `select` on backends that support row locks.
///
/// SQLite serializes writers at the database level and rejects the clause, so
/// the select is returned untouched there. Callers still pair this with a
/// guarded conditional update, which holds on every backend.
pub fn lock_for_update<E: EntityTrait>(select: Select<E>, backend: DbBackend) -> Select<E> {
    match backend {
        DbBackend::Sqlite => select,
        _ => select.lock_exclusive(),
    }
}

/// `FOR SHARE` counterpart of [`lock_for_update`]: keeps a referenced parent row
/// from being deleted until the transaction ends.
pub fn lock_for_share<E: EntityTrait>(select: Select<E>, backend: DbBackend) -> Select<E> {
    match backend {
        DbBackend::Sqlite => select,
        _ => select.lock_shared(),
    }
}
