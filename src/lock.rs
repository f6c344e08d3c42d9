use sea_orm::{
    ConnectionTrait, DatabaseTransaction, DbBackend, Statement, TransactionTrait, Value,
};

use crate::config::AdvisoryLockStrategy;
use crate::error::{DbResultExt, TreeError};

/// A transaction that, on PostgreSQL, holds the tree's advisory lock for the
/// tenant being mutated. The lock is transaction scoped and released by
/// commit or rollback.
pub struct LockedTransaction {
    txn: DatabaseTransaction,
}

impl LockedTransaction {
    pub async fn acquire<C>(
        strategy: &AdvisoryLockStrategy,
        conn: &C,
        tenant: &str,
    ) -> Result<Self, TreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let backend = conn.get_database_backend();
        let txn = conn.begin().await.during("begin transaction")?;

        if let (Some(key), DbBackend::Postgres) = (strategy.key(), backend) {
            if let Err(err) = acquire_lock(&txn, key.as_str(), tenant).await {
                let _ = txn.rollback().await;
                return Err(err);
            }
        }

        Ok(Self { txn })
    }

    pub fn connection(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub async fn commit(self) -> Result<(), TreeError> {
        self.txn.commit().await.during("commit")
    }

    pub async fn rollback(self) -> Result<(), TreeError> {
        self.txn.rollback().await.during("rollback")
    }

    /// Commit on success, roll back on failure. The operation's own error
    /// wins over a failing rollback.
    pub async fn finish<T>(self, result: Result<T, TreeError>) -> Result<T, TreeError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

async fn acquire_lock(txn: &DatabaseTransaction, key: &str, tenant: &str) -> Result<(), TreeError> {
    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT pg_advisory_xact_lock(hashtext($1), hashtext($2))",
        vec![Value::from(key), Value::from(tenant)],
    ))
    .await
    .during("advisory lock")?;
    Ok(())
}
