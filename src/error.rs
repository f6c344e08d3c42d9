use sea_orm::DbErr;
use thiserror::Error;

/// Errors returned by [`Tree`](crate::Tree) operations.
///
/// Cross-tenant targets surface as [`TreeError::NodeNotFound`] or
/// [`TreeError::ParentNotFound`], never as a distinct error, so callers
/// cannot probe for the existence of another tenant's nodes.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("the item is not a tree node")]
    ItemIsNotTreeNode,

    #[error("parent node not found")]
    ParentNotFound,

    #[error("node not found")]
    NodeNotFound,

    #[error("invalid move")]
    InvalidMove,

    #[error("closure-table supports PostgreSQL and SQLite connections only")]
    UnsupportedBackend,

    #[error("{operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: DbErr,
    },
}

impl TreeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NodeNotFound | Self::ParentNotFound)
    }
}

/// Annotates storage failures with the operation that issued them.
pub(crate) trait DbResultExt<T> {
    fn during(self, operation: &'static str) -> Result<T, TreeError>;
}

impl<T> DbResultExt<T> for Result<T, DbErr> {
    fn during(self, operation: &'static str) -> Result<T, TreeError> {
        self.map_err(|source| TreeError::Storage { operation, source })
    }
}
