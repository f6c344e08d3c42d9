//! Tenant-scoped closure-table trees on top of SeaORM.
//!
//! Every ancestor/descendant pair of a tree is stored as a row of a relation
//! table, so subtree and ancestor lookups need no recursive queries. Many
//! independent trees share one node table, partitioned by tenant; no
//! operation reads, links or moves across tenants. PostgreSQL and SQLite are
//! supported.
//!
//! Top-level nodes hang below the reserved [`VIRTUAL_ROOT`] id, which is a
//! closure ancestor of every node of its tenant.

extern crate self as closure_table;

pub mod config;
pub mod error;
pub mod forest;
pub mod lock;
pub mod sql;
pub mod traits;
pub mod tree;

pub mod prelude {
    //! Convenient re-exports for consumers.
    pub use crate::config::{AdvisoryLockStrategy, TreeConfig, TreeOptions};
    pub use crate::forest::{Descendant, IdTree, TreeNode};
    pub use crate::traits::{NodeId, TreeNodeModel, VIRTUAL_ROOT};
    pub use crate::tree::Tree;
}

pub use closure_table_macros::TreeNodeModel as TreeNodeModelDerive;
#[doc(hidden)]
pub use closure_table_macros::TreeNodeModel;
pub use config::{AdvisoryLockKey, AdvisoryLockStrategy, TreeConfig, TreeOptions, DEFAULT_TENANT};
pub use error::TreeError;
pub use forest::{sort_forest, Descendant, IdTree, TreeNode};
pub use traits::{NodeId, TreeNodeModel, VIRTUAL_ROOT};
pub use tree::Tree;

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}
