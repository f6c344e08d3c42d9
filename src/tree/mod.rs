//! The tree handle: a schema binding plus tenant default for one node model.
//!
//! Mutations live in [`mutation`], read-only traversal in [`query`]. A handle
//! holds no per-call state and can be shared across tasks.

use std::marker::PhantomData;

use sea_orm::{
    ColumnTrait, ColumnType, ConnectionTrait, DbBackend, EntityName, EntityTrait, IdenStatic,
    Iterable, PrimaryKeyToColumn, PrimaryKeyTrait, Schema,
};

use crate::config::{TreeConfig, TreeOptions};
use crate::error::{DbResultExt, TreeError};
use crate::sql::SchemaBinding;
use crate::traits::TreeNodeModel;

mod mutation;
mod query;

/// Closure-table operations for the node model `M`.
#[derive(Debug)]
pub struct Tree<M>
where
    M: TreeNodeModel,
{
    config: TreeConfig,
    binding: SchemaBinding,
    _marker: PhantomData<fn() -> M>,
}

impl<M> Clone for Tree<M>
where
    M: TreeNodeModel,
{
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            binding: self.binding.clone(),
            _marker: PhantomData,
        }
    }
}

impl<M> Tree<M>
where
    M: TreeNodeModel,
{
    /// Bind the tree using the model's static configuration.
    pub fn new() -> Result<Self, TreeError> {
        Self::with_options(TreeOptions::default())
    }

    /// Bind the tree, overriding parts of the model's static configuration.
    ///
    /// Fails with [`TreeError::ItemIsNotTreeNode`] when the entity's primary
    /// key is not exactly the store-assigned id column, or its tenant column
    /// is not a string column.
    pub fn with_options(options: TreeOptions) -> Result<Self, TreeError> {
        check_capability::<M>()?;

        let config = options.apply(M::tree_config().clone());
        let entity = M::Entity::default();
        let binding = SchemaBinding::new(
            entity.table_name(),
            config.relation_table(),
            M::id_column().as_str(),
            M::tenant_column().as_str(),
        );

        Ok(Self {
            config,
            binding,
            _marker: PhantomData,
        })
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Table storing the node rows.
    pub fn node_table(&self) -> &str {
        self.binding.node_table()
    }

    /// Table storing the ancestor/descendant rows.
    pub fn relation_table(&self) -> &str {
        self.binding.relation_table()
    }

    /// Create the node and relation tables if they do not exist yet.
    #[tracing::instrument(level = "debug", skip_all, fields(node_table = %self.node_table()))]
    pub async fn create_tables<C>(&self, conn: &C) -> Result<(), TreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;

        let mut nodes = Schema::new(backend).create_table_from_entity(M::Entity::default());
        nodes.if_not_exists();
        conn.execute(backend.build(&nodes))
            .await
            .during("create node table")?;

        for stmt in self.binding.create_relations(backend) {
            conn.execute(stmt).await.during("create relation table")?;
        }

        tracing::debug!(relation_table = %self.relation_table(), "tree tables ready");
        Ok(())
    }

    fn ensure_supported(conn: &impl ConnectionTrait) -> Result<DbBackend, TreeError> {
        match conn.get_database_backend() {
            backend @ (DbBackend::Postgres | DbBackend::Sqlite) => Ok(backend),
            _ => Err(TreeError::UnsupportedBackend),
        }
    }
}

fn check_capability<M: TreeNodeModel>() -> Result<(), TreeError> {
    type Key<M> = <<M as TreeNodeModel>::Entity as EntityTrait>::PrimaryKey;

    let id_column = M::id_column();
    let mut keys = <Key<M> as Iterable>::iter().map(|key| key.into_column());
    let id_is_key = match (keys.next(), keys.next()) {
        (Some(key), None) => key.as_str() == id_column.as_str(),
        _ => false,
    };
    let store_assigned = <Key<M> as PrimaryKeyTrait>::auto_increment();

    let tenant_is_text = matches!(
        M::tenant_column().def().get_column_type(),
        ColumnType::String(_) | ColumnType::Text | ColumnType::Char(_)
    );

    if id_is_key && store_assigned && tenant_is_text {
        Ok(())
    } else {
        Err(TreeError::ItemIsNotTreeNode)
    }
}
