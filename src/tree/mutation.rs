use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait,
    IntoActiveModel, Iterable, QueryFilter, TransactionTrait,
};

use super::Tree;
use crate::error::{DbResultExt, TreeError};
use crate::lock::LockedTransaction;
use crate::traits::{NodeId, TreeNodeModel, VIRTUAL_ROOT};

impl<M> Tree<M>
where
    M: TreeNodeModel,
{
    /// Insert `item` below `parent_id` (or as a root when `parent_id` is
    /// [`VIRTUAL_ROOT`]) and return the stored model with its assigned id and
    /// normalised tenant.
    ///
    /// Any id or tenant already present on `item` is ignored.
    #[tracing::instrument(level = "debug", skip(self, conn, item))]
    pub async fn add<C, A>(
        &self,
        conn: &C,
        item: A,
        parent_id: NodeId,
        tenant: &str,
    ) -> Result<M, TreeError>
    where
        C: ConnectionTrait + TransactionTrait,
        A: IntoActiveModel<M::ActiveModel>,
    {
        let backend = Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);

        let guard =
            LockedTransaction::acquire(self.config.advisory_lock_strategy(), conn, tenant).await?;
        let result = self
            .add_on(guard.connection(), backend, item.into_active_model(), parent_id, tenant)
            .await;
        guard.finish(result).await
    }

    async fn add_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        backend: DbBackend,
        mut active: M::ActiveModel,
        parent_id: NodeId,
        tenant: &str,
    ) -> Result<M, TreeError> {
        if parent_id != VIRTUAL_ROOT && self.find_node(conn, parent_id, tenant).await?.is_none() {
            tracing::debug!(parent_id, "parent not found");
            return Err(TreeError::ParentNotFound);
        }

        M::unset_id(&mut active);
        M::set_tenant(&mut active, tenant);
        let model = active.insert(conn).await.during("add")?;
        let id = model.node_id();

        conn.execute(self.binding.insert_reflexive(backend, id, tenant))
            .await
            .during("add")?;

        let linked = if parent_id == VIRTUAL_ROOT {
            conn.execute(self.binding.insert_root_marker(backend, id, tenant))
                .await
                .during("add")?
        } else {
            conn.execute(self.binding.copy_parent_paths(backend, id, parent_id, tenant))
                .await
                .during("add")?
        };

        tracing::debug!(id, paths = linked.rows_affected() + 1, "node added");
        Ok(model)
    }

    /// Overwrite the payload of node `id`. Id and tenant are never changed
    /// and relations are never touched.
    #[tracing::instrument(level = "debug", skip(self, conn, item))]
    pub async fn update<C, A>(
        &self,
        conn: &C,
        id: NodeId,
        item: A,
        tenant: &str,
    ) -> Result<(), TreeError>
    where
        C: ConnectionTrait,
        A: IntoActiveModel<M::ActiveModel>,
    {
        Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);
        if id == VIRTUAL_ROOT {
            return Err(TreeError::NodeNotFound);
        }

        let mut active = item.into_active_model();
        for column in <<M::Entity as EntityTrait>::Column as Iterable>::iter() {
            if let ActiveValue::Unchanged(value) = active.get(column) {
                active.set(column, value);
            }
        }
        active.not_set(M::id_column());
        active.not_set(M::tenant_column());

        if !active.is_changed() {
            // nothing to write, but the target must still resolve
            return match self.find_node(conn, id, tenant).await? {
                Some(_) => Ok(()),
                None => Err(TreeError::NodeNotFound),
            };
        }

        let result = M::Entity::update_many()
            .set(active)
            .filter(M::id_column().eq(id))
            .filter(M::tenant_column().eq(tenant))
            .exec(conn)
            .await
            .during("update")?;

        if result.rows_affected == 0 {
            return Err(TreeError::NodeNotFound);
        }
        Ok(())
    }

    /// Relocate the subtree rooted at `id` below `new_parent_id`
    /// ([`VIRTUAL_ROOT`] makes it a root).
    ///
    /// Every node of the subtree keeps its depth relative to `id`. Moving a
    /// node to its current parent, onto itself or below one of its own
    /// descendants fails with [`TreeError::InvalidMove`].
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn move_node<C>(
        &self,
        conn: &C,
        id: NodeId,
        new_parent_id: NodeId,
        tenant: &str,
    ) -> Result<(), TreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);
        if id == VIRTUAL_ROOT {
            return Err(TreeError::NodeNotFound);
        }

        let guard =
            LockedTransaction::acquire(self.config.advisory_lock_strategy(), conn, tenant).await?;
        let result = self
            .move_on(guard.connection(), backend, id, new_parent_id, tenant)
            .await;
        guard.finish(result).await
    }

    async fn move_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        backend: DbBackend,
        id: NodeId,
        new_parent_id: NodeId,
        tenant: &str,
    ) -> Result<(), TreeError> {
        if self
            .has_rows(conn, self.binding.child_of(backend, id, new_parent_id, tenant), "move")
            .await?
        {
            tracing::debug!("already a child of the target");
            return Err(TreeError::InvalidMove);
        }

        if new_parent_id == id
            || (new_parent_id != VIRTUAL_ROOT
                && self
                    .has_rows(
                        conn,
                        self.binding.descendant_of(backend, id, new_parent_id, tenant),
                        "move",
                    )
                    .await?)
        {
            tracing::debug!("target lies inside the moved subtree");
            return Err(TreeError::InvalidMove);
        }

        let linked = conn
            .execute(self.binding.move_link(backend, id, new_parent_id, tenant))
            .await
            .during("move")?;

        // nothing linked: the node or the new parent does not resolve under this tenant
        if linked.rows_affected() == 0 {
            return Err(TreeError::NodeNotFound);
        }

        let pruned = conn
            .execute(self.binding.move_prune(backend, id, new_parent_id, tenant))
            .await
            .during("move")?;

        tracing::debug!(
            linked = linked.rows_affected(),
            pruned = pruned.rows_affected(),
            "subtree moved"
        );
        Ok(())
    }

    /// Delete node `id` together with its whole subtree and every relation
    /// that references one of the deleted nodes.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn delete_recurse<C>(&self, conn: &C, id: NodeId, tenant: &str) -> Result<(), TreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);
        if id == VIRTUAL_ROOT {
            return Err(TreeError::NodeNotFound);
        }

        let guard =
            LockedTransaction::acquire(self.config.advisory_lock_strategy(), conn, tenant).await?;
        let result = self.delete_on(guard.connection(), backend, id, tenant).await;
        guard.finish(result).await
    }

    async fn delete_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        backend: DbBackend,
        id: NodeId,
        tenant: &str,
    ) -> Result<(), TreeError> {
        // nodes first: the subtree is resolved through relations that are removed next
        let nodes = conn
            .execute(self.binding.delete_subtree_nodes(backend, id, tenant))
            .await
            .during("delete")?;
        if nodes.rows_affected() == 0 {
            return Err(TreeError::NodeNotFound);
        }

        let relations = conn
            .execute(self.binding.delete_subtree_relations(backend, id, tenant))
            .await
            .during("delete")?;

        tracing::debug!(
            nodes = nodes.rows_affected(),
            relations = relations.rows_affected(),
            "subtree deleted"
        );
        Ok(())
    }
}
