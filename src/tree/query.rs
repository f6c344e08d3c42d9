use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, QueryFilter, Statement};

use super::Tree;
use crate::error::{DbResultExt, TreeError};
use crate::forest::{assemble, Descendant, IdTree, TreeNode};
use crate::sql::{DEPTH_ALIAS, ID_ALIAS, PARENT_ALIAS};
use crate::traits::{NodeId, TreeNodeModel, VIRTUAL_ROOT};

/// `max_depth <= 0` means unbounded.
fn depth_limit(max_depth: i32) -> i32 {
    if max_depth <= 0 {
        i32::MAX
    } else {
        max_depth
    }
}

impl<M> Tree<M>
where
    M: TreeNodeModel,
{
    /// Load node `id` of `tenant`.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn get_node<C>(&self, conn: &C, id: NodeId, tenant: &str) -> Result<M, TreeError>
    where
        C: ConnectionTrait,
    {
        Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);
        if id == VIRTUAL_ROOT {
            return Err(TreeError::NodeNotFound);
        }
        self.find_node(conn, id, tenant)
            .await?
            .ok_or(TreeError::NodeNotFound)
    }

    /// Descendants of `parent_id` up to `max_depth` edges below it, closest
    /// first. Each row carries the node's immediate parent.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn descendants<C>(
        &self,
        conn: &C,
        parent_id: NodeId,
        max_depth: i32,
        tenant: &str,
    ) -> Result<Vec<Descendant<M>>, TreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);

        let stmt = self
            .binding
            .descendants(backend, parent_id, depth_limit(max_depth), tenant);
        let rows = conn.query_all(stmt).await.during("descendants")?;

        rows.iter()
            .map(|row| {
                Ok(Descendant {
                    node: M::from_query_result(row, "").during("descendants")?,
                    parent_id: row.try_get("", PARENT_ALIAS).during("descendants")?,
                    depth: row.try_get("", DEPTH_ALIAS).during("descendants")?,
                })
            })
            .collect()
    }

    /// Ids of the descendants of `parent_id`, in the order of
    /// [`descendants`](Self::descendants).
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn descendant_ids<C>(
        &self,
        conn: &C,
        parent_id: NodeId,
        max_depth: i32,
        tenant: &str,
    ) -> Result<Vec<NodeId>, TreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);

        let stmt = self
            .binding
            .descendant_ids(backend, parent_id, depth_limit(max_depth), tenant);
        self.ids(conn, stmt, "descendant ids").await
    }

    /// Top-level nodes of `tenant`, ordered by id.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn roots<C>(&self, conn: &C, tenant: &str) -> Result<Vec<M>, TreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);

        M::find_by_statement(self.binding.roots(backend, tenant))
            .all(conn)
            .await
            .during("roots")
    }

    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn root_ids<C>(&self, conn: &C, tenant: &str) -> Result<Vec<NodeId>, TreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);

        self.ids(conn, self.binding.root_ids(backend, tenant), "root ids")
            .await
    }

    /// Nested descendants of `parent_id`, `max_depth` layers deep.
    ///
    /// The top level of the returned forest are the immediate children of
    /// `parent_id`; with [`VIRTUAL_ROOT`] they are the tenant's roots.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn tree_descendants<C>(
        &self,
        conn: &C,
        parent_id: NodeId,
        max_depth: i32,
        tenant: &str,
    ) -> Result<Vec<TreeNode<M>>, TreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);

        let stmt = self
            .binding
            .tree_descendants(backend, parent_id, depth_limit(max_depth), tenant);
        let rows = conn.query_all(stmt).await.during("tree descendants")?;

        let flat = rows
            .iter()
            .map(|row| {
                let node = M::from_query_result(row, "").during("tree descendants")?;
                let parent_id: NodeId = row.try_get("", PARENT_ALIAS).during("tree descendants")?;
                Ok((node.node_id(), parent_id, node))
            })
            .collect::<Result<Vec<_>, TreeError>>()?;

        Ok(assemble(flat))
    }

    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn tree_descendant_ids<C>(
        &self,
        conn: &C,
        parent_id: NodeId,
        max_depth: i32,
        tenant: &str,
    ) -> Result<Vec<IdTree>, TreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);

        let stmt = self
            .binding
            .tree_descendant_ids(backend, parent_id, depth_limit(max_depth), tenant);
        let rows = conn.query_all(stmt).await.during("tree descendant ids")?;

        let flat = rows
            .iter()
            .map(|row| {
                let id: NodeId = row.try_get("", ID_ALIAS).during("tree descendant ids")?;
                let parent_id: NodeId = row.try_get("", PARENT_ALIAS).during("tree descendant ids")?;
                Ok((id, parent_id, ()))
            })
            .collect::<Result<Vec<_>, TreeError>>()?;

        Ok(assemble(flat))
    }

    /// Real ancestors of `id`, outermost first. Empty for roots and for ids
    /// that do not resolve under `tenant`.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn ancestor_ids<C>(&self, conn: &C, id: NodeId, tenant: &str) -> Result<Vec<NodeId>, TreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);

        self.ids(conn, self.binding.ancestor_ids(backend, id, tenant), "ancestor ids")
            .await
    }

    /// Immediate parent of `id`; [`VIRTUAL_ROOT`] for roots.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn parent_id<C>(&self, conn: &C, id: NodeId, tenant: &str) -> Result<NodeId, TreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);

        self.ids(conn, self.binding.parent_id(backend, id, tenant), "parent id")
            .await?
            .first()
            .copied()
            .ok_or(TreeError::NodeNotFound)
    }

    /// Whether `id` sits anywhere below `ancestor_id`.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn is_descendant<C>(
        &self,
        conn: &C,
        ancestor_id: NodeId,
        id: NodeId,
        tenant: &str,
    ) -> Result<bool, TreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);

        let stmt = self.binding.descendant_of(backend, ancestor_id, id, tenant);
        self.has_rows(conn, stmt, "is descendant").await
    }

    /// Whether `parent_id` is the immediate parent of `id`.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn is_child_of<C>(
        &self,
        conn: &C,
        id: NodeId,
        parent_id: NodeId,
        tenant: &str,
    ) -> Result<bool, TreeError>
    where
        C: ConnectionTrait,
    {
        let backend = Self::ensure_supported(conn)?;
        let tenant = self.config.tenant(tenant);

        let stmt = self.binding.child_of(backend, id, parent_id, tenant);
        self.has_rows(conn, stmt, "is child of").await
    }

    pub(super) async fn find_node<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: NodeId,
        tenant: &str,
    ) -> Result<Option<M>, TreeError> {
        M::Entity::find()
            .filter(M::id_column().eq(id))
            .filter(M::tenant_column().eq(tenant))
            .one(conn)
            .await
            .during("get node")
    }

    pub(super) async fn has_rows<C: ConnectionTrait>(
        &self,
        conn: &C,
        stmt: Statement,
        operation: &'static str,
    ) -> Result<bool, TreeError> {
        let row = conn.query_one(stmt).await.during(operation)?;
        Ok(row.is_some())
    }

    async fn ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        stmt: Statement,
        operation: &'static str,
    ) -> Result<Vec<NodeId>, TreeError> {
        let rows = conn.query_all(stmt).await.during(operation)?;
        rows.iter()
            .map(|row| row.try_get::<NodeId>("", ID_ALIAS).during(operation))
            .collect()
    }
}
