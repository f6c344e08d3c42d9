//! Statements issued against one tree's node and relation tables.
//!
//! Templates are written once with PostgreSQL style numbered placeholders
//! (`$1`) and table/column slots (`{nodes}`, `{rel}`, `{id}`, `{tenant}`).
//! [`SchemaBinding`] fills the slots with quoted identifiers and rewrites the
//! placeholders for the target backend. Data values are always bound, never
//! interpolated.

use sea_orm::{DbBackend, Statement, Value};

use crate::traits::NodeId;

/// Result column carrying a row's immediate ancestor.
pub(crate) const PARENT_ALIAS: &str = "closure_parent_id";
/// Result column carrying a row's distance to the queried ancestor.
pub(crate) const DEPTH_ALIAS: &str = "closure_depth";
/// Result column of id-only queries.
pub(crate) const ID_ALIAS: &str = "node_id";

const CREATE_RELATION_TABLE: &str = r#"CREATE TABLE IF NOT EXISTS {rel} (
    ancestor_id BIGINT NOT NULL,
    descendant_id BIGINT NOT NULL,
    tenant VARCHAR(255) NOT NULL,
    depth INTEGER NOT NULL,
    PRIMARY KEY (tenant, ancestor_id, descendant_id)
)"#;

const CREATE_DESCENDANT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS {rel_idx} ON {rel} (tenant, descendant_id)";

const CREATE_TENANT_INDEX: &str = "CREATE INDEX IF NOT EXISTS {nodes_idx} ON {nodes} ({tenant})";

const INSERT_REFLEXIVE: &str = "INSERT INTO {rel} (ancestor_id, descendant_id, tenant, depth) \
     VALUES ($1, $1, $2, 0)";

const INSERT_ROOT_MARKER: &str = "INSERT INTO {rel} (ancestor_id, descendant_id, tenant, depth) \
     VALUES (0, $1, $2, 1)";

// every path ending at the parent, extended by one edge
const COPY_PARENT_PATHS: &str = "INSERT INTO {rel} (ancestor_id, descendant_id, tenant, depth) \
     SELECT ct.ancestor_id, $1, ct.tenant, ct.depth + 1 \
     FROM {rel} ct \
     WHERE ct.descendant_id = $2 AND ct.tenant = $3";

const RELATION_EXISTS: &str = "SELECT 1 AS hit FROM {rel} \
     WHERE ancestor_id = $1 AND descendant_id = $2 AND tenant = $3 AND depth = 1";

const DESCENDANT_EXISTS: &str = "SELECT 1 AS hit FROM {rel} \
     WHERE ancestor_id = $1 AND descendant_id = $2 AND tenant = $3 AND depth > 0";

// ancestors of the new parent x subtree of the moved node
const MOVE_LINK: &str = "INSERT INTO {rel} (ancestor_id, descendant_id, tenant, depth) \
     SELECT p.ancestor_id, c.descendant_id, c.tenant, p.depth + c.depth + 1 \
     FROM {rel} p, {rel} c \
     WHERE p.descendant_id = $2 AND p.tenant = $3 AND c.ancestor_id = $1 AND c.tenant = $3 \
     ON CONFLICT (tenant, ancestor_id, descendant_id) DO UPDATE SET depth = excluded.depth";

const MOVE_LINK_ROOT: &str = "INSERT INTO {rel} (ancestor_id, descendant_id, tenant, depth) \
     SELECT 0, c.descendant_id, c.tenant, c.depth + 1 \
     FROM {rel} c \
     WHERE c.ancestor_id = $1 AND c.tenant = $2 \
     ON CONFLICT (tenant, ancestor_id, descendant_id) DO UPDATE SET depth = excluded.depth";

// outside-subtree paths into the subtree whose ancestor is no longer above the new parent
const MOVE_PRUNE: &str = "DELETE FROM {rel} \
     WHERE tenant = $3 \
     AND descendant_id IN (SELECT descendant_id FROM {rel} WHERE ancestor_id = $1 AND tenant = $3) \
     AND ancestor_id NOT IN (SELECT descendant_id FROM {rel} WHERE ancestor_id = $1 AND tenant = $3) \
     AND ancestor_id NOT IN (SELECT ancestor_id FROM {rel} WHERE descendant_id = $2 AND tenant = $3)";

const MOVE_PRUNE_ROOT: &str = "DELETE FROM {rel} \
     WHERE tenant = $2 \
     AND descendant_id IN (SELECT descendant_id FROM {rel} WHERE ancestor_id = $1 AND tenant = $2) \
     AND ancestor_id NOT IN (SELECT descendant_id FROM {rel} WHERE ancestor_id = $1 AND tenant = $2) \
     AND ancestor_id <> 0";

const DELETE_SUBTREE_NODES: &str = "DELETE FROM {nodes} \
     WHERE {tenant} = $2 \
     AND {id} IN (SELECT descendant_id FROM {rel} WHERE ancestor_id = $1 AND tenant = $2)";

const DELETE_SUBTREE_RELATIONS: &str = "DELETE FROM {rel} \
     WHERE tenant = $2 \
     AND (descendant_id IN (SELECT descendant_id FROM {rel} WHERE ancestor_id = $1 AND tenant = $2) \
     OR ancestor_id IN (SELECT descendant_id FROM {rel} WHERE ancestor_id = $1 AND tenant = $2))";

const DESCENDANTS: &str = "SELECT n.*, COALESCE(pr.ancestor_id, 0) AS closure_parent_id, ct.depth AS closure_depth \
     FROM {nodes} n \
     JOIN {rel} ct ON ct.descendant_id = n.{id} AND ct.tenant = n.{tenant} \
     LEFT JOIN {rel} pr ON pr.descendant_id = n.{id} AND pr.depth = 1 AND pr.tenant = ct.tenant \
     WHERE ct.ancestor_id = $1 AND ct.depth > 0 AND ct.depth <= $2 AND ct.tenant = $3 \
     ORDER BY ct.depth, n.{id}";

const DESCENDANT_IDS: &str = "SELECT ct.descendant_id AS node_id \
     FROM {rel} ct \
     JOIN {nodes} n ON n.{id} = ct.descendant_id AND n.{tenant} = ct.tenant \
     WHERE ct.ancestor_id = $1 AND ct.depth > 0 AND ct.depth <= $2 AND ct.tenant = $3 \
     ORDER BY ct.depth, ct.descendant_id";

const ROOT_FILTER: &str = "FROM {nodes} n \
     JOIN {rel} ct ON ct.descendant_id = n.{id} AND ct.tenant = n.{tenant} \
     WHERE ct.ancestor_id = 0 AND ct.depth = 1 AND ct.tenant = $1 \
     AND NOT EXISTS (SELECT 1 FROM {rel} pr \
         WHERE pr.descendant_id = n.{id} AND pr.tenant = $1 AND pr.depth = 1 AND pr.ancestor_id <> 0) \
     ORDER BY n.{id}";

const ANCESTOR_IDS: &str = "SELECT ct.ancestor_id AS node_id \
     FROM {rel} ct \
     WHERE ct.descendant_id = $1 AND ct.tenant = $2 AND ct.depth > 0 AND ct.ancestor_id <> 0 \
     ORDER BY ct.depth DESC";

const PARENT_ID: &str = "SELECT ct.ancestor_id AS node_id \
     FROM {rel} ct \
     WHERE ct.descendant_id = $1 AND ct.tenant = $2 AND ct.depth = 1";

// one layer of immediate children per iteration, starting below $1
const TREE_LAYERS: &str = "WITH RECURSIVE layer (node_id, parent_id, lvl) AS ( \
         SELECT ct.descendant_id, ct.ancestor_id, 1 \
         FROM {rel} ct \
         WHERE ct.ancestor_id = $1 AND ct.depth = 1 AND ct.tenant = $2 \
         UNION ALL \
         SELECT ct.descendant_id, ct.ancestor_id, layer.lvl + 1 \
         FROM layer \
         JOIN {rel} ct ON ct.ancestor_id = layer.node_id AND ct.depth = 1 AND ct.tenant = $2 \
         WHERE layer.lvl < $3 \
     ) ";

const TREE_LAYER_NODES: &str = "SELECT n.*, layer.parent_id AS closure_parent_id, layer.lvl AS closure_depth \
     FROM layer \
     JOIN {nodes} n ON n.{id} = layer.node_id AND n.{tenant} = $2 \
     ORDER BY layer.lvl, layer.node_id";

const TREE_LAYER_IDS: &str = "SELECT layer.node_id AS node_id, layer.parent_id AS closure_parent_id \
     FROM layer \
     JOIN {nodes} n ON n.{id} = layer.node_id AND n.{tenant} = $2 \
     ORDER BY layer.lvl, layer.node_id";

/// Table identities of one tree: the node table (with its id and tenant
/// columns) and the relation table.
#[derive(Clone, Debug)]
pub struct SchemaBinding {
    node_table: String,
    relation_table: String,
    nodes: String,
    relations: String,
    id: String,
    tenant: String,
    nodes_idx: String,
    relations_idx: String,
}

impl SchemaBinding {
    pub fn new(node_table: &str, relation_table: &str, id_column: &str, tenant_column: &str) -> Self {
        Self {
            node_table: node_table.to_owned(),
            relation_table: relation_table.to_owned(),
            nodes: quote(node_table),
            relations: quote(relation_table),
            id: quote(id_column),
            tenant: quote(tenant_column),
            nodes_idx: quote(&format!("{node_table}_{tenant_column}_idx")),
            relations_idx: quote(&format!("{relation_table}_descendant_idx")),
        }
    }

    pub fn node_table(&self) -> &str {
        &self.node_table
    }

    pub fn relation_table(&self) -> &str {
        &self.relation_table
    }

    fn render(&self, backend: DbBackend, template: &str) -> String {
        let template = match backend {
            DbBackend::Sqlite => template.replace('$', "?"),
            _ => template.to_owned(),
        };
        template
            .replace("{nodes_idx}", &self.nodes_idx)
            .replace("{rel_idx}", &self.relations_idx)
            .replace("{nodes}", &self.nodes)
            .replace("{rel}", &self.relations)
            .replace("{id}", &self.id)
            .replace("{tenant}", &self.tenant)
    }

    fn statement(&self, backend: DbBackend, template: &str, values: Vec<Value>) -> Statement {
        Statement::from_sql_and_values(backend, self.render(backend, template), values)
    }

    /// DDL for the relation table and the indexes the join patterns rely on.
    pub fn create_relations(&self, backend: DbBackend) -> Vec<Statement> {
        [CREATE_RELATION_TABLE, CREATE_DESCENDANT_INDEX, CREATE_TENANT_INDEX]
            .into_iter()
            .map(|template| Statement::from_string(backend, self.render(backend, template)))
            .collect()
    }

    pub fn insert_reflexive(&self, backend: DbBackend, id: NodeId, tenant: &str) -> Statement {
        self.statement(backend, INSERT_REFLEXIVE, vec![id.into(), tenant.into()])
    }

    pub fn insert_root_marker(&self, backend: DbBackend, id: NodeId, tenant: &str) -> Statement {
        self.statement(backend, INSERT_ROOT_MARKER, vec![id.into(), tenant.into()])
    }

    pub fn copy_parent_paths(
        &self,
        backend: DbBackend,
        id: NodeId,
        parent_id: NodeId,
        tenant: &str,
    ) -> Statement {
        self.statement(
            backend,
            COPY_PARENT_PATHS,
            vec![id.into(), parent_id.into(), tenant.into()],
        )
    }

    /// Rows exist iff `parent_id` is the immediate parent of `id`.
    pub fn child_of(&self, backend: DbBackend, id: NodeId, parent_id: NodeId, tenant: &str) -> Statement {
        self.statement(
            backend,
            RELATION_EXISTS,
            vec![parent_id.into(), id.into(), tenant.into()],
        )
    }

    /// Rows exist iff `id` is a proper descendant of `ancestor_id`.
    pub fn descendant_of(
        &self,
        backend: DbBackend,
        ancestor_id: NodeId,
        id: NodeId,
        tenant: &str,
    ) -> Statement {
        self.statement(
            backend,
            DESCENDANT_EXISTS,
            vec![ancestor_id.into(), id.into(), tenant.into()],
        )
    }

    pub fn move_link(
        &self,
        backend: DbBackend,
        id: NodeId,
        new_parent_id: NodeId,
        tenant: &str,
    ) -> Statement {
        if new_parent_id == crate::VIRTUAL_ROOT {
            self.statement(backend, MOVE_LINK_ROOT, vec![id.into(), tenant.into()])
        } else {
            self.statement(
                backend,
                MOVE_LINK,
                vec![id.into(), new_parent_id.into(), tenant.into()],
            )
        }
    }

    pub fn move_prune(
        &self,
        backend: DbBackend,
        id: NodeId,
        new_parent_id: NodeId,
        tenant: &str,
    ) -> Statement {
        if new_parent_id == crate::VIRTUAL_ROOT {
            self.statement(backend, MOVE_PRUNE_ROOT, vec![id.into(), tenant.into()])
        } else {
            self.statement(
                backend,
                MOVE_PRUNE,
                vec![id.into(), new_parent_id.into(), tenant.into()],
            )
        }
    }

    pub fn delete_subtree_nodes(&self, backend: DbBackend, id: NodeId, tenant: &str) -> Statement {
        self.statement(backend, DELETE_SUBTREE_NODES, vec![id.into(), tenant.into()])
    }

    pub fn delete_subtree_relations(&self, backend: DbBackend, id: NodeId, tenant: &str) -> Statement {
        self.statement(backend, DELETE_SUBTREE_RELATIONS, vec![id.into(), tenant.into()])
    }

    pub fn descendants(&self, backend: DbBackend, parent_id: NodeId, max_depth: i32, tenant: &str) -> Statement {
        self.statement(
            backend,
            DESCENDANTS,
            vec![parent_id.into(), max_depth.into(), tenant.into()],
        )
    }

    pub fn descendant_ids(
        &self,
        backend: DbBackend,
        parent_id: NodeId,
        max_depth: i32,
        tenant: &str,
    ) -> Statement {
        self.statement(
            backend,
            DESCENDANT_IDS,
            vec![parent_id.into(), max_depth.into(), tenant.into()],
        )
    }

    pub fn roots(&self, backend: DbBackend, tenant: &str) -> Statement {
        let template = format!("SELECT n.* {ROOT_FILTER}");
        self.statement(backend, &template, vec![tenant.into()])
    }

    pub fn root_ids(&self, backend: DbBackend, tenant: &str) -> Statement {
        let template = format!("SELECT ct.descendant_id AS node_id {ROOT_FILTER}");
        self.statement(backend, &template, vec![tenant.into()])
    }

    pub fn ancestor_ids(&self, backend: DbBackend, id: NodeId, tenant: &str) -> Statement {
        self.statement(backend, ANCESTOR_IDS, vec![id.into(), tenant.into()])
    }

    pub fn parent_id(&self, backend: DbBackend, id: NodeId, tenant: &str) -> Statement {
        self.statement(backend, PARENT_ID, vec![id.into(), tenant.into()])
    }

    /// `layers` immediate-child layers below `parent_id`, each row tagged
    /// with its immediate ancestor.
    pub fn tree_descendants(
        &self,
        backend: DbBackend,
        parent_id: NodeId,
        layers: i32,
        tenant: &str,
    ) -> Statement {
        let template = format!("{TREE_LAYERS}{TREE_LAYER_NODES}");
        self.statement(
            backend,
            &template,
            vec![parent_id.into(), tenant.into(), layers.into()],
        )
    }

    pub fn tree_descendant_ids(
        &self,
        backend: DbBackend,
        parent_id: NodeId,
        layers: i32,
        tenant: &str,
    ) -> Statement {
        let template = format!("{TREE_LAYERS}{TREE_LAYER_IDS}");
        self.statement(
            backend,
            &template,
            vec![parent_id.into(), tenant.into(), layers.into()],
        )
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
