#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};

use closure_table::{NodeId, Tree, TreeError, VIRTUAL_ROOT};
use sea_orm::{
    ActiveValue::Set, ConnectionTrait, DatabaseConnection, SqlxSqliteConnector, Statement, Value,
};
use sqlx::sqlite::SqlitePoolOptions;

pub mod category {
    use closure_table::TreeNodeModelDerive as TreeNodeModel;
    use sea_orm::entity::prelude::*;
    use serde::Serialize;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, TreeNodeModel, Serialize)]
    #[sea_orm(table_name = "categories")]
    #[tree_node(relation_table = "category_tree")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub tenant: String,
        pub name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Entity whose key is caller-assigned, which a tree cannot bind to.
pub mod fixed_key {
    use closure_table::TreeNodeModelDerive as TreeNodeModel;
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, TreeNodeModel)]
    #[sea_orm(table_name = "fixed_keys")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i32,
        pub tenant: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub const TENANT_1: &str = "t1";
pub const TENANT_2: &str = "t2";

/// (expected id, parent, name)
///
/// ```text
/// 1 Electronics
/// 2   Mobile Phones
/// 6     Touch Screen
/// 4   Laptops
/// 3 Clothing
/// 5   T-Shirt
/// ```
pub const TREE_1: [(NodeId, NodeId, &str); 6] = [
    (1, 0, "Electronics"),
    (2, 1, "Mobile Phones"),
    (3, 0, "Clothing"),
    (4, 1, "Laptops"),
    (5, 3, "T-Shirt"),
    (6, 2, "Touch Screen"),
];

/// ```text
/// 7  Colors
/// 8    Warm
/// 12     Red
/// 13     Orange
/// 10   Cold
/// 14     Blue
/// 9  Sizes
/// 11   Small
/// ```
pub const TREE_2: [(NodeId, NodeId, &str); 8] = [
    (7, 0, "Colors"),
    (8, 7, "Warm"),
    (9, 0, "Sizes"),
    (10, 7, "Cold"),
    (11, 9, "Small"),
    (12, 8, "Red"),
    (13, 8, "Orange"),
    (14, 10, "Blue"),
];

/// A private in-memory database. The pool keeps its single connection alive
/// for the whole test, since every new connection would see an empty store.
pub async fn sqlite() -> Result<DatabaseConnection, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

pub async fn seeded_sqlite() -> Result<(Tree<category::Model>, DatabaseConnection), Box<dyn std::error::Error>> {
    let db = sqlite().await?;
    let tree = Tree::<category::Model>::new()?;
    tree.create_tables(&db).await?;
    seed(&tree, &db).await?;
    Ok((tree, db))
}

pub fn category(name: &str) -> category::ActiveModel {
    category::ActiveModel {
        name: Set(name.to_owned()),
        ..Default::default()
    }
}

pub async fn seed(
    tree: &Tree<category::Model>,
    db: &DatabaseConnection,
) -> Result<(), TreeError> {
    for (tenant, rows) in [(TENANT_1, &TREE_1[..]), (TENANT_2, &TREE_2[..])] {
        for &(id, parent, name) in rows {
            let added = tree.add(db, category(name), parent, tenant).await?;
            assert_eq!(i64::from(added.id), id, "unexpected id for {name}");
        }
    }
    Ok(())
}

/// Relation rows of `tenant` as `(ancestor, descendant, depth)`.
pub async fn relations(
    tree: &Tree<category::Model>,
    db: &DatabaseConnection,
    tenant: &str,
) -> Result<BTreeSet<(NodeId, NodeId, i32)>, sea_orm::DbErr> {
    let backend = db.get_database_backend();
    let placeholder = match backend {
        sea_orm::DbBackend::Postgres => "$1",
        _ => "?",
    };
    let sql = format!(
        "SELECT ancestor_id, descendant_id, depth FROM \"{}\" WHERE tenant = {placeholder}",
        tree.relation_table()
    );
    let rows = db
        .query_all(Statement::from_sql_and_values(
            backend,
            sql,
            [Value::from(tenant)],
        ))
        .await?;

    rows.iter()
        .map(|row| {
            Ok((
                row.try_get::<i64>("", "ancestor_id")?,
                row.try_get::<i64>("", "descendant_id")?,
                row.try_get::<i32>("", "depth")?,
            ))
        })
        .collect()
}

/// The closure every node of `tenant` must have: itself at depth 0, every
/// real ancestor at its edge distance, and the virtual root above the top.
pub async fn assert_closure_consistent(
    tree: &Tree<category::Model>,
    db: &DatabaseConnection,
    tenant: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let actual = relations(tree, db, tenant).await?;

    let parents: HashMap<NodeId, NodeId> = actual
        .iter()
        .filter(|(_, _, depth)| *depth == 1)
        .map(|(ancestor, descendant, _)| (*descendant, *ancestor))
        .collect();

    let mut nodes = tree.descendant_ids(db, VIRTUAL_ROOT, 0, tenant).await?;
    nodes.sort_unstable();
    let mut parent_keys: Vec<NodeId> = parents.keys().copied().collect();
    parent_keys.sort_unstable();
    assert_eq!(nodes, parent_keys, "every node needs exactly one parent edge");

    let mut expected = BTreeSet::new();
    for &node in &nodes {
        expected.insert((node, node, 0));
        let mut current = node;
        let mut depth = 0;
        while current != VIRTUAL_ROOT {
            current = parents[&current];
            depth += 1;
            expected.insert((current, node, depth));
            assert!(depth <= nodes.len() as i32, "cycle above node {node}");
        }
    }

    assert_eq!(actual, expected);
    Ok(())
}
