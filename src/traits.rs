use sea_orm::{ActiveModelBehavior, ActiveModelTrait, EntityTrait, FromQueryResult, IntoActiveModel};

use crate::config::TreeConfig;

/// Store-assigned identity of a node.
pub type NodeId = i64;

/// Reserved ancestor id marking top-level nodes. Never a real node.
pub const VIRTUAL_ROOT: NodeId = 0;

/// Trait implemented by SeaORM `Model` types that carry a tree identity
/// (a store-assigned id and a tenant).
///
/// Implementations are normally provided by the `#[derive(TreeNodeModel)]` macro.
pub trait TreeNodeModel:
    Clone + Send + Sync + 'static + IntoActiveModel<Self::ActiveModel> + FromQueryResult
{
    type Entity: EntityTrait<Model = Self>;
    type ActiveModel: ActiveModelTrait<Entity = Self::Entity> + ActiveModelBehavior + Send;

    fn tree_config() -> &'static TreeConfig;

    fn node_id(&self) -> NodeId;
    fn tenant(&self) -> &str;

    fn set_tenant(active: &mut Self::ActiveModel, tenant: &str);
    /// Clears the id so the store assigns a fresh one on insert.
    fn unset_id(active: &mut Self::ActiveModel);

    fn id_column() -> <Self::Entity as EntityTrait>::Column;
    fn tenant_column() -> <Self::Entity as EntityTrait>::Column;
}
