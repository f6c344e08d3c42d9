use crc32fast::Hasher;

/// Tenant stored when a caller passes an empty tenant string.
pub const DEFAULT_TENANT: &str = "DefaultTenant";

/// Static configuration describing how a SeaORM model is bound to its
/// closure relation table.
#[derive(Clone, Debug)]
pub struct TreeConfig {
    entity_name: String,
    relation_table: String,
    default_tenant: String,
    advisory_lock_strategy: AdvisoryLockStrategy,
}

impl TreeConfig {
    /// Create a configuration for `entity_name` whose nodes live in `node_table`.
    ///
    /// The relation table defaults to `<node_table>_hierarchies`.
    pub fn new(entity_name: impl Into<String>, node_table: &str) -> Self {
        let entity_name = entity_name.into();
        let relation_table = format!("{node_table}_hierarchies");

        let default_lock = AdvisoryLockStrategy::PerTenant(AdvisoryLockKey::derived_from(
            node_table,
            &relation_table,
        ));

        Self {
            entity_name,
            relation_table,
            default_tenant: DEFAULT_TENANT.to_string(),
            advisory_lock_strategy: default_lock,
        }
    }

    /// Merge options produced by [`TreeOptions`].
    pub(crate) fn apply_options(mut self, options: TreeOptions) -> Self {
        if let Some(relation_table) = options.relation_table {
            self.relation_table = relation_table;
        }
        if let Some(default_tenant) = options.default_tenant {
            self.default_tenant = default_tenant;
        }
        if let Some(strategy) = options.advisory_lock_strategy {
            self.advisory_lock_strategy = strategy;
        }
        self
    }

    /// Human-readable Rust struct name for the node entity.
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Table holding the ancestor/descendant rows.
    pub fn relation_table(&self) -> &str {
        &self.relation_table
    }

    /// Tenant substituted for an empty tenant string.
    pub fn default_tenant(&self) -> &str {
        &self.default_tenant
    }

    /// Advisory lock strategy (PostgreSQL only).
    pub fn advisory_lock_strategy(&self) -> &AdvisoryLockStrategy {
        &self.advisory_lock_strategy
    }

    /// Normalise a caller supplied tenant.
    pub fn tenant<'a>(&'a self, tenant: &'a str) -> &'a str {
        if tenant.is_empty() {
            &self.default_tenant
        } else {
            tenant
        }
    }
}

/// Builder-style overrides, used by the derive macro and by
/// [`Tree::with_options`](crate::Tree::with_options).
#[derive(Clone, Debug, Default)]
pub struct TreeOptions {
    relation_table: Option<String>,
    default_tenant: Option<String>,
    advisory_lock_strategy: Option<AdvisoryLockStrategy>,
}

impl TreeOptions {
    pub fn relation_table(mut self, value: impl Into<String>) -> Self {
        self.relation_table = Some(value.into());
        self
    }

    /// An empty value is ignored; the default tenant is never empty.
    pub fn default_tenant(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.default_tenant = Some(value);
        }
        self
    }

    pub fn advisory_lock_strategy(mut self, strategy: AdvisoryLockStrategy) -> Self {
        self.advisory_lock_strategy = Some(strategy);
        self
    }

    pub fn apply(self, base: TreeConfig) -> TreeConfig {
        base.apply_options(self)
    }
}

/// Key used for PostgreSQL advisory locks.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AdvisoryLockKey(String);

impl AdvisoryLockKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn derived_from(node_table: &str, relation_table: &str) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(node_table.as_bytes());
        hasher.update(b"/");
        hasher.update(relation_table.as_bytes());
        let crc = hasher.finalize();
        Self(format!("closure-table::{node_table}::{relation_table}::{crc:x}"))
    }
}

/// How mutations serialise against each other.
///
/// `PerTenant` takes a transaction scoped advisory lock on the pair
/// `(key, tenant)`, so writers of different tenants never wait on each other.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdvisoryLockStrategy {
    Disabled,
    PerTenant(AdvisoryLockKey),
}

impl AdvisoryLockStrategy {
    pub fn key(&self) -> Option<&AdvisoryLockKey> {
        match self {
            AdvisoryLockStrategy::Disabled => None,
            AdvisoryLockStrategy::PerTenant(key) => Some(key),
        }
    }
}
