//! Routing modules: registry, bindings and discovery.
//!
//! # Responsibilities
//! - `RouteModule`: a unit that configures a rule table
//! - `ModuleRegistry`: create-once cache of module instances keyed by type
//! - Lazily built per-module rule tables for `route_to_module`
//! - Discovery of modules registered with `register_module!`
//!
//! # Design Decisions
//! - Registries are values; `ModuleRegistry::global()` is only a default
//! - A module is constructed at most once per registry until invalidated
//! - A module's own table is configured on first descent, not at registration,
//!   so modules can mount each other without recursion at startup

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};

use crate::routing::error::RouteError;
use crate::routing::lock::DEFAULT_LOCK_TIMEOUT;
use crate::routing::table::RuleTable;

/// A unit of routing configuration.
pub trait RouteModule: Send + Sync + 'static {
    /// Add this module's rules to `table`.
    fn configure(&self, table: &RuleTable) -> Result<(), RouteError>;
}

/// A cached module instance and its lazily built table.
pub struct ModuleSlot {
    name: &'static str,
    module: Arc<dyn RouteModule>,
    table: OnceCell<Arc<RuleTable>>,
}

impl ModuleSlot {
    fn new<M: RouteModule + Default>() -> Self {
        Self {
            name: type_name::<M>(),
            module: Arc::new(M::default()),
            table: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn module(&self) -> &Arc<dyn RouteModule> {
        &self.module
    }
}

impl fmt::Debug for ModuleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSlot")
            .field("name", &self.name)
            .field("table_built", &self.table.get().is_some())
            .finish()
    }
}

static GLOBAL: Lazy<Arc<ModuleRegistry>> = Lazy::new(|| Arc::new(ModuleRegistry::new()));

/// Create-once cache of module instances.
#[derive(Debug)]
pub struct ModuleRegistry {
    slots: DashMap<TypeId, Arc<ModuleSlot>>,
    lock_timeout: Duration,
    constructed: AtomicUsize,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Registry whose module tables use `lock_timeout`.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            lock_timeout,
            constructed: AtomicUsize::new(0),
        }
    }

    /// The process-wide registry.
    pub fn global() -> Arc<ModuleRegistry> {
        GLOBAL.clone()
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// The singleton slot for `M`, constructing it on first use.
    pub fn slot<M: RouteModule + Default>(&self) -> Arc<ModuleSlot> {
        let key = TypeId::of::<M>();
        if let Some(slot) = self.slots.get(&key) {
            return slot.value().clone();
        }

        self.slots
            .entry(key)
            .or_insert_with(|| {
                self.constructed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(module = type_name::<M>(), "Constructing routing module");
                Arc::new(ModuleSlot::new::<M>())
            })
            .value()
            .clone()
    }

    /// The module's own rule table, configured and sorted on first use.
    pub fn module_table(self: &Arc<Self>, slot: &ModuleSlot) -> Result<Arc<RuleTable>, RouteError> {
        slot.table
            .get_or_try_init(|| {
                let table = RuleTable::with_registry(slot.name, self.clone(), self.lock_timeout);
                table.load_slot(slot)?;
                table.sort()?;
                tracing::debug!(module = slot.name, rules = table.len()?, "Module rule table built");
                Ok(Arc::new(table))
            })
            .cloned()
    }

    /// Forget the instance of `M`; the next use constructs a new one.
    pub fn invalidate<M: RouteModule>(&self) -> bool {
        self.slots.remove(&TypeId::of::<M>()).is_some()
    }

    /// Forget every module instance.
    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn contains<M: RouteModule>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<M>())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of module instances constructed so far.
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::Relaxed)
    }
}

/// Type-erased reference to a module, stored in module rules.
#[derive(Clone, Copy)]
pub struct ModuleBinding {
    name: &'static str,
    slot: fn(&ModuleRegistry) -> Arc<ModuleSlot>,
}

impl ModuleBinding {
    pub fn of<M: RouteModule + Default>() -> Self {
        Self {
            name: type_name::<M>(),
            slot: slot_of::<M>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Resolve the module's singleton slot in `registry`.
    pub fn resolve(&self, registry: &ModuleRegistry) -> Arc<ModuleSlot> {
        (self.slot)(registry)
    }
}

impl fmt::Debug for ModuleBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleBinding").field(&self.name).finish()
    }
}

fn slot_of<M: RouteModule + Default>(registry: &ModuleRegistry) -> Arc<ModuleSlot> {
    registry.slot::<M>()
}

/// Loads `M` into a table; the function behind `register_module!`.
pub fn load_module<M: RouteModule + Default>(table: &RuleTable) -> Result<(), RouteError> {
    table.load::<M>().map(|_| ())
}

/// A discoverable module.
#[derive(Clone, Copy)]
pub struct ModuleRegistration {
    name: &'static str,
    load: fn(&RuleTable) -> Result<(), RouteError>,
}

impl ModuleRegistration {
    pub const fn new(name: &'static str, load: fn(&RuleTable) -> Result<(), RouteError>) -> Self {
        Self { name, load }
    }

    pub fn of<M: RouteModule + Default>() -> Self {
        Self::new(type_name::<M>(), load_module::<M>)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Load the module into `table`.
    pub fn load(&self, table: &RuleTable) -> Result<(), RouteError> {
        (self.load)(table)
    }
}

impl fmt::Debug for ModuleRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleRegistration").field(&self.name).finish()
    }
}

inventory::collect!(ModuleRegistration);

/// Register a `RouteModule + Default` type for discovery by the router.
///
/// ```ignore
/// #[derive(Default)]
/// struct SiteModule;
/// rule_router::register_module!(SiteModule);
/// ```
#[macro_export]
macro_rules! register_module {
    ($module:ty) => {
        $crate::inventory::submit! {
            $crate::routing::module::ModuleRegistration::new(
                stringify!($module),
                $crate::routing::module::load_module::<$module>,
            )
        }
    };
}

/// Enumerates the modules the root table is built from.
pub trait ModuleDiscovery: Send + Sync {
    fn find_route_modules(&self) -> Vec<ModuleRegistration>;
}

/// Discovers modules registered with `register_module!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryDiscovery;

impl ModuleDiscovery for InventoryDiscovery {
    fn find_route_modules(&self) -> Vec<ModuleRegistration> {
        let mut found: Vec<ModuleRegistration> = Vec::new();
        for registration in inventory::iter::<ModuleRegistration> {
            found.push(*registration);
        }
        // Link order is not stable across builds.
        found.sort_by(|a, b| a.name.cmp(b.name));
        found
    }
}

/// A fixed list of modules.
#[derive(Debug, Default, Clone)]
pub struct StaticDiscovery {
    modules: Vec<ModuleRegistration>,
}

impl StaticDiscovery {
    pub fn new(modules: Vec<ModuleRegistration>) -> Self {
        Self { modules }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl ModuleDiscovery for StaticDiscovery {
    fn find_route_modules(&self) -> Vec<ModuleRegistration> {
        self.modules.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::handler::FnHandler;
    use std::sync::atomic::AtomicUsize;

    static CONFIGURED: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct CountingModule;

    impl RouteModule for CountingModule {
        fn configure(&self, table: &RuleTable) -> Result<(), RouteError> {
            CONFIGURED.fetch_add(1, Ordering::SeqCst);
            table.route_fn("/ping$", FnHandler::new(|_, _| Ok(())))?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct OtherModule;

    impl RouteModule for OtherModule {
        fn configure(&self, _table: &RuleTable) -> Result<(), RouteError> {
            Ok(())
        }
    }

    #[test]
    fn test_slot_is_singleton_per_type() {
        let registry = ModuleRegistry::new();
        let a = registry.slot::<CountingModule>();
        let b = registry.slot::<CountingModule>();
        let c = registry.slot::<OtherModule>();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.constructed(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_invalidate_forces_new_instance() {
        let registry = ModuleRegistry::new();
        let first = registry.slot::<OtherModule>();
        assert!(registry.invalidate::<OtherModule>());
        assert!(!registry.contains::<OtherModule>());
        let second = registry.slot::<OtherModule>();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!registry.invalidate::<CountingModule>());
    }

    #[test]
    fn test_module_table_configured_once() {
        let registry = Arc::new(ModuleRegistry::new());
        let slot = registry.slot::<CountingModule>();
        let before = CONFIGURED.load(Ordering::SeqCst);
        let t1 = registry.module_table(&slot).unwrap();
        let t2 = registry.module_table(&slot).unwrap();
        assert!(Arc::ptr_eq(&t1, &t2));
        assert_eq!(CONFIGURED.load(Ordering::SeqCst) - before, 1);
        assert_eq!(t1.len().unwrap(), 1);
        assert!(t1.is_sorted().unwrap());
    }

    #[test]
    fn test_binding_resolves_through_registry() {
        let registry = ModuleRegistry::new();
        let binding = ModuleBinding::of::<OtherModule>();
        assert!(binding.name().ends_with("OtherModule"));
        let slot = binding.resolve(&registry);
        assert!(Arc::ptr_eq(&slot, &registry.slot::<OtherModule>()));
    }

    #[test]
    fn test_static_discovery() {
        let discovery = StaticDiscovery::new(vec![ModuleRegistration::of::<OtherModule>()]);
        let found = discovery.find_route_modules();
        assert_eq!(found.len(), 1);
        assert!(found[0].name().ends_with("OtherModule"));
        assert!(StaticDiscovery::empty().find_route_modules().is_empty());
    }
}
