pub mod engine;
pub mod plugins;
pub mod sandbox;

pub use engine::{DecisionPlugin, PolicyChangeLogEntry, PolicyEngine, PolicyEngineError, PolicyInput};
pub use plugins::{BusinessHoursPlugin, CostAwarePlugin, RoleBasedPlugin};
pub use sandbox::{PluginSandbox, SandboxViolation};
