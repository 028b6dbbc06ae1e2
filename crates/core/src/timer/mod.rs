pub mod dmx_source_registry;
pub mod fade_out;
pub mod function_registry;
pub mod master_timer;
pub mod traits;

// Re-export for convenience
pub use dmx_source_registry::DmxSourceRegistry;
pub use fade_out::{FadeOutController, FadeProgress};
pub use function_registry::FunctionRegistry;
pub use master_timer::MasterTimer;
pub use traits::{
    shared_dmx_source, shared_function, DmxSource, Function, FunctionStatus, SharedDmxSource,
    SharedFunction,
};
