pub use config::{ConfigError, ConfigManager, ConfigOption, ConfigSchema};
pub use error::EngineError;
pub use fader::{FadeChannel, FaderHandle, GenericFader};
pub use messages::{EngineSettings, TimerEvent};
pub use output::{OutputMap, OutputSink};
pub use timer::{
    shared_dmx_source, shared_function, DmxSource, DmxSourceRegistry, FadeOutController,
    FadeProgress, Function, FunctionRegistry, FunctionStatus, MasterTimer, SharedDmxSource,
    SharedFunction,
};
pub use universe::{
    ChannelGroup, GrandMaster, GrandMasterChannelMode, GrandMasterValueMode, UniverseArray,
    UNIVERSE_SIZE,
};

mod config;
mod error;
mod fader;
pub mod messages;
mod output;
mod timer;
mod universe;
