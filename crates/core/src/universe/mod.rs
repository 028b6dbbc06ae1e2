pub mod grand_master;
pub mod universe_array;

pub use grand_master::{GrandMaster, GrandMasterChannelMode, GrandMasterValueMode};
pub use universe_array::{ChannelGroup, UniverseArray, UNIVERSE_SIZE};
