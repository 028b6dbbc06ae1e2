pub mod generic_fader;

pub use generic_fader::{FadeChannel, FaderHandle, GenericFader};
