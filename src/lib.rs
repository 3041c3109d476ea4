//! Workspace façade crate.
//!
//! Exposes feature flags that map onto the individual workspace crates so a
//! host application can depend on `media-import-workspace` and pick the
//! desktop bridges (`desktop-shims`) or bring its own (`headless`) without
//! wiring every crate by hand.

#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_import;
#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_service::{
    CommandReply, ControllerCommand, CoreConfig, CoreError, CoreService, ImportController,
};
