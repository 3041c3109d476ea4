//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the import core:
//! - Configuration (`CoreConfig`) and job settings (`ImportSettings`)
//! - Event bus carrying import and transfer events
//! - Logging and tracing setup

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod settings;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream, ImportEvent, ImportSummary, TransferEvent};
pub use settings::{
    DateFolderFormat, DestinationConfig, DestinationKind, FolderMode, FolderOrganizationConfig,
    ImportSettings,
};
