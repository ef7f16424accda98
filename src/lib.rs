//! Injector - live code injection for running apps
//!
//! Accepts connections from instrumented apps, recovers the compiler
//! invocation for each edited file from the IDE's build logs, recompiles
//! it, links the objects into a loadable bundle and tells the app to load
//! it.

pub mod bundler;
pub mod config;
pub mod engine;
pub mod fsutil;
pub mod logging;
pub mod plugin;
pub mod project;
pub mod resources;
pub mod shell;
pub mod transport;
pub mod ui;

pub use bundler::{BundleBuilder, BundleError, ChangedFile};
pub use config::{Config, ConfigError, Preferences};
pub use engine::{
    parse_line, Command, Engine, EngineSettings, InjectionError, InjectionRequest, InjectionState,
    TriggerSource,
};
pub use plugin::{HeadlessPlugin, IdePlugin};
pub use project::{ProjectError, XcodeProject};
pub use resources::{ResourceLocator, Template};
pub use transport::{ClientHandle, ClientInfo, Server, ServerEvent, TransportError};
pub use ui::{BundleState, Ui, UiEvent};
