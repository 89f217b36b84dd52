pub mod credentials;
pub mod pc_registry;
pub mod presence_monitor;

pub use credentials::session_sweeper;
pub use presence_monitor::presence_monitor;
