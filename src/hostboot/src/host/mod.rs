//! Host model: lifecycle status, per-host records, and the record store.

pub mod names;
pub mod record;
pub mod status;
pub mod store;

pub use names::{is_valid_host_name, parse_host_names};
pub use record::{BootLog, DiskInfo, HostRecord};
pub use status::{BootStatus, HostCategory, Transition};
pub use store::{HostStore, StatusSummary};
