//! Cache lifecycle MCP tools.
//!
//! Each tool delivers one lifecycle event to the worker, or inspects the
//! generation store.

pub mod activate;
pub mod fetch;
pub mod generations;
pub mod install;

pub use activate::activate_impl;
pub use fetch::{CacheFetchParams, fetch_impl};
pub use generations::generations_impl;
pub use install::install_impl;
