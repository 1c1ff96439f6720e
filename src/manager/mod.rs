//! Manager contract, registration setups and the default JSON-driven manager.

mod default;
mod traits;

pub use default::{Backend, DefaultManager};
pub use traits::{set_route, Manager, SetRoute, Setup};
