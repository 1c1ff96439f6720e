//! crudman: generic CRUD resources over HTTP.
//!
//! Register an entity type with a [`Manager`] and the [`Registry`] serves
//! list/create/update/delete for it on `/<table_name>`, persisting through a
//! pluggable [`StorageDriver`].

pub mod config;
pub mod driver;
pub mod entity;
pub mod error;
pub mod manager;
pub mod registry;
pub mod request;
pub mod response;
pub mod routes;
pub mod sql;
pub mod state;
pub mod validation;

pub use config::{PagerConfig, Settings};
pub use driver::{MemoryStore, PageResult, Paginator, PgDriver, PgPager, StorageDriver};
pub use entity::{Entity, Instance, TableType};
pub use error::{ConfigError, CrudError, RegistryError, StorageError};
pub use manager::{set_route, Backend, DefaultManager, Manager, SetRoute, Setup};
pub use registry::{Outcome, Registry};
pub use request::CrudRequest;
pub use response::Envelope;
pub use routes::{common_routes, crud_routes};
pub use state::AppState;
pub use validation::{AcceptAll, FieldRule, RuleValidator, ValidationErrors, Validator};
