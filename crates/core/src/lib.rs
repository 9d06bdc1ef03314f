pub mod cache;
pub mod client;
pub mod config;
pub mod derive;
pub mod error;
pub mod form;
pub mod loader;
pub mod model;
pub mod mutation;
pub mod seed;
pub mod session;
pub mod store;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{LoadState, TaskCache};
pub use client::StoreClient;
pub use config::{AppConfig, Backend};
pub use error::{Error, RemoteFailure, Result, StoreError, ValidationErrors};
pub use form::{FormState, SubmitOutcome, TaskForm, TaskFormValues};
pub use model::*;
pub use mutation::{MutationController, MutationPhase, MutationReport, PendingMutation};
pub use session::{ErrorNotice, Route, Screen, Session, TopBar};
pub use store::RecordStore;
