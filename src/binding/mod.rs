//! Data-bound accessor: a value that re-fetches itself when its keys change
//!
//! ```ignore
//! let teams = DataBinding::activate(transport.clone(), ["teams"], move || {
//!     let store = store.clone();
//!     async move { load_teams(&store) }
//! });
//!
//! let mut state = teams.watch();
//! while state.changed().await.is_ok() {
//!     render(&state.borrow_and_update());
//! }
//! ```

mod data_binding;


pub use data_binding::*;
