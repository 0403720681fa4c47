//! Typed repositories over the document store.
//!
//! Records are plain values; every domain query shape (by email, by
//! connection code, by due-reminder predicate) lives here.

pub mod tasks;
pub mod users;

pub use tasks::TaskRepository;
pub use users::UserRepository;
