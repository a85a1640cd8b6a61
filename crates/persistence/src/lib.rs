pub mod schema;
pub mod store;

pub use store::{SessionStatus, Store, StoredMessage, StoredSession};
