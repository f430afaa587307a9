//! Directory collaborator: the backend contract for managed identities, the
//! in-memory mock table, id generation and the roster search projection.

mod backend;
mod filter;
mod ids;

pub use backend::{DirectoryBackend, MockDirectory};
pub use filter::filter_roster;
pub use ids::IdGenerator;
