//! Directory store: persistence for directory-eligible rooms.

mod models;
mod queries;

pub use models::RoomRecord;
pub use queries::RoomRepository;
