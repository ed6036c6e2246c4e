mod memory;
mod repository;
mod schema;
mod store;

pub use memory::MemoryStore;
pub use repository::Repository;
pub use store::ResultStore;
