pub mod http;
pub mod memory;
pub mod repository;

pub use http::{ApiConfig, HttpInitError, HttpRepository};
pub use memory::InMemoryRepository;
pub use repository::{Storage, StorageError};
