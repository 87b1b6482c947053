pub mod error;
pub mod export;
pub mod import;
pub mod store;

pub use error::StoreError;
pub use store::{QueryOutput, TableStore};
