pub mod args;
pub mod clock;
pub mod domain;
pub mod error;
pub mod memory;
pub mod scanner;
pub mod server;
pub mod sqlite;
pub mod stats;
pub mod store;
pub mod utils;
pub mod visits;

pub use args::{Args, Command};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::extract_domain;
pub use error::{ServiceError, ValidationError};
pub use memory::MemoryStore;
pub use scanner::{DomainScanner, TimeInterval};
pub use server::AppState;
pub use sqlite::SqliteStore;
pub use stats::DomainScan;
pub use store::{BucketStore, KeyType, StoreError};
pub use visits::{Ack, VisitRecorder};
