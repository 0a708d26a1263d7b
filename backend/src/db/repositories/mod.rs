//! Plan store implementations.
//!
//! - `filesystem`: `<name>.json` + `<name>.fields` files under a storage root
//! - `local`: in-memory implementation for unit testing and dry runs
pub mod filesystem;
pub mod local;

pub use filesystem::FileSystemRepository;
pub use local::LocalRepository;
