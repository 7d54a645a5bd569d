//! Record types for the PicklePot backend.
//!
//! Request bodies are decoded into these types and validated before anything is stored.

mod checkout;
mod entry;
mod pot;
mod roster;
mod subscription;

pub use checkout::*;
pub use entry::*;
pub use pot::*;
pub use roster::*;
pub use subscription::*;
