//! In-memory data stores backing the laptop service.
//!
//! Each store guards its own map; no operation spans more than one store.

/// Image payload sinks.
pub mod image;
/// Laptop catalog with filtered search.
pub mod laptop;
/// Rating accumulator.
pub mod rating;

pub use image::{DiskImageStore, ImageStore, InMemoryImageStore};
pub use laptop::{InMemoryLaptopStore, ensure_laptop_id, is_qualified, to_bit};
pub use rating::{InMemoryRatingStore, Rating};
