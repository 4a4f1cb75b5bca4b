//! Id generation.
//!
//! Random v4 UUIDs, so two ids minted in the same millisecond never collide.

use uuid::Uuid;

pub fn row_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn user_id() -> String {
    format!("local_{}", Uuid::new_v4().simple())
}
