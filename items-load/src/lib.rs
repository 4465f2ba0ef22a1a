//! Load profile for the items API
//!
//! Simulated users list items (weight 3), read a random item by id (weight 2) and create items
//! (weight 1), pausing between one and five seconds after each action.
pub mod item;
pub mod user;

pub use item::Item;
pub use user::ApiUser;
