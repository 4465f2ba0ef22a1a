use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_READ_ID: u32 = 1;
pub const MAX_READ_ID: u32 = 100;
pub const NAME_LEN: usize = 8;

/// Request payload for `POST /items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
}

impl Item {
    /// A new item with a fresh UUID v4 id and a random name.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: random_name(rng),
        }
    }
}

/// Id for `GET /items/{id}`, a decimal string in `[1, 100]`. It may well not exist.
pub fn random_read_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(MIN_READ_ID..=MAX_READ_ID).to_string()
}

pub fn random_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..NAME_LEN)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}
