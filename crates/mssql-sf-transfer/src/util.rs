//! Small shared helpers.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

/// Generate `len` random alphanumeric characters from the OS entropy source.
///
/// Used for transfer ids and object-key suffixes, so collisions must be
/// negligible across the process lifetime.
pub fn random_characters(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
