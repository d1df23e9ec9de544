use rand::{distr::Alphanumeric, Rng};
use uuid::Uuid;

/// Length of the shareable identifier handed out for published forms.
pub const PUBLIC_ID_LEN: usize = 10;

/// Short URL-safe identifier used in public form links.
pub fn generate_public_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(PUBLIC_ID_LEN)
        .map(char::from)
        .collect()
}

/// Fills an empty client-side id with a fresh UUID.
pub fn ensure_id(id: &mut String) {
    if id.trim().is_empty() {
        *id = Uuid::new_v4().to_string();
    }
}
