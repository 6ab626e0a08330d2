use sha2::{Digest, Sha256};

/// Number of distinct avatar colors the rendering layer cycles through.
pub const PALETTE_SIZE: u8 = 13;

/// The letter shown on a user's avatar: first character, uppercased.
pub fn initials(user_name: &str) -> String {
    user_name
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect::<String>())
        .unwrap_or_default()
}

/// Deterministic palette slot for a user's avatar color.
///
/// Uses a fixed checksum over the UTF-8 bytes rather than the process hasher,
/// so the same name maps to the same color across runs and platforms.
pub fn color_index(user_name: &str) -> u8 {
    let digest = Sha256::digest(user_name.as_bytes());
    digest[0] % PALETTE_SIZE
}
