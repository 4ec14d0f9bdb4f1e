/// Generates a random ID.
pub fn random_id() -> u32 {
    rand::random()
}
