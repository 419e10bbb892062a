/// FNV-1a hash (32-bit).
///
/// Stable across processes and platforms, so every orchestrator routes a key
/// to the same owners.
pub fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}
