//! Shannon Entropy
//!
//! Byte-frequency entropy over the whole file, in bits per byte [0,8].
//! High values are a proxy for packed or encrypted payloads.

/// Shannon entropy of the byte-value distribution. Empty input yields 0.
pub fn entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }

    let mut counts = [0u64; 256];
    for &b in bytes {
        counts[b as usize] += 1;
    }

    let total = bytes.len() as f64;
    let mut result = 0.0;
    for &count in &counts {
        if count > 0 {
            let p = count as f64 / total;
            result -= p * p.log2();
        }
    }

    result
}

// ============================================================================
// TESTS
// ============================================================================
