// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Jenkins one-at-a-time hash, used to place keys in the store's slot array.

/// Jenkins one-at-a-time hash over a byte slice.
///
/// This is the hash the store indexes with; it is not cryptographic and is
/// not meant to be. It only needs to scatter keys evenly across slots.
pub fn jenkins_one_at_a_time(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0;
    for &b in bytes {
        hash = hash.wrapping_add(b as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(jenkins_one_at_a_time(b"foo"), jenkins_one_at_a_time(b"foo"));
    }

    #[test]
    fn distinguishes_distinct_keys() {
        assert_ne!(jenkins_one_at_a_time(b"foo"), jenkins_one_at_a_time(b"bar"));
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(jenkins_one_at_a_time(b""), 0);
    }
}
