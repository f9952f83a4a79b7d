// Kept out of line so the optimizer cannot short-circuit the fold.
#[inline(never)]
fn constant_time_ne(a: &[u8], b: &[u8]) -> u8 {
    debug_assert!(a.len() == b.len());

    let len = a.len();
    let a = &a[..len];
    let b = &b[..len];

    let mut tmp = 0;
    for i in 0..len {
        tmp |= a[i] ^ b[i];
    }
    tmp
}

/// Compares byte strings in constant time (with respect to their contents).
pub fn eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && constant_time_ne(a, b) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq() {
        assert!(eq(b"abc", b"abc"));
        assert!(!eq(b"abc", b"abd"));
        assert!(!eq(b"abc", b"abcd"));
        assert!(eq(b"", b""));
    }
}
