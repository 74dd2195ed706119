use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a fresh challenge code of `len` uppercase letters/digits.
///
/// One code is generated per sign-in attempt and stored in the flow context;
/// it is never reused across attempts.
pub fn challenge(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Presentation form of a code: characters spaced out so the answer has to be
/// typed back rather than forwarded verbatim.
pub fn spaced(code: &str) -> String {
    let mut out = String::with_capacity(code.len() * 2);
    for (i, c) in code.chars().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

/// Case-insensitive comparison of a typed reply against the stored code.
pub fn matches(expected: &str, input: &str) -> bool {
    expected.eq_ignore_ascii_case(input.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_has_requested_length_and_charset() {
        for len in [3usize, 5, 8] {
            let code = challenge(len);
            assert_eq!(code.chars().count(), len);
            assert!(code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn spaced_inserts_single_spaces() {
        assert_eq!(spaced("AB3K9"), "A B 3 K 9");
        assert_eq!(spaced(""), "");
    }

    #[test]
    fn matching_ignores_case_and_padding() {
        assert!(matches("AB3K9", " ab3k9 "));
        assert!(!matches("AB3K9", "AB3K0"));
    }
}
