//! Word fingerprints for public keys.
//!
//! A fingerprint is a deterministic, one-way rendering of a raw public key
//! as a sequence of dictionary words, for humans to compare out-of-band
//! during trust-on-first-use. It is never parsed back and never used for
//! machine verification.
//!
//! Encoding: the key bytes are read as one big-endian unsigned integer and
//! expanded in base 6; each digit is shifted from 0–5 to the dice range 1–6;
//! digits are consumed in groups of [`DICE_PER_WORD`], each group selecting
//! one word from a 6^4 = 1296 word dictionary; a short final group is
//! right-padded with the digit 1.

use std::sync::OnceLock;

use num_bigint::BigUint;

/// A fingerprint: the ordered sequence of selected dictionary words.
pub type Fingerprint = Vec<&'static str>;

/// Base-6 digits consumed per word; the dictionary holds 6^4 words.
pub const DICE_PER_WORD: usize = 4;

const WORDS_RAW: &str = include_str!("words.txt");

fn wordlist() -> &'static [&'static str] {
    static WORDS: OnceLock<Vec<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| WORDS_RAW.lines().filter(|line| !line.is_empty()).collect())
}

/// Encodes `bytes` as a word fingerprint.
///
/// Deterministic: equal inputs always yield the identical word sequence.
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    let words = wordlist();

    let mut digits = BigUint::from_bytes_be(bytes).to_radix_be(6);
    if digits.is_empty() {
        digits.push(0);
    }
    // Shift into dice range 1..=6.
    for digit in &mut digits {
        *digit += 1;
    }
    // Right-pad the final short group with the lowest die face.
    while digits.len() % DICE_PER_WORD != 0 {
        digits.push(1);
    }

    digits
        .chunks(DICE_PER_WORD)
        .map(|group| {
            let index = group
                .iter()
                .fold(0usize, |acc, &die| acc * 6 + usize::from(die - 1));
            words[index]
        })
        .collect()
}

/// Joins words with spaces, breaking the line after every `per_line` words.
///
/// Purely presentational; the fingerprint itself is the word sequence.
pub fn format_words(words: &[&str], per_line: usize) -> String {
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            out.push(if i % per_line == 0 { '\n' } else { ' ' });
        }
        out.push_str(word);
    }
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::{ProptestConfig, any, prop_assert, prop_assert_eq, proptest};

    use super::*;

    #[test]
    fn dictionary_is_complete_and_duplicate_free() {
        let words = wordlist();
        assert_eq!(words.len(), 6usize.pow(DICE_PER_WORD as u32));
        let mut sorted = words.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), words.len());
    }

    #[test]
    fn known_vectors() {
        // Independently computed with the algorithm above.
        assert_eq!(fingerprint(&[]), ["able"]);
        assert_eq!(fingerprint(&[0x00]), ["able"]);
        assert_eq!(fingerprint(&[0x01]), ["crook"]);
        assert_eq!(fingerprint(&[0xAB, 0xCD]), ["veto", "scar"]);
        assert_eq!(fingerprint(&[0xFF; 4]), ["grove", "deed", "grove", "mount"]);
    }

    #[test]
    fn a_32_byte_key_yields_a_fixed_width_rendering() {
        let key: Vec<u8> = (0u8..32).collect();
        let words = fingerprint(&key);
        assert_eq!(words.len(), 24);
        assert_eq!(
            words[..6],
            ["smitten", "tepid", "skin", "try", "stare", "knee"]
        );
    }

    #[test]
    fn format_breaks_after_every_fourth_word() {
        let words = ["a", "b", "c", "d", "e", "f"];
        assert_eq!(format_words(&words, 4), "a b c d\ne f");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn encoding_is_deterministic(bytes in any::<[u8; 32]>()) {
            prop_assert_eq!(fingerprint(&bytes), fingerprint(&bytes));
        }

        #[test]
        fn distinct_keys_get_distinct_fingerprints(
            a in any::<[u8; 32]>(),
            b in any::<[u8; 32]>(),
        ) {
            if a != b {
                prop_assert!(fingerprint(&a) != fingerprint(&b));
            }
        }
    }
}
