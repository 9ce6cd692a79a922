const ALPHABET_62: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHABET_95: &str = r##" !"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\]^_`abcdefghijklmnopqrstuvwxyz{|}~"##;

/// Converts packer tokens back into symbol table indices.
#[derive(Debug, Clone)]
pub struct Unbase {
    radix: u32,
    alphabet: Option<&'static [u8]>,
}

impl Unbase {
    pub fn new(radix: u32) -> Self {
        let alphabet = match radix {
            37..=62 => Some(&ALPHABET_62.as_bytes()[..radix as usize]),
            63..=95 => Some(&ALPHABET_95.as_bytes()[..radix as usize]),
            _ => None,
        };

        Self { radix, alphabet }
    }

    pub fn radix(&self) -> u32 {
        self.radix
    }

    /// `None` when the token has no value in this radix, or does not fit in 64 bits.
    pub fn unbase(&self, token: &str) -> Option<u64> {
        match self.alphabet {
            Some(alphabet) => self.from_alphabet(alphabet, token),
            None => self.from_prefix(token),
        }
    }

    /// Read the longest valid prefix with digits `0-9a-z`, case insensitive.
    fn from_prefix(&self, token: &str) -> Option<u64> {
        if !(2..=36).contains(&self.radix) {
            return None;
        }

        let mut value: Option<u64> = None;

        for c in token.chars() {
            let Some(digit) = c.to_digit(self.radix) else {
                break;
            };

            value = Some(
                value
                    .unwrap_or(0)
                    .checked_mul(self.radix as u64)?
                    .checked_add(digit as u64)?,
            );
        }

        value
    }

    /// Characters missing from the alphabet count as digit zero.
    fn from_alphabet(&self, alphabet: &[u8], token: &str) -> Option<u64> {
        let radix = self.radix as u64;
        let mut value = 0u64;
        let mut weight = 1u64;

        for (i, c) in token.bytes().rev().enumerate() {
            if i > 0 {
                weight = weight.checked_mul(radix)?;
            }

            let digit = alphabet.iter().position(|x| *x == c).unwrap_or(0) as u64;
            value = value.checked_add(digit.checked_mul(weight)?)?;
        }

        Some(value)
    }
}

#[cfg(test)]
pub(super) fn encode(mut value: u64, radix: u32) -> String {
    let alphabet = match radix {
        2..=62 => &ALPHABET_62.as_bytes()[..radix as usize],
        _ => &ALPHABET_95.as_bytes()[..radix as usize],
    };

    let mut digits = vec![];

    loop {
        digits.push(alphabet[(value % radix as u64) as usize]);
        value /= radix as u64;

        if value == 0 {
            break;
        }
    }

    digits.reverse();
    String::from_utf8(digits).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_zero() {
        for radix in [2, 10, 36, 40, 62, 70, 95] {
            let zero = encode(0, radix);
            assert_eq!(Unbase::new(radix).unbase(&zero), Some(0), "radix {}", radix);
        }
    }

    #[test]
    fn deterministic() {
        let unbase = Unbase::new(62);
        assert_eq!(unbase.unbase("Zz"), unbase.unbase("Zz"));
        assert_eq!(unbase.unbase("Zz"), Some(61 * 62 + 35));
    }

    #[test]
    fn radix_36_prefix() {
        let unbase = Unbase::new(36);
        assert_eq!(unbase.unbase("a5"), Some(365));
        assert_eq!(unbase.unbase("A5"), Some(365));
        assert_eq!(unbase.unbase("1l"), Some(57));
        assert_eq!(unbase.unbase("_x"), None);

        let unbase = Unbase::new(10);
        assert_eq!(unbase.unbase("12ab"), Some(12));
    }

    #[test]
    fn truncated_alphabets() {
        // 'Z' is outside a 40 character alphabet and counts as zero
        assert_eq!(Unbase::new(40).unbase("1Z"), Some(40));
        assert_eq!(Unbase::new(40).unbase("1c"), Some(52));
        assert_eq!(Unbase::new(95).unbase("!"), Some(1));
        assert_eq!(Unbase::new(96).unbase("1"), None);
    }

    #[test]
    fn overflow_has_no_value() {
        assert_eq!(Unbase::new(62).unbase("ZZZZZZZZZZZZZZZZ"), None);
        assert_eq!(Unbase::new(36).unbase("zzzzzzzzzzzzzzzz"), None);
    }

    #[test]
    fn encode_matches_unbase() {
        for radix in [10, 36, 62, 95] {
            let unbase = Unbase::new(radix);
            for value in [0, 1, 35, 61, 62, 367, 9000] {
                assert_eq!(unbase.unbase(&encode(value, radix)), Some(value));
            }
        }
    }
}
