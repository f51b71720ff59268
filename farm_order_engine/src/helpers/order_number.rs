//! Short, human-readable order references.
//!
//! Order numbers look like `FB-7K3Q2X`. The alphabet leaves out `0`, `O`, `1` and `I` so that customers can read them
//! out over the phone without ambiguity. Collisions are possible and are handled by the caller regenerating a new
//! number when the unique index on `orders.order_number` rejects an insert.
use rand::Rng;
use regex::Regex;

use crate::db_types::OrderNumber;

const ORDER_NUMBER_PREFIX: &str = "FB-";
const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ORDER_NUMBER_LEN: usize = 6;

pub fn new_order_number() -> OrderNumber {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ORDER_NUMBER_LEN)
        .map(|_| ORDER_NUMBER_ALPHABET[rng.gen_range(0..ORDER_NUMBER_ALPHABET.len())] as char)
        .collect();
    OrderNumber(format!("{ORDER_NUMBER_PREFIX}{suffix}"))
}

pub fn is_valid_order_number(s: &str) -> bool {
    Regex::new(r"^FB-[A-HJ-NP-Z2-9]{6}$").map(|re| re.is_match(s)).unwrap_or(false)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generated_numbers_are_valid() {
        for _ in 0..200 {
            let n = new_order_number();
            assert!(is_valid_order_number(n.as_str()), "{n} should be valid");
        }
    }

    #[test]
    fn rejects_ambiguous_characters() {
        assert!(is_valid_order_number("FB-ABC234"));
        assert!(!is_valid_order_number("FB-ABC230"));
        assert!(!is_valid_order_number("FB-ABCI23"));
        assert!(!is_valid_order_number("XX-ABC234"));
        assert!(!is_valid_order_number("FB-ABC2345"));
    }
}
