pub mod order_number;

pub use order_number::{is_valid_order_number, new_order_number};
