//! Various unsorted geometrical and logical operators.

pub mod hashmap;
pub mod hashset;
