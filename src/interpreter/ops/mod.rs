pub mod binary;
pub mod unary;

pub(crate) use binary::binary_op;
pub(crate) use unary::{step_value, unary_op};
