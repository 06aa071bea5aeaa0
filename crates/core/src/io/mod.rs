//! Reading and writing simulation stacks

mod native;

pub use native::{read_stack, read_stack_from_buffer, write_stack};
