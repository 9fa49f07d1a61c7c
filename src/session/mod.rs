pub mod history_stack;


pub use history_stack::*;
