mod string_array;

pub use string_array::{StringArray, StringArrayError, zero_padded};
