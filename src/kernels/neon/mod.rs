pub mod dot;

pub use dot::dot_span_i8;
