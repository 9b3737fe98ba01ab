//! Classic infrastructure resources

pub mod cdn;

pub use cdn::Cdn;
