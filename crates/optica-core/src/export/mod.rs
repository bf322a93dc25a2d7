//! Receipt printing and sales export.

mod receipt;
mod sales;

pub use receipt::*;
pub use sales::*;
