pub mod comment;
pub mod trade_review;

pub use comment::*;
pub use trade_review::*;
