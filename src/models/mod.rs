pub mod activity;
pub mod report;
pub mod token;

pub use activity::ActivityRecord;
pub use report::{AggregateResult, PredictionResult};
pub use token::TokenState;
