pub mod build_prompt;
pub mod degraded_fallback;
pub mod generate;
pub mod parse;
pub mod repair_retry;
pub mod success;

pub use build_prompt::BuildPromptTask;
pub use degraded_fallback::DegradedFallbackTask;
pub use generate::GenerateTask;
pub use parse::ParseTask;
pub use repair_retry::RepairRetryTask;
pub use success::SuccessTask;
