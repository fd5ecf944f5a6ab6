//! 领域模型

pub mod change;
pub mod task;
