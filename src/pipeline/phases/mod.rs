//! Pipeline stages, numbered in run order
//!
//! Each stage owns its prompt builder and its parsing. Stages never touch
//! session bookkeeping directly; every outbound call goes through
//! [`RunContext`](crate::pipeline::context::RunContext).

#[path = "01_fetch.rs"]
pub mod fetch;
#[path = "02_understand.rs"]
pub mod understand;
#[path = "03_classify.rs"]
pub mod classify;
#[path = "04_select.rs"]
pub mod select;
#[path = "05_budget.rs"]
pub mod budget;
#[path = "06_analyze.rs"]
pub mod analyze;
#[path = "07_hierarchy.rs"]
pub mod hierarchy;
#[path = "08_summary.rs"]
pub mod summary;
