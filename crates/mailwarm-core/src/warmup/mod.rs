//! The warm-up pipeline.
//!
//! ```text
//! Orchestrator::run_once
//!   └─ per active inbox (concurrently, isolated)
//!        ├─ PlanSchedule::plan_for ─→ due count
//!        ├─ WarmupStore::count_sends_since ─→ catch-up count
//!        ├─ repeat: choose peer → compose → execute_send → append_send_log
//!        └─ poll_and_react (never fails)
//! ```

pub mod composer;
pub mod executor;
pub mod inbound;
pub mod orchestrator;
pub mod peers;
pub mod plan;
mod settings;

pub use composer::{ComposedMessage, compose};
pub use executor::{SendOutcome, execute_send, truncate_error};
pub use inbound::{InboundFailure, InboundReport, InboundStep, poll_and_react};
pub use orchestrator::{InboxOutcome, Orchestrator, TickReport};
pub use peers::choose;
pub use plan::{PlanSchedule, daily_plan, due_count, minute_of_day, start_of_day};
pub use settings::WarmupSettings;
