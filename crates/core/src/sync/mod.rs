//! Calendar reconciliation engine.
//!
//! Control flow: a trigger (activity signal, webhook, timer, manual request)
//! asks the delta fetcher for a page of changes, the extractor normalizes
//! each raw event, and the reconciler merges candidates into the meeting
//! store without touching bot-owned state. The polling policy decides how
//! often the timer fires per user.

pub mod delta;
pub mod extractor;
pub mod policy;
pub mod ports;
pub mod reconciler;
