//! Concrete agent implementations.

mod macro_analyst;

pub use macro_analyst::{MacroAnalystAgent, M2_SERIES};
