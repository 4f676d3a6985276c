pub mod agent;
pub mod assistant;
#[cfg(feature = "openai")]
pub mod client;
pub mod narrator;
pub mod prompts;
pub mod router;
pub mod types;

pub use agent::*;
pub use assistant::*;
#[cfg(feature = "openai")]
pub use client::*;
pub use narrator::{run_narrator, unsupported_amounts, Facts};
pub use router::{parse_router_output, run_router};
pub use types::*;
