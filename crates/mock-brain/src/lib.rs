//! In-process AI providers for tests and demos.
//!
//! This crate provides mock implementations of the `Brain` trait:
//! - `EchoBrain` - Echoes the prompt back
//! - `DelayedBrain` - Wraps another brain with artificial delay
//! - `FailingBrain` - Fails every call with a fixed error
//! - `ScriptedBrain` - Replays a queue of canned replies and errors
//!
//! For a real provider, use the `http-brain` crate instead.
//!
//! # Example
//!
//! ```rust
//! use mock_brain::{Brain, BrainParams, EchoBrain};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mock_brain::BrainError> {
//!     let brain = EchoBrain::named("echo").with_prefix("You said: ");
//!
//!     let response = brain.generate("Hello!", &BrainParams::new()).await?;
//!     println!("Response: {}", response);
//!     Ok(())
//! }
//! ```

mod delayed;
mod echo;
mod failing;
mod scripted;

// Re-export brain-core types for convenience
pub use brain_core::{async_trait, Brain, BrainError, BrainParams};

pub use delayed::DelayedBrain;
pub use echo::EchoBrain;
pub use failing::FailingBrain;
pub use scripted::ScriptedBrain;
