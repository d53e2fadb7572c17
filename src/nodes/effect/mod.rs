//! Effect nodes (process inputs into outputs)

mod filter;
mod mixer;

pub use filter::{Filter, FilterKind, FilterMessage};
pub use mixer::Mixer;
