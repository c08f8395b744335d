mod asset;
mod block;
mod dependency;
mod history;
mod project;

pub use asset::*;
pub use block::*;
pub use dependency::*;
pub use history::*;
pub use project::*;
