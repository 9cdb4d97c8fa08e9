pub mod analysis;
pub mod config;
pub mod feedback;
pub mod incident;
pub mod verdict;

pub use analysis::*;
pub use config::{Config, TriageConfig};
pub use feedback::*;
pub use incident::*;
pub use verdict::*;
