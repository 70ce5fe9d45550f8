pub mod centrality;
pub mod community;
pub mod metrics;
pub mod risk;
pub mod simulation;
pub mod snapshot;

pub use centrality::*;
pub use community::*;
pub use metrics::*;
pub use risk::*;
pub use simulation::*;
pub use snapshot::*;
