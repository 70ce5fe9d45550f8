pub mod checkpoint;
pub mod machine;
pub mod state;
pub mod traits;

pub use checkpoint::*;
pub use machine::*;
pub use state::*;
pub use traits::*;
