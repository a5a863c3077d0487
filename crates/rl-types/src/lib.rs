pub mod analysis;
pub mod envelope;
pub mod errors;
pub mod inputs;
pub mod risk;

pub use analysis::*;
pub use envelope::*;
pub use errors::*;
pub use inputs::*;
pub use risk::*;
