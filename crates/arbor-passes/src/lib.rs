//! The semantic pass family of Arbor, and the hook tables of the
//! reference "JL" node kinds they run over.
//!
//! Every pass is a visitor type plus per-kind hooks registered in the
//! factory built by [`jl::factory`]. [`pipeline::standard_passes`] lists
//! them in the order the scheduler runs them.

pub mod ambiguity;
pub mod ascription;
pub mod constants;
pub mod disambiguate;
pub mod env;
pub mod imports;
pub mod jl;
pub mod members;
pub mod pipeline;
pub mod scope;
pub mod simplify;
pub mod ts;
pub mod typecheck;

pub use ambiguity::ambiguity_count;
pub use env::PassEnv;
pub use pipeline::{PipelineError, select_passes, standard_passes};
