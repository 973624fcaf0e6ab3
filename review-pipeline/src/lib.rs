//! Ranking, image curation, review writing and assembly for one keyword.

pub mod assembler;
pub mod generator;
pub mod pipeline;
pub mod ranker;
pub mod selector;
pub mod stats;
pub mod template;

pub use assembler::assemble;
pub use generator::TextGenerator;
pub use pipeline::ReviewPipeline;
pub use ranker::PostRanker;
pub use selector::{heuristic_order, parse_selection, ImageSelector};
pub use stats::{AspectSignals, ReviewStats, TermCount};
pub use template::{render_review, REVIEW_SECTIONS};
