//! Writer prose and math rendering.

pub mod heuristic;
pub mod html;
pub mod math;
pub mod prose;

pub use heuristic::looks_like_math;
pub use math::{MathMlTypesetter, MathMode, MathRenderer, RenderedMath, TypesetError, Typesetter};
pub use prose::{render_markdown, ProseRenderer};
