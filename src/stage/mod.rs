//! Content stages that shield regions from the Markdown renderer and
//! render them afterwards: math, diagrams, and code.

pub mod code;
pub mod diagram;
pub mod math;

pub use code::{CodeOptions, Highlighter};
pub use diagram::DiagramRenderer;
pub use math::MathRenderer;
