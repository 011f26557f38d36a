pub mod normalize;
pub mod template;

pub use normalize::normalize_separators;
pub use template::{ParsedText, ParserError, TemplateParser};
