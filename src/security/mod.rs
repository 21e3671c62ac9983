pub mod sanitizer;
pub mod validation;

pub use sanitizer::{strip_html_tags, ContentSanitizer, HtmlPurifier, PurifiedContent};
pub use validation::{ValidationError, ValidationResult, Validator};
