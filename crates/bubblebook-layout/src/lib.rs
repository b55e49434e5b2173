//! BubbleBook Layout - PDF assembly of the finished picture book
//!
//! Turns page records (an illustration plus styled story lines) into a
//! 20 cm square PDF: a cover page followed by content pages.

pub mod book;
pub mod pages;
pub mod render;
pub mod resize;

pub use book::{BookLayout, BuildReport, DEFAULT_IMAGE_DPI};
pub use pages::{builtin_story, BookFile, PageKind, PageRecord, TextItem, TextKind, DEFAULT_OUTPUT};
pub use resize::{resize_to_fit, TempImage};
