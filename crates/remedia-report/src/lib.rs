//! remedia-report — Document rendering for remedia.
//!
//! [`guide::HtmlRenderer`] turns generated study guide text into a
//! self-contained HTML attachment; [`html`] renders a `BatchReport` for
//! humans.

pub mod guide;
pub mod html;

pub use guide::HtmlRenderer;
pub use html::{generate_html, write_html_report};
