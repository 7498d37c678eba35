//! Command implementations for the folio CLI
//!
//! Each command lives in its own submodule and takes the resolved [`App`]
//! (or just the configuration) plus the output format.
//!
//! [`App`]: crate::context::App

mod cache;
mod page;
mod prefetch;
mod toc;
mod view;

pub use cache::{clear, evict, keys, usage};
pub use page::execute as load_page;
pub use prefetch::execute as prefetch;
pub use toc::execute as show_toc;
pub use view::execute as view;
