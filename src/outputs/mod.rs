//! Output files written alongside the database.
//!
//! # Submodules
//!
//! - [`archive`]: Plain-text dump of each page fetched during the initial load
//!
//! # Output Structure
//!
//! ```text
//! archive_dir/
//! ├── NewsPage1.txt
//! ├── NewsPage2.txt
//! └── ...
//! ```

pub mod archive;
