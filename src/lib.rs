//! vmg2eml: convert legacy vMessage (VMG) containers to EML message files.
//!
//! VMG is a nested BEGIN/END block format used by older mobile handsets to
//! store multimedia messages. This crate walks the block grammar of one
//! container file at a time and writes each contained body block out as a
//! standard `.eml` file, named after a message identifier synthesized from
//! the `From` address and `Date` header.
//!
//! # Example
//!
//! ```no_run
//! use vmg2eml::convert_file;
//!
//! fn main() -> vmg2eml::Result<()> {
//!     let emitted = convert_file(std::path::Path::new("inbox.vmg"))?;
//!     for path in emitted {
//!         println!("{}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`buffer`]: forward-only lookahead buffer over a byte source
//! - [`parser`]: recursive-descent walker over the block grammar
//! - [`message`]: header extraction, identifier synthesis, `.eml` emission
//! - [`error`]: error types and handling

pub mod buffer;
pub mod error;
pub mod message;
pub mod parser;

// Re-export commonly used types
pub use buffer::SourceBuffer;
pub use error::{Result, VmgError};
pub use parser::{convert_file, convert_stream};
