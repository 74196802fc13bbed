pub use crate::diagnostics::{ApprovalError, Comparison, ErrorCategory};
pub use crate::matcher::{JsonMatcher, Verdict};
pub use crate::store::TestMeta;
pub use crate::value::{ObjectRef, TypeName, Value};

pub mod canonical;
pub mod cli;
pub mod compare;
pub mod config;
pub mod cycles;
pub mod diagnostics;
pub mod encode;
pub mod filter;
pub mod matcher;
pub mod profile;
pub mod store;
pub mod value;
