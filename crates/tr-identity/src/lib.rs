//! Content identity for testrelay reports.
//!
//! Produces stable, deterministic identifiers for structurally-comparable
//! values: two values with the same normalized content always hash the same,
//! regardless of field insertion order.
//!
//! # Key Features
//!
//! - **Canonicalization**: sorted keys, `null`/empty members dropped, integral
//!   floats printed as integers.
//! - **Tuple identities**: length-prefixed parts for dedup keys such as
//!   `(parentSuiteId, file, title)`.
//! - **Sentinel grouping**: [`ContentId::no_suite`] for top-level entities.
//!
//! # Example
//!
//! ```
//! use tr_identity::{content_id, content_id_of_parts};
//! use serde_json::json;
//!
//! let a = content_id(&json!({"name": "linux", "data": {"x": 1, "y": 2}})).unwrap();
//! let b = content_id(&json!({"data": {"y": 2, "x": 1}, "name": "linux"})).unwrap();
//! assert_eq!(a, b);
//!
//! let suite = content_id_of_parts(&["no-suite", "tests/a.spec.ts", "login"]);
//! assert_eq!(suite.as_str().len(), 32);
//! ```

pub mod canonicalize;
pub mod error;
pub mod hash;

pub use canonicalize::{Canonicalizer, CANONICALIZATION_VERSION};
pub use error::{IdentityError, Result};
pub use hash::{content_id, content_id_of_parts, ContentHasher, ContentId, DEFAULT_TRUNCATION_BYTES};
