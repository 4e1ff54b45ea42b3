// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Policy Store: discovers desired-state documents, lints them against the
//! rule table and builds a content-addressed `PolicySet`.

mod rules;
mod source;
mod store;
mod violation;

pub use rules::{lint_document, LintContext, BREAK_GLASS_NAMES, REQUIRED_TOP_LEVEL};
pub use source::{discover_documents, parse_document, parse_document_text, DocumentFormat};
pub use store::{
    default_required_metadata, load, load_documents, PolicyStoreConfig, DEFAULT_NAMING_PATTERN,
    DEFAULT_REQUIRED_METADATA,
};
pub use violation::{PolicyValidationError, PolicyViolation, ViolationKind};

pub const CRATE_NAME: &str = "bijux-fleet-policies";
