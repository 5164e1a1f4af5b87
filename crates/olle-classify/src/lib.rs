// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Request classification and model selection.
//!
//! Every inbound chat/generate request is classified into a
//! [`Classification`] — task type, complexity, language, recommended model,
//! planning flag — by keyword matching against a fixed catalog, with
//! embeddings from the backend used only to break ties between task
//! categories.  Classification is deterministic given the same prompt,
//! catalog, and inventory; embedding failures degrade to pure keyword
//! matching rather than failing the request.

mod catalog;
mod classifier;
mod select;

pub use catalog::{static_catalog, Catalog};
pub use classifier::{Classification, Classifier, Complexity, Language, TaskType};
