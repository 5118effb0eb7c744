//! Domain layer types and invariants.

pub mod images;
pub mod product_form;
