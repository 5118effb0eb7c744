//! Application services layer.

pub mod wishlist;
