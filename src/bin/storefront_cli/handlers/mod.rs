#![deny(clippy::all, clippy::pedantic)]

pub mod product;
pub mod wishlist;
