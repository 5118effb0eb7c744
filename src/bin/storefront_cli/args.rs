//! Command-line surface for `storefront-cli`.

#![deny(clippy::all, clippy::pedantic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use storefront::config::ConfigOverrides;
use storefront::domain::product_form::Category;

#[derive(Parser, Debug)]
#[command(
    name = "storefront-cli",
    version,
    about = "Storefront wishlist and product draft CLI",
    long_about = None
)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigOverrides,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Wishlist management (lists, contents, items)
    Wishlist(WishlistArgs),
    /// Product draft checks
    Product(ProductArgs),
}

#[derive(Parser, Debug)]
pub struct WishlistArgs {
    #[command(subcommand)]
    pub action: WishlistCmd,
}

#[derive(Subcommand, Debug)]
pub enum WishlistCmd {
    /// Show every wishlist document
    Lists,
    /// Show the grouped wishlist contents
    Get,
    /// Create a new list
    Create {
        #[arg(long)]
        title: String,
    },
    /// Add a product to a list
    Add {
        #[arg(long = "list")]
        list: String,
        #[arg(long = "product")]
        product: String,
    },
    /// Remove one or more products from a list
    Remove {
        #[arg(long = "list")]
        list: String,
        /// Product id; repeat to remove several in one request
        #[arg(long = "product", required = true, num_args = 1..)]
        products: Vec<String>,
    },
}

#[derive(Parser, Debug)]
pub struct ProductArgs {
    #[command(subcommand)]
    pub action: ProductCmd,
}

#[derive(Subcommand, Debug)]
pub enum ProductCmd {
    /// Stage images and validate a product draft without submitting it
    Check {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
        /// Image file; repeat for several (staged as one batch)
        #[arg(long = "image", value_name = "PATH")]
        images: Vec<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    Electronics,
    Clothing,
    Books,
}

impl From<CategoryArg> for Category {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Electronics => Category::Electronics,
            CategoryArg::Clothing => Category::Clothing,
            CategoryArg::Books => Category::Books,
        }
    }
}
