#![deny(clippy::all, clippy::pedantic)]

use storefront::application::wishlist::WishlistService;
use storefront_api_types::ProductSelection;

use crate::args::WishlistCmd;
use crate::client::{CliError, Ctx};
use crate::print::print_json;

pub async fn handle(ctx: &Ctx, cmd: WishlistCmd) -> Result<(), CliError> {
    let service = ctx.wishlist()?;
    match cmd {
        WishlistCmd::Lists => lists(&service).await,
        WishlistCmd::Get => get(&service).await,
        WishlistCmd::Create { title } => create(&service, &title).await,
        WishlistCmd::Add { list, product } => add(&service, &list, &product).await,
        WishlistCmd::Remove { list, products } => remove(&service, &list, products).await,
    }
}

async fn lists(service: &WishlistService) -> Result<(), CliError> {
    let res = service.fetch_all_lists().await?;
    print_json(&res)
}

async fn get(service: &WishlistService) -> Result<(), CliError> {
    let res = service.fetch_wishlist().await?;
    print_json(&res)
}

async fn create(service: &WishlistService, title: &str) -> Result<(), CliError> {
    let res = service.create_list(title).await?;
    print_json(&res)
}

async fn add(service: &WishlistService, list: &str, product: &str) -> Result<(), CliError> {
    let res = service.add_item(list, product).await?;
    print_json(&res)
}

async fn remove(
    service: &WishlistService,
    list: &str,
    mut products: Vec<String>,
) -> Result<(), CliError> {
    let selection = if products.len() == 1 {
        ProductSelection::One(products.remove(0))
    } else {
        ProductSelection::Many(products)
    };
    let res = service.remove_item(list, selection).await?;
    print_json(&res)
}
