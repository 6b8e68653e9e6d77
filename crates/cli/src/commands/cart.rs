//! Cart and checkout commands.

use bookhub_client::{Cart, CheckoutService};
use bookhub_core::{BookId, CartItem, Price};
use rust_decimal::Decimal;

use super::{App, CommandError};

pub fn add(app: &App, book_id: String, title: String, price: Decimal, quantity: u32) -> Result<(), CommandError> {
    let item = CartItem::new(BookId::new(book_id), title, Price::new(price), quantity)
        .map_err(bookhub_client::CartError::from)?;

    let mut cart = Cart::load(&*app.store);
    cart.add(item);
    cart.save(&*app.store)?;

    tracing::info!("Cart now holds {} book(s)", cart.item_count());
    Ok(())
}

pub fn remove(app: &App, book_id: &str) -> Result<(), CommandError> {
    let mut cart = Cart::load(&*app.store);
    match cart.remove(&BookId::new(book_id)) {
        Some(item) => {
            cart.save(&*app.store)?;
            tracing::info!("Removed {}", item.title);
        }
        None => tracing::info!("{book_id} is not in the cart"),
    }
    Ok(())
}

pub fn set(app: &App, book_id: &str, quantity: u32) -> Result<(), CommandError> {
    let mut cart = Cart::load(&*app.store);
    cart.set_quantity(&BookId::new(book_id), quantity)?;
    cart.save(&*app.store)?;

    tracing::info!("Cart now holds {} book(s)", cart.item_count());
    Ok(())
}

pub fn show(app: &App) {
    let cart = Cart::load(&*app.store);
    if cart.is_empty() {
        tracing::info!("Your cart is empty");
        return;
    }

    for item in cart.items() {
        tracing::info!(
            "{:<24} {:>3} x {:>8} = {:>9}   ({})",
            item.title,
            item.quantity(),
            item.price.display(),
            item.line_total().display(),
            item.book_id
        );
    }
    tracing::info!("Purchase total: {}", cart.purchase_total().display());
    tracing::info!("Rental fee:     {}", cart.rental_fee().display());
}

pub fn clear(app: &App) -> Result<(), CommandError> {
    let mut cart = Cart::load(&*app.store);
    cart.clear();
    cart.save(&*app.store)?;
    tracing::info!("Cart cleared");
    Ok(())
}

pub async fn checkout(app: &App) -> Result<(), CommandError> {
    let mut cart = Cart::load(&*app.store);
    let receipt = CheckoutService::new(app.api().clone())
        .checkout(&mut cart)
        .await?;

    for message in receipt.messages() {
        tracing::info!("{message}");
    }
    tracing::info!(
        "Rental fee: {} (purchase value {})",
        receipt.rental_fee.display(),
        receipt.purchase_total.display()
    );
    Ok(())
}
