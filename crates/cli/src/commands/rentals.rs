//! Rental and recommendation commands.

use bookhub_client::{AbortController, RecommendationService, RentalService};
use bookhub_core::{RentalId, RentalStatus};
use chrono::Utc;

use super::{App, CommandError};

pub async fn history(app: &App) -> Result<(), CommandError> {
    let rentals = RentalService::new(app.api().clone()).history().await?;
    if rentals.is_empty() {
        tracing::info!("No rentals yet");
        return Ok(());
    }

    let now = Utc::now();
    for rental in &rentals {
        let title = rental.title.as_deref().unwrap_or_else(|| rental.book_id.as_str());
        let detail = match rental.status_at(now) {
            RentalStatus::Active => format!("due in {} day(s)", rental.days_remaining(now)),
            RentalStatus::Overdue => format!("{} day(s) overdue", rental.days_overdue(now)),
            RentalStatus::Returned => "returned".to_string(),
        };
        tracing::info!("{:<12} {:<32} {}", rental.id, title, detail);
    }
    Ok(())
}

pub async fn return_rental(app: &App, rental_id: String) -> Result<(), CommandError> {
    let id = RentalId::new(rental_id);
    let rental = RentalService::new(app.api().clone()).return_rental(&id).await?;

    match rental.and_then(|r| r.title) {
        Some(title) => tracing::info!("Returned {title}"),
        None => tracing::info!("Returned rental {id}"),
    }
    Ok(())
}

/// Fetch recommendations; Ctrl+C aborts the request.
pub async fn recommendations(app: &App, refresh: bool) -> Result<(), CommandError> {
    let service = RecommendationService::new(app.api().clone());
    if refresh {
        service.invalidate();
    }

    let controller = AbortController::new();
    let signal = controller.signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            controller.abort();
        }
    });

    let items = service.fetch(&signal).await?;
    if items.is_empty() {
        tracing::info!("No recommendations right now");
    }
    for item in items {
        let author = item.author.as_deref().unwrap_or("unknown author");
        match item.price {
            Some(price) => tracing::info!("{} by {author} ({})", item.title, price.display()),
            None => tracing::info!("{} by {author}", item.title),
        }
    }
    Ok(())
}
