//! Catalog import command handlers.

use std::path::Path;

use orders_core::ImportDocument;

fn print_document_summary(document: &ImportDocument) {
    println!(
        "shop {:?}: {} categories, {} listings, {} parameters",
        document.shop,
        document.categories.len(),
        document.listing_count(),
        document.parameter_count()
    );
    for good in &document.goods {
        println!(
            "  [{:>6}] {:<40} {:>12} x{}",
            good.id, good.name, good.price, good.quantity
        );
    }
}

/// Parse and validate a catalog file without touching the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub(crate) fn run_import_dry_run(path: &Path) -> anyhow::Result<()> {
    let document = orders_core::load_import_document(path)?;
    tracing::debug!(file = %path.display(), shop = %document.shop, "catalog validated");
    println!("dry-run: {} is valid", path.display());
    print_document_summary(&document);
    Ok(())
}

/// Import a catalog file as the shop account with `email`.
///
/// # Errors
///
/// Returns an error if the account does not exist or is not a shop, the file
/// is invalid, or the import transaction fails (in which case nothing is
/// written).
pub(crate) async fn run_import(pool: &sqlx::PgPool, path: &Path, email: &str) -> anyhow::Result<()> {
    let document = orders_core::load_import_document(path)?;

    let user = orders_db::get_user_by_email(pool, email)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no account with email {email}"))?;
    let caller = user.caller()?;

    let summary = match orders_db::import_catalog(pool, &caller, &document).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(
                file = %path.display(),
                shop = %document.shop,
                error = %e,
                "import rolled back"
            );
            return Err(e.into());
        }
    };
    println!(
        "imported shop {:?} (id {}): {} categories, {} listings replaced by {}, {} parameters",
        summary.shop_name,
        summary.shop_id,
        summary.categories,
        summary.replaced_listings,
        summary.listings,
        summary.parameters
    );
    Ok(())
}
