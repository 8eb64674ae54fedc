use orders_core::UserRole;

/// Create an account from the command line.
///
/// # Errors
///
/// Returns an error if validation fails or the email is already taken.
pub(crate) async fn run_create_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
    shop: bool,
) -> anyhow::Result<()> {
    let role = if shop { UserRole::Shop } else { UserRole::Buyer };

    let row = orders_db::create_user(
        pool,
        &orders_db::NewUser {
            email,
            first_name,
            last_name,
            password,
            role,
        },
    )
    .await?;

    tracing::debug!(user_id = row.id, role = %row.role, "account created from cli");
    println!("created {} account {} (id {})", row.role, row.email, row.id);
    Ok(())
}
