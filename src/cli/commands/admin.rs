use anyhow::bail;

use crate::config::config;
use crate::database::repository::insert_record;
use crate::database::{DatabaseError, DatabaseManager};
use crate::models::user::UserRole;
use crate::models::User;

pub async fn handle(name: String, email: String, password: String) -> anyhow::Result<()> {
    if password.len() < 8 {
        bail!("Password must be at least 8 characters");
    }
    let user = User::bootstrap(name, email, &password, UserRole::Admin)?;

    let pool = DatabaseManager::connect(&config().database).await?;
    let mut conn = pool.acquire().await.map_err(DatabaseError::from)?;
    match insert_record(&mut conn, &user).await {
        Ok(saved) => {
            println!("Created admin {} ({})", saved.email, saved.id);
            Ok(())
        }
        Err(DatabaseError::UniqueViolation(_)) => bail!("User with this email already exists"),
        Err(e) => Err(e.into()),
    }
}
