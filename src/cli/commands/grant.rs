use crate::config::Config;
use crate::services::UserError;
use crate::state::SharedState;

pub async fn cmd_grant(config: Config, email: &str, codes: &[String]) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;

    match state.user_service.grant_permissions(email, codes).await {
        Ok(user) => {
            println!("✓ Granted {} to {} (ID: {})", codes.join(", "), user.email, user.id);
        }
        Err(UserError::NotFound) => println!("No user with email {email}."),
        Err(UserError::Validation(errors)) => {
            for (field, message) in errors {
                println!("{field}: {message}");
            }
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
