//! Sign-in and account commands.

use bookhub_client::{ProfileUpdate, RegisterInput, Session};
use secrecy::SecretString;

use super::{App, CommandError};

/// Sign in as a member, or as an admin when `admin` is set.
pub async fn login(app: &App, email: &str, password: String, admin: bool) -> Result<(), CommandError> {
    let password = SecretString::from(password);
    let user = if admin {
        app.auth.admin_login(email, &password).await?
    } else {
        app.auth.login(email, &password).await?
    };

    tracing::info!("Signed in as {} <{}> ({})", user.display_name(), user.email, user.role);
    Ok(())
}

pub async fn register(
    app: &App,
    full_name: String,
    email: String,
    password: String,
    phone: Option<String>,
) -> Result<(), CommandError> {
    let input = RegisterInput {
        full_name,
        email,
        password: SecretString::from(password),
        phone,
    };
    let user = app.auth.register(&input).await?;

    tracing::info!("Welcome to BookHub, {}!", user.display_name());
    Ok(())
}

pub fn logout(app: &App) {
    if app.auth.session().is_authenticated() {
        app.auth.logout();
        tracing::info!("Signed out");
    } else {
        tracing::info!("Not signed in");
    }
}

pub fn whoami(app: &App) {
    match app.auth.session() {
        Session::Guest => tracing::info!("Not signed in"),
        Session::User(credentials) => {
            let user = &credentials.user;
            tracing::info!("{} <{}> (member)", user.display_name(), user.email);
        }
        Session::Admin(credentials) => {
            let user = &credentials.user;
            tracing::info!("{} <{}> (admin)", user.display_name(), user.email);
        }
    }
}

/// Show the account, or update it when any field is given.
pub async fn profile(
    app: &App,
    full_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
) -> Result<(), CommandError> {
    let update = ProfileUpdate {
        full_name,
        email,
        phone,
    };

    let user = if update.full_name.is_none() && update.email.is_none() && update.phone.is_none() {
        app.auth.refresh_user_data().await?
    } else {
        let user = app.auth.update_user_profile(&update).await?;
        tracing::info!("Profile updated");
        user
    };

    tracing::info!("Name:  {}", user.display_name());
    tracing::info!("Email: {}", user.email);
    if let Some(phone) = &user.phone {
        tracing::info!("Phone: {phone}");
    }
    tracing::info!("Role:  {}", user.role);
    Ok(())
}
