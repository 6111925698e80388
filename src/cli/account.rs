use std::error::Error;

use crate::auth::ui::prompt_credentials;
use crate::cli::backend::Backend;

pub async fn login(backend: &Backend, email: Option<String>) -> Result<(), Box<dyn Error>> {
    let credentials = prompt_credentials(email)?;
    let user = backend
        .auth
        .login(&credentials.email, &credentials.password)
        .await?;
    println!();
    println!("✅ Logged in to {} as {} <{}>", backend.base_url, user.name, user.email);
    Ok(())
}

pub async fn logout(backend: &Backend) -> Result<(), Box<dyn Error>> {
    if backend.auth.token().is_none() {
        println!("Not logged in to {}.", backend.base_url);
        return Ok(());
    }
    backend.auth.logout_remote().await?;
    println!("✅ Logged out of {}", backend.base_url);
    Ok(())
}

pub async fn whoami(backend: &Backend) -> Result<(), Box<dyn Error>> {
    match backend.auth.current_user().await? {
        Some(user) => {
            println!("👤 {} <{}>", user.name, user.email);
            println!("   id: {}", user.id);
            println!("   backend: {}", backend.base_url);
        }
        None => println!(
            "Not logged in to {}. Run 'chatline login' to sign in.",
            backend.base_url
        ),
    }
    Ok(())
}
