//! Model listing functionality

use std::error::Error;

use crate::api::models::fetch_models;
use crate::auth::AuthProvider;
use crate::cli::backend::Backend;
use crate::core::error::ChatError;

pub async fn list_models(backend: &Backend) -> Result<(), Box<dyn Error>> {
    let models = match fetch_models(&backend.client, &backend.base_url, &backend.auth_provider())
        .await
    {
        Ok(models) => models,
        Err(ChatError::AuthExpired) => {
            backend.auth.logout();
            return Err(ChatError::AuthExpired.into());
        }
        Err(err) => return Err(err.into()),
    };

    println!("🤖 Available Models on {}", backend.base_url);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!(
        "🎯 Default model: {} (from config)",
        backend.config.model()
    );
    println!();

    if models.is_empty() {
        println!("No models found on this backend.");
        return Ok(());
    }

    println!("Found {} models:", models.len());
    println!();
    for model in models {
        println!("  • {}", model.id);
        if !model.name.is_empty() && model.name != model.id {
            println!("    Name: {}", model.name);
        }
        if !model.provider.is_empty() {
            println!("    Provider: {}", model.provider);
        }
        println!("    Max tokens: {}", model.max_tokens);
        if !model.supports_streaming {
            println!("    ⚠️  Does not support streaming");
        }
        println!();
    }

    Ok(())
}
