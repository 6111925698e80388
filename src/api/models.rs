use std::sync::Arc;

use crate::api::ModelInfo;
use crate::auth::AuthProvider;
use crate::core::error::ChatError;
use crate::utils::url::{construct_api_url, MODELS_ENDPOINT};

pub async fn fetch_models(
    client: &reqwest::Client,
    base_url: &str,
    auth: &Arc<dyn AuthProvider>,
) -> Result<Vec<ModelInfo>, ChatError> {
    let models_url = construct_api_url(base_url, MODELS_ENDPOINT);
    let response = client
        .get(models_url)
        .headers(auth.auth_headers())
        .send()
        .await
        .map_err(ChatError::from_request)?;

    if !response.status().is_success() {
        return Err(ChatError::from_status(response.status()));
    }

    let mut models = response
        .json::<Vec<ModelInfo>>()
        .await
        .map_err(|err| ChatError::InvalidResponse(err.to_string()))?;
    sort_models(&mut models);
    Ok(models)
}

/// Group models by provider, then by display name, so listings are stable.
pub fn sort_models(models: &mut [ModelInfo]) {
    models.sort_by(|a, b| {
        a.provider
            .cmp(&b.provider)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}
