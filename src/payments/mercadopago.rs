//! Mercado Pago REST client: payment lookup and checkout preferences.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, Result};

const API_BASE: &str = "https://api.mercadopago.com";

/// Authoritative payment details as reported by the provider API.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderPayment {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub transaction_amount: Option<f64>,
}

/// The provider returns payment ids as numbers in some payloads and strings
/// in others.
fn id_string<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Num(i64),
        Str(String),
    }
    Ok(match IdRepr::deserialize(de)? {
        IdRepr::Num(n) => n.to_string(),
        IdRepr::Str(s) => s,
    })
}

#[derive(Debug, Serialize)]
pub struct PreferenceItem {
    pub title: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Serialize)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    /// Id of the local business object; echoed back by the provider
    pub external_reference: String,
    /// Webhook URL, carrying the correlation query parameters
    pub notification_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatedPreference {
    pub id: String,
    /// Checkout URL the payer is redirected to
    pub init_point: String,
}

/// The only interface to the payment network. The engine is generic over this
/// so tests can reconcile against a scripted provider.
pub trait ProviderApi: Send + Sync {
    fn get_payment(&self, id: &str) -> impl Future<Output = Result<ProviderPayment>> + Send;
    fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> impl Future<Output = Result<CreatedPreference>> + Send;
}

#[derive(Clone)]
pub struct MercadoPagoClient {
    client: Client,
    access_token: String,
}

impl MercadoPagoClient {
    /// Every call carries `timeout`; a timed-out lookup is treated as a fetch
    /// failure by the caller.
    pub fn new(access_token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("http client build failed: {}", e)))?;
        Ok(Self {
            client,
            access_token: access_token.to_string(),
        })
    }
}

impl ProviderApi for MercadoPagoClient {
    async fn get_payment(&self, id: &str) -> Result<ProviderPayment> {
        let response = self
            .client
            .get(format!("{}/v1/payments/{}", API_BASE, id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("payment lookup failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Provider(format!(
                "payment lookup returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("invalid payment response: {}", e)))
    }

    async fn create_preference(&self, request: &PreferenceRequest) -> Result<CreatedPreference> {
        let response = self
            .client
            .post(format!("{}/checkout/preferences", API_BASE))
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("preference creation failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Provider(format!(
                "preference creation returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("invalid preference response: {}", e)))
    }
}
