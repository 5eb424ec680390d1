//! RapidAPI client for dad jokes and cat pictures

use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const DAD_JOKES_HOST: &str = "dad-jokes.p.rapidapi.com";
const CAT_PICTURE_HOST: &str = "random-cat-picture.p.rapidapi.com";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("RapidAPI key is not configured")]
    MissingApiKey,
    #[error("Unexpected status: {0}")]
    Status(reqwest::StatusCode),
    #[error("Response did not contain {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Joke {
    pub setup: String,
    pub punchline: String,
}

impl Joke {
    pub fn render(&self) -> String {
        format!("Here's a joke for you:\n**{}**\n{}", self.setup, self.punchline)
    }
}

#[derive(Debug, Deserialize)]
struct JokeResponse {
    body: Vec<Joke>,
}

#[derive(Debug, Deserialize)]
struct CatResponse {
    file: Option<String>,
}

/// Thin client over the two RapidAPI endpoints the bot uses
pub struct RapidApi {
    client: Client,
    api_key: Option<String>,
}

impl RapidApi {
    pub fn new(api_key: Option<String>) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self { client, api_key })
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, host: &str, path: &str) -> Result<T, ApiError> {
        let api_key = self.api_key.as_deref().ok_or(ApiError::MissingApiKey)?;

        let response = self
            .client
            .get(format!("https://{}{}", host, path))
            .header("x-rapidapi-key", api_key)
            .header("x-rapidapi-host", host)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("RapidAPI {} answered {}", host, response.status());
            return Err(ApiError::Status(response.status()));
        }

        Ok(response.json().await?)
    }

    pub async fn random_joke(&self) -> Result<Joke, ApiError> {
        let response: JokeResponse = self.get(DAD_JOKES_HOST, "/random/joke").await?;
        response
            .body
            .into_iter()
            .next()
            .ok_or(ApiError::MissingField("body"))
    }

    /// URL of a random cat picture
    pub async fn random_cat(&self) -> Result<String, ApiError> {
        let response: CatResponse = self.get(CAT_PICTURE_HOST, "/meow").await?;
        response.file.ok_or(ApiError::MissingField("file"))
    }
}

/// Random 24-bit embed colour
pub fn random_colour() -> u32 {
    rand::rng().random_range(0..=0xFF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joke_parsing() {
        let body = r#"{"success": true, "body": [{"_id": "1", "setup": "Why?", "punchline": "Because.", "type": "general"}]}"#;
        let parsed: JokeResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.body[0].render(),
            "Here's a joke for you:\n**Why?**\nBecause."
        );
    }

    #[test]
    fn test_random_colour_in_range() {
        for _ in 0..100 {
            assert!(random_colour() <= 0xFF_FFFF);
        }
    }

    #[tokio::test]
    async fn test_missing_key() {
        let api = RapidApi::new(None).unwrap();
        assert!(matches!(api.random_joke().await, Err(ApiError::MissingApiKey)));
    }
}
