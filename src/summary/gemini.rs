//! Gemini `generateContent` summarizer

use super::{ReviewSummary, SummaryError, Summarizer};
use crate::config::SummarizerSettings;
use crate::network::{ApiRequest, HttpClient};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

const TAGS_INSTRUCTION: &str = "あなたはラーメン評論家です。レビューからスープ、麺、トッピング、\
店の雰囲気などの特徴を拾い、2〜5語の短い日本語タグにしてください。";

const SUMMARY_INSTRUCTION: &str = "あなたはフードジャーナリストです。複数のレビューを読み、\
店の評判を良い点・惜しい点・訪問のヒントに分けて、具体的で簡潔な日本語の箇条書きにまとめてください。";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GenerateCandidate>,
}

#[derive(Debug, Deserialize)]
struct GenerateCandidate {
    content: GenerateContent,
}

#[derive(Debug, Deserialize)]
struct GenerateContent {
    #[serde(default)]
    parts: Vec<GeneratePart>,
}

#[derive(Debug, Deserialize)]
struct GeneratePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct TagsPayload {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryPayload {
    #[serde(default)]
    good_points: Vec<String>,
    #[serde(default)]
    bad_points: Vec<String>,
    #[serde(default)]
    tips: Vec<String>,
}

/// Summarizer backed by the Gemini REST API
pub struct GeminiSummarizer {
    client: HttpClient,
    endpoint: Url,
    api_key: String,
}

impl GeminiSummarizer {
    pub fn new(
        client: HttpClient,
        base_url: &str,
        model: &str,
        api_key: impl Into<String>,
    ) -> Result<Self, SummaryError> {
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        let endpoint = base.join(&format!("v1beta/models/{}:generateContent", model))?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    /// `None` when no API key is configured
    pub fn from_settings(
        client: HttpClient,
        settings: &SummarizerSettings,
    ) -> Result<Option<Self>, SummaryError> {
        match settings.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => Self::new(client, &settings.base_url, &settings.model, key).map(Some),
            None => Ok(None),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request(&self, instruction: &str, prompt: String, schema: Value) -> ApiRequest {
        ApiRequest::post(self.endpoint.as_str())
            .header("x-goog-api-key", &self.api_key)
            .json(json!({
                "contents": [{"role": "user", "parts": [{"text": prompt}]}],
                "systemInstruction": {"parts": [{"text": instruction}]},
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": schema,
                },
            }))
    }

    async fn generate<T: DeserializeOwned + Default>(&self, request: ApiRequest) -> Result<T, SummaryError> {
        let response = self.client.execute(request).await?;
        if response.is_rate_limited() {
            return Err(SummaryError::RateLimited);
        }
        if !response.is_success() {
            return Err(SummaryError::Http(response.status));
        }

        let body: GenerateResponse = response
            .json()
            .map_err(|e| SummaryError::Parse(e.to_string()))?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            debug!("Summarizer returned no content");
            return Ok(T::default());
        }
        serde_json::from_str(text.trim()).map_err(|e| SummaryError::Parse(e.to_string()))
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn feature_tags(&self, place_id: &str, review_text: &str) -> Result<Vec<String>, SummaryError> {
        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "tags": {"type": "ARRAY", "items": {"type": "STRING"}}
            }
        });
        let prompt = format!("このラーメン店のレビューを読み、特徴を表すタグを5つ挙げてください。\n\n{}", review_text);
        let payload: TagsPayload = self.generate(self.request(TAGS_INSTRUCTION, prompt, schema)).await?;
        debug!("Generated {} tags for {}", payload.tags.len(), place_id);
        Ok(payload.tags)
    }

    async fn review_summary(&self, place_id: &str, review_text: &str) -> Result<ReviewSummary, SummaryError> {
        let list = json!({"type": "ARRAY", "items": {"type": "STRING"}});
        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "goodPoints": list,
                "badPoints": list,
                "tips": list,
            }
        });
        let prompt = format!("このラーメン店のレビュー群をまとめてください。\n\n{}", review_text);
        let payload: SummaryPayload = self
            .generate(self.request(SUMMARY_INSTRUCTION, prompt, schema))
            .await?;
        debug!("Generated review summary for {}", place_id);
        Ok(ReviewSummary {
            good_points: payload.good_points,
            bad_points: payload.bad_points,
            tips: payload.tips,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(text: &str) -> Value {
        json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
    }

    fn summarizer(server: &MockServer) -> GeminiSummarizer {
        GeminiSummarizer::new(HttpClient::new().unwrap(), &server.uri(), "gemini-2.5-flash", "k").unwrap()
    }

    #[test]
    fn test_endpoint() {
        let summarizer = GeminiSummarizer::new(
            HttpClient::new().unwrap(),
            "https://generativelanguage.googleapis.com/",
            "gemini-2.5-flash",
            "k",
        )
        .unwrap();
        assert_eq!(
            summarizer.endpoint().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert!(GeminiSummarizer::new(HttpClient::new().unwrap(), "not a url", "m", "k").is_err());
    }

    #[test]
    fn test_from_settings_without_key() {
        let settings = SummarizerSettings::default();
        let summarizer = GeminiSummarizer::from_settings(HttpClient::new().unwrap(), &settings).unwrap();
        assert!(summarizer.is_none());
    }

    #[tokio::test]
    async fn test_feature_tags() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply(r#"{"tags": ["豚骨", "細麺"]}"#)))
            .mount(&server)
            .await;

        let tags = summarizer(&server).feature_tags("p1", "great soup").await.unwrap();
        assert_eq!(tags, vec!["豚骨", "細麺"]);
    }

    #[tokio::test]
    async fn test_review_summary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply(
                r#"{"goodPoints": ["rich broth"], "badPoints": [], "tips": ["go early"]}"#,
            )))
            .mount(&server)
            .await;

        let summary = summarizer(&server).review_summary("p1", "text").await.unwrap();
        assert_eq!(summary.good_points, vec!["rich broth"]);
        assert_eq!(summary.tips, vec!["go early"]);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = summarizer(&server).feature_tags("p1", "text").await.unwrap_err();
        assert!(matches!(err, SummaryError::RateLimited));
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let tags = summarizer(&server).feature_tags("p1", "text").await.unwrap();
        assert!(tags.is_empty());
    }
}
