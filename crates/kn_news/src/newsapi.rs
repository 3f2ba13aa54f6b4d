use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kn_core::{Config, Error, NewsItem, NewsQuery, NewsSource, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeadlinesResponse {
    status: String,
    message: Option<String>,
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    source: Option<RawSource>,
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
}

#[derive(Deserialize)]
struct RawSource {
    name: Option<String>,
}

/// Top headlines from newsapi.org
pub struct NewsApiSource {
    client: Client,
    api_key: SecretString,
    base_url: String,
    country: String,
}

impl fmt::Debug for NewsApiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsApiSource")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("country", &self.country)
            .finish()
    }
}

impl NewsApiSource {
    pub fn new(api_key: SecretString, country: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://newsapi.org".to_string(),
            country: country.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.news_api_key.clone(), config.news.country.clone())
            .with_base_url(config.news.base_url.clone())
    }
}

#[async_trait]
impl NewsSource for NewsApiSource {
    fn name(&self) -> &str {
        "NewsAPI"
    }

    async fn fetch_top_headlines(&self, query: &NewsQuery) -> Result<Vec<NewsItem>> {
        info!("📰 Fetching {} {} headlines for {}", query.count, query.category, self.country);

        let page_size = query.count.to_string();
        let response = self
            .client
            .get(format!("{}/v2/top-headlines", self.base_url))
            .header("X-Api-Key", self.api_key.expose_secret())
            .query(&[
                ("country", self.country.as_str()),
                ("category", query.category.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body: Option<HeadlinesResponse> = serde_json::from_str(&text).ok();

        let body = match body {
            Some(body) if status.is_success() && body.status == "ok" => body,
            Some(body) => {
                let message = body.message.unwrap_or(body.status);
                return Err(Error::UpstreamData(format!("NewsAPI returned {}: {}", status, message)));
            }
            None if status.is_success() => {
                return Err(Error::UpstreamData("NewsAPI returned a malformed response".to_string()));
            }
            None => return Err(Error::UpstreamData(format!("NewsAPI returned {}: {}", status, text))),
        };

        let items: Vec<NewsItem> = body
            .articles
            .into_iter()
            .map(|raw| NewsItem {
                title: raw.title.unwrap_or_default(),
                description: raw.description.unwrap_or_default(),
                content: raw.content.unwrap_or_default(),
                url: raw.url.unwrap_or_default(),
                published_at: raw
                    .published_at
                    .and_then(|at| DateTime::parse_from_rfc3339(&at).ok())
                    .map(|at| at.with_timezone(&Utc)),
                source: raw.source.and_then(|s| s.name).unwrap_or_default(),
                category: query.category,
            })
            .take(query.count)
            .collect();

        debug!("Received {} headlines", items.len());
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kn_core::Category;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(mock: &MockServer) -> NewsApiSource {
        NewsApiSource::new(SecretString::new("news-key".to_string()), "jp").with_base_url(mock.uri())
    }

    fn query(count: usize) -> NewsQuery {
        NewsQuery { count, category: Category::Science }
    }

    #[tokio::test]
    async fn test_maps_articles() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/top-headlines"))
            .and(header("X-Api-Key", "news-key"))
            .and(query_param("country", "jp"))
            .and(query_param("category", "science"))
            .and(query_param("pageSize", "4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "totalResults": 2,
                "articles": [
                    {
                        "source": {"id": null, "name": "NHK"},
                        "title": "新しい星",
                        "description": "星が見つかった",
                        "content": null,
                        "url": "https://example.com/star",
                        "publishedAt": "2024-04-01T09:00:00Z"
                    },
                    {"title": "動物園", "publishedAt": "yesterday"}
                ]
            })))
            .expect(1)
            .mount(&mock)
            .await;

        let items = source(&mock).fetch_top_headlines(&query(4)).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "新しい星");
        assert_eq!(items[0].source, "NHK");
        assert_eq!(items[0].content, "");
        assert_eq!(items[0].category, Category::Science);
        assert!(items[0].published_at.is_some());
        assert_eq!(items[1].source, "");
        assert!(items[1].published_at.is_none());
    }

    #[tokio::test]
    async fn test_error_status_in_body() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/top-headlines"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "status": "error",
                "code": "apiKeyInvalid",
                "message": "Your API key is invalid"
            })))
            .mount(&mock)
            .await;

        let err = source(&mock).fetch_top_headlines(&query(4)).await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("Your API key is invalid"));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/top-headlines"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock)
            .await;

        assert!(source(&mock).fetch_top_headlines(&query(4)).await.unwrap_err().is_upstream());
    }
}
