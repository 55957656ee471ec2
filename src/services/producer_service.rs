use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

pub const GEMINI_SOURCE_LABEL: &str = "Gemini Real Jobs";

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Int(i64),
    Float(f64),
    Other(JsonValue),
}

fn deserialize_text_flexible<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<TextOrNumber>::deserialize(deserializer)? {
        Some(TextOrNumber::Text(s)) => Some(s),
        Some(TextOrNumber::Int(i)) => Some(i.to_string()),
        Some(TextOrNumber::Float(f)) => Some(f.to_string()),
        Some(TextOrNumber::Other(_)) | None => None,
    })
}

fn deserialize_amount_flexible<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<TextOrNumber>::deserialize(deserializer)? {
        Some(TextOrNumber::Int(i)) => Some(Decimal::from(i)),
        Some(TextOrNumber::Float(f)) => Decimal::from_f64(f),
        Some(TextOrNumber::Text(s)) => parse_amount(&s),
        Some(TextOrNumber::Other(_)) | None => None,
    })
}

/// "80,000", "$95 000", "120k" -> decimal amount.
fn parse_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    let (body, multiplier) = match trimmed.strip_suffix(['k', 'K']) {
        Some(rest) => (rest, Decimal::from(1000)),
        None => (trimmed, Decimal::ONE),
    };
    let digits: String = body
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if digits.is_empty() {
        return None;
    }
    Decimal::from_str(&digits).ok().map(|d| d * multiplier)
}

fn deserialize_skills_flexible<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrText {
        List(Vec<JsonValue>),
        Text(String),
        Other(JsonValue),
    }

    let skills: Vec<String> = match Option::<ListOrText>::deserialize(deserializer)? {
        Some(ListOrText::List(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .collect(),
        Some(ListOrText::Text(s)) => s.split(',').map(|p| p.trim().to_string()).collect(),
        Some(ListOrText::Other(_)) | None => Vec::new(),
    };
    Ok(skills.into_iter().filter(|s| !s.is_empty()).collect())
}

fn deserialize_salary_flexible<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<RawSalary>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SalaryOrOther {
        Salary(RawSalary),
        Other(JsonValue),
    }

    Ok(match Option::<SalaryOrOther>::deserialize(deserializer)? {
        Some(SalaryOrOther::Salary(s)) => Some(s),
        Some(SalaryOrOther::Other(_)) | None => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSalary {
    #[serde(default, deserialize_with = "deserialize_amount_flexible")]
    pub from: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_amount_flexible")]
    pub to: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_text_flexible")]
    pub currency: Option<String>,
}

/// One job as the generator emits it. Nothing is guaranteed to be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawJobItem {
    #[serde(default, deserialize_with = "deserialize_text_flexible")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text_flexible")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text_flexible")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text_flexible")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text_flexible")]
    pub job_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_salary_flexible")]
    pub salary: Option<RawSalary>,
    #[serde(default, deserialize_with = "deserialize_text_flexible")]
    pub experience: Option<String>,
    #[serde(default, deserialize_with = "deserialize_skills_flexible")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_text_flexible")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text_flexible")]
    pub posted_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text_flexible")]
    pub deadline: Option<String>,
}

/// External generator of job batches.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobProducer: Send + Sync {
    /// Label stamped on every record that came from this producer.
    fn source_label(&self) -> String;

    async fn generate(&self, count: usize) -> Result<Vec<RawJobItem>>;
}

/// Pulls the first JSON array out of free-form model output and parses its
/// elements one by one, dropping the ones that are not objects.
pub fn parse_job_array(text: &str) -> Result<Vec<RawJobItem>> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        return Err(Error::Producer(
            "Failed to extract JSON array from generator response".to_string(),
        ));
    };
    if end < start {
        return Err(Error::Producer(
            "Failed to extract JSON array from generator response".to_string(),
        ));
    }

    let values: Vec<JsonValue> = serde_json::from_str(&text[start..=end])?;
    let mut items = Vec::with_capacity(values.len());
    for (idx, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<RawJobItem>(value) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(index = idx, error = %e, "Dropping malformed generator item"),
        }
    }
    Ok(items)
}

#[derive(Clone)]
pub struct GeminiProducer {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiProducer {
    pub fn new(
        client: Client,
        api_key: Option<String>,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn prompt(count: usize) -> String {
        format!(
            r#"Find {count} real, currently open job postings (preferably tech roles) from public job boards or company career pages.
Respond with a JSON array only, one object per posting, using exactly these fields:
[
  {{
    "title": "Job title",
    "company": "Company name",
    "description": "Two or three sentences about the role",
    "url": "https://link-to-the-posting",
    "salary": {{ "from": 50000, "to": 80000, "currency": "USD" }},
    "experience": "2-5 years",
    "jobType": "Full-time | Part-time | Internship | Freelance | Contract",
    "location": "City, Country or Remote",
    "skills": ["Skill1", "Skill2", "Skill3"],
    "postedDate": "YYYY-MM-DD",
    "deadline": "YYYY-MM-DD"
  }}
]
Use real companies and real posting URLs, mix seniority levels, job types and countries,
and set deadlines 7 to 30 days after the posted date. No text outside the array."#
        )
    }

    async fn generate_content(&self, api_key: &str, prompt: String) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let payload = serde_json::json!({
            "contents": [
                { "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": {
                "temperature": 0.7,
                "responseMimeType": "application/json"
            }
        });

        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::Producer(format!("Gemini API Error {}: {}", status, text)));
        }

        let body: JsonValue = res.json().await?;
        let text: String = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::Producer("Gemini returned no text content".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl JobProducer for GeminiProducer {
    fn source_label(&self) -> String {
        GEMINI_SOURCE_LABEL.to_string()
    }

    async fn generate(&self, count: usize) -> Result<Vec<RawJobItem>> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(Error::Config(
                "GEMINI_API_KEY is not set; job generation is disabled".to_string(),
            ));
        };

        tracing::info!(count, model = %self.model, "Requesting jobs from Gemini");
        let text = self.generate_content(api_key, Self::prompt(count)).await?;
        let items = parse_job_array(&text)?;
        tracing::info!(requested = count, received = items.len(), "Gemini returned jobs");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_wrapped_in_prose_and_fences() {
        let text = r#"Here you go:
```json
[
  {"title": "Data Engineer", "company": "Acme", "salary": {"from": "80,000", "to": 120000, "currency": "USD"},
   "skills": "Rust, SQL , ", "postedDate": "2026-02-18", "deadline": "2026-03-18"},
  "not an object",
  {"title": 42, "jobType": "Contract", "url": null}
]
```"#;
        let items = parse_job_array(text).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.title.as_deref(), Some("Data Engineer"));
        let salary = first.salary.clone().unwrap();
        assert_eq!(salary.from, Some(Decimal::from(80_000)));
        assert_eq!(salary.to, Some(Decimal::from(120_000)));
        assert_eq!(first.skills, vec!["Rust".to_string(), "SQL".to_string()]);

        let second = &items[1];
        assert_eq!(second.title.as_deref(), Some("42"));
        assert_eq!(second.job_type.as_deref(), Some("Contract"));
        assert_eq!(second.url, None);
    }

    #[test]
    fn missing_array_is_a_producer_error() {
        let err = parse_job_array("sorry, I cannot browse the internet").unwrap_err();
        assert!(matches!(err, Error::Producer(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn amounts_accept_suffixes_and_symbols() {
        assert_eq!(parse_amount("120k"), Some(Decimal::from(120_000)));
        assert_eq!(parse_amount("$95 000"), Some(Decimal::from(95_000)));
        assert_eq!(parse_amount("n/a"), None);
    }

    #[tokio::test]
    async fn unconfigured_producer_reports_configuration_error() {
        let producer = GeminiProducer::new(
            Client::new(),
            None,
            "gemini-2.5-flash".into(),
            "http://127.0.0.1:9".into(),
            Duration::from_secs(1),
        );
        assert!(!producer.is_configured());
        let err = producer.generate(10).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
