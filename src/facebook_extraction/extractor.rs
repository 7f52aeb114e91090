// src/facebook_extraction/extractor.rs
use anyhow::Result;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::heuristics;
use crate::core::config_manager::LlmSettings;
use crate::core::{LlmClient, LlmImage, LlmRequest, ServiceClient};
use crate::types::{ExtractedFields, ExtractionMethod, ExtractionResult, GenderPreference};
use crate::utils::{is_half_step, normalize_list};

/// Values a model uses to say "not in the post"
const SENTINELS: &[&str] = &[
    "n/a",
    "na",
    "none",
    "null",
    "unknown",
    "not specified",
    "not mentioned",
    "-",
];

const SYSTEM_PROMPT: &str = r#"You extract sublease listing details from Facebook posts written by Penn State students. The post text and any screenshots are provided.

Respond with a single JSON object with exactly these keys:
- "title": short headline for the listing
- "price": monthly rent in US dollars as a number
- "start_date": sublease start as YYYY-MM-DD
- "end_date": sublease end as YYYY-MM-DD
- "bedrooms": number of bedrooms in the unit (0 for a studio)
- "bathrooms": number of bathrooms, halves allowed
- "property_name": apartment complex or building name
- "address": street address
- "amenities": array of strings
- "special_requirements": array of strings (gender restrictions, pets, smoking, fees)
- "gender_preference": "female", "male" or "any"
- "furnished": true or false
- "utilities_included": true or false
- "contact": email or phone number
- "description": one or two sentence summary
- "ocr_text": all text you can read in the screenshots

Use null for anything the post does not state. Do not guess. Resolve dates relative to the given reference date; State College semesters are spring (Jan 1 - May 15), summer (May 16 - Aug 15) and fall (Aug 16 - Dec 31)."#;

fn is_sentinel(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value.is_empty() || SENTINELS.contains(&value.as_str())
}

/// The first JSON object in a model reply, tolerating code fences and prose
fn json_object(raw: &str) -> Option<Map<String, Value>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Typed views over the model's JSON answer; sentinels and junk read as `None`
struct LlmAnswer<'a> {
    fields: &'a Map<String, Value>,
    reference: NaiveDate,
}

impl<'a> LlmAnswer<'a> {
    fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) if !is_sentinel(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn price(&self) -> Option<i64> {
        let price = match self.fields.get("price")? {
            Value::Number(n) => n.as_f64().map(|p| p.round() as i64),
            Value::String(_) => {
                let raw = self.text("price")?;
                heuristics::extract_price(&format!("${}", raw.trim_start_matches('$')))
            }
            _ => None,
        };
        price.filter(|p| heuristics::is_plausible_rent(*p))
    }

    fn date(&self, key: &str, after: Option<NaiveDate>) -> Option<NaiveDate> {
        let raw = self.text(key)?;
        let date = heuristics::parse_date_text(&raw, self.reference, after)?;
        match after {
            Some(start) if date <= start => None,
            _ => Some(date),
        }
    }

    fn bedrooms(&self) -> Option<i64> {
        let bedrooms = match self.fields.get("bedrooms")? {
            Value::Number(n) => n.as_f64().filter(|b| b.fract() == 0.0).map(|b| b as i64),
            Value::String(_) => {
                let raw = self.text("bedrooms")?;
                raw.parse::<i64>()
                    .ok()
                    .or_else(|| heuristics::extract_bedrooms(&raw))
            }
            _ => None,
        };
        bedrooms.filter(|b| (0..=12).contains(b))
    }

    fn bathrooms(&self) -> Option<f64> {
        let bathrooms = match self.fields.get("bathrooms")? {
            Value::Number(n) => n.as_f64(),
            Value::String(_) => {
                let raw = self.text("bathrooms")?;
                raw.parse::<f64>()
                    .ok()
                    .or_else(|| heuristics::extract_bathrooms(&raw))
            }
            _ => None,
        };
        bathrooms.filter(|b| *b > 0.0 && *b <= 12.0 && is_half_step(*b))
    }

    fn list(&self, key: &str) -> Vec<String> {
        let items: Vec<String> = match self.fields.get(key) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|s| !is_sentinel(s))
                .map(String::from)
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .filter(|part| !is_sentinel(part))
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        };
        normalize_list(items)
    }

    fn flag(&self, key: &str) -> Option<bool> {
        match self.fields.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "y" => Some(true),
                "false" | "no" | "n" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn gender(&self) -> Option<GenderPreference> {
        self.text("gender_preference")?.parse().ok()
    }
}

/// Prefers the model's value and records the field when the matcher fills in
struct FieldMerger {
    fallback_fields: Vec<String>,
}

impl FieldMerger {
    fn pick<T>(&mut self, name: &str, llm: Option<T>, heuristic: impl FnOnce() -> Option<T>) -> Option<T> {
        if llm.is_some() {
            return llm;
        }
        let value = heuristic();
        if value.is_some() {
            self.fallback_fields.push(name.to_string());
        }
        value
    }

    fn pick_list(
        &mut self,
        name: &str,
        llm: Vec<String>,
        heuristic: impl FnOnce() -> Vec<String>,
    ) -> Vec<String> {
        if !llm.is_empty() {
            return llm;
        }
        let value = heuristic();
        if !value.is_empty() {
            self.fallback_fields.push(name.to_string());
        }
        value
    }
}

/// Turns a Facebook post (text plus screenshots) into listing fields
pub struct FacebookExtractor {
    client: Option<Arc<dyn LlmClient>>,
    max_images: usize,
}

impl FacebookExtractor {
    pub fn new(client: Option<Arc<dyn LlmClient>>, max_images: usize) -> Self {
        Self { client, max_images }
    }

    /// LLM-backed when an API key is configured, heuristics only otherwise
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let client: Option<Arc<dyn LlmClient>> = match settings.api_key {
            Some(_) => Some(Arc::new(ServiceClient::new(settings)?)),
            None => {
                app_log!(warn, "No LLM API key configured, Facebook extraction will use heuristics only");
                None
            }
        };
        Ok(Self::new(client, settings.max_images))
    }

    pub fn llm_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    /// Full pipeline: one LLM call when available, then matcher fallback per field
    pub async fn extract(
        &self,
        post_text: &str,
        mut images: Vec<LlmImage>,
        reference: NaiveDate,
    ) -> ExtractionResult {
        if images.len() > self.max_images {
            app_log!(
                warn,
                "Dropping {} screenshots over the limit of {}",
                images.len() - self.max_images,
                self.max_images
            );
            images.truncate(self.max_images);
        }

        let raw_llm_response = match &self.client {
            Some(client) => {
                let request = LlmRequest {
                    system_prompt: SYSTEM_PROMPT.to_string(),
                    user_prompt: build_user_prompt(post_text, images.len(), reference),
                    images,
                };
                match client.complete(&request).await {
                    Ok(raw) => Some(raw),
                    Err(e) => {
                        app_log!(warn, "LLM extraction failed, falling back to heuristics: {:#}", e);
                        None
                    }
                }
            }
            None => None,
        };

        let answer = raw_llm_response.as_deref().and_then(|raw| {
            let parsed = json_object(raw);
            if parsed.is_none() {
                app_log!(warn, "LLM reply was not a JSON object, falling back to heuristics");
            }
            parsed
        });

        let result = merge(post_text, answer.as_ref(), raw_llm_response, reference);
        app_log!(
            info,
            "Extracted facebook listing via {} (fallback fields: {:?})",
            result.method.as_str(),
            result.fallback_fields
        );
        result
    }

    /// Matchers only; no network, nothing stored
    pub fn extract_heuristics(post_text: &str, reference: NaiveDate) -> ExtractionResult {
        merge(post_text, None, None, reference)
    }
}

fn build_user_prompt(post_text: &str, image_count: usize, reference: NaiveDate) -> String {
    let post_text = if post_text.trim().is_empty() {
        "(no text, see screenshots)"
    } else {
        post_text.trim()
    };
    format!(
        "Reference date: {}\nScreenshots attached: {}\n\nPost text:\n{}",
        reference.format("%Y-%m-%d"),
        image_count,
        post_text
    )
}

fn merge(
    post_text: &str,
    answer: Option<&Map<String, Value>>,
    raw_llm_response: Option<String>,
    reference: NaiveDate,
) -> ExtractionResult {
    let empty = Map::new();
    let llm = LlmAnswer {
        fields: answer.unwrap_or(&empty),
        reference,
    };

    let ocr_text = llm.text("ocr_text");
    let text = match &ocr_text {
        Some(ocr) => format!("{}\n{}", post_text, ocr),
        None => post_text.to_string(),
    };

    let (heuristic_start, heuristic_end) = heuristics::extract_dates(&text, reference);
    let mut merger = FieldMerger {
        fallback_fields: Vec::new(),
    };

    let monthly_rent = merger.pick("price", llm.price(), || heuristics::extract_price(&text));
    let start_date = merger.pick("start_date", llm.date("start_date", None), || heuristic_start);
    let end_date = merger.pick(
        "end_date",
        llm.date("end_date", start_date),
        || heuristic_end.filter(|end| start_date.map_or(true, |start| *end > start)),
    );
    let bedrooms = merger.pick("bedrooms", llm.bedrooms(), || heuristics::extract_bedrooms(&text));
    let bathrooms = merger.pick("bathrooms", llm.bathrooms(), || {
        heuristics::extract_bathrooms(&text)
    });
    let property_name = merger.pick("property_name", llm.text("property_name"), || {
        heuristics::extract_property_name(&text)
    });
    let address = merger.pick("address", llm.text("address"), || {
        heuristics::extract_address(&text)
    });
    let amenities = merger.pick_list("amenities", llm.list("amenities"), || {
        heuristics::extract_amenities(&text)
    });
    let special_requirements = merger.pick_list(
        "special_requirements",
        llm.list("special_requirements"),
        || heuristics::extract_special_requirements(&text),
    );
    let gender_preference = merger.pick("gender_preference", llm.gender(), || {
        heuristics::extract_gender_preference(&text)
    });
    let furnished = merger.pick("furnished", llm.flag("furnished"), || {
        heuristics::extract_furnished(&text)
    });
    let utilities_included = merger.pick("utilities_included", llm.flag("utilities_included"), || {
        heuristics::extract_utilities_included(&text)
    });
    let contact = merger.pick("contact", llm.text("contact"), || {
        heuristics::extract_contact(&text)
    });
    let description = merger.pick("description", llm.text("description"), || {
        heuristics::extract_description(post_text)
    });

    let mut fields = ExtractedFields {
        title: None,
        monthly_rent,
        start_date,
        end_date,
        bedrooms,
        bathrooms,
        property_name,
        address,
        amenities,
        special_requirements,
        gender_preference,
        furnished,
        utilities_included,
        contact,
        description,
    };
    fields.title = merger.pick("title", llm.text("title"), || {
        heuristics::build_title(&fields, &text)
    });

    let method = match (answer, merger.fallback_fields.is_empty()) {
        (None, _) => ExtractionMethod::Heuristics,
        (Some(_), true) => ExtractionMethod::Llm,
        (Some(_), false) => ExtractionMethod::LlmWithHeuristics,
    };

    ExtractionResult {
        fields,
        method,
        fallback_fields: merger.fallback_fields,
        ocr_text,
        raw_llm_response,
    }
}
