use crate::config::PricingConfig;
use crate::error::PricingError;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;

const PROVIDER_PREFIXES: &[&str] = &[
    "openai/",
    "anthropic/",
    "google/",
    "azure/",
    "cohere/",
    "mistral/",
];

/// Per-token pricing entry for a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPrice {
    pub input_cost_per_token: f64,
    pub output_cost_per_token: f64,
    pub provider: Option<String>,
}

/// A project-defined model whose name is recognised by a regular expression,
/// e.g. `(?i)^(ft:)?gpt-4o-custom(-\d+)?$`.
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    pub model_name: String,
    pattern: Regex,
    pub price: ModelPrice,
}

impl ModelDefinition {
    pub fn new(
        model_name: impl Into<String>,
        match_pattern: &str,
        price: ModelPrice,
    ) -> Result<Self, PricingError> {
        Ok(Self {
            model_name: model_name.into(),
            pattern: Regex::new(match_pattern)?,
            price,
        })
    }

    pub fn matches(&self, model: &str) -> bool {
        self.pattern.is_match(model)
    }
}

/// Deserialization type for LiteLLM's pricing JSON entries.
#[derive(Debug, Deserialize)]
struct LiteLlmEntry {
    input_cost_per_token: Option<f64>,
    output_cost_per_token: Option<f64>,
    litellm_provider: Option<String>,
}

/// In-memory pricing table with bundled defaults, custom model definitions
/// and runtime refresh.
pub struct PricingTable {
    definitions: RwLock<Vec<ModelDefinition>>,
    prices: RwLock<HashMap<String, ModelPrice>>,
    overrides: RwLock<HashMap<String, ModelPrice>>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingTable {
    /// Table backed by the bundled LiteLLM pricing data.
    pub fn new() -> Self {
        let bundled = include_bytes!("../data/model_prices.json");
        let prices = Self::parse_litellm_json(bundled);
        tracing::info!(models = prices.len(), "loaded bundled model pricing");
        Self {
            definitions: RwLock::new(Vec::new()),
            prices: RwLock::new(prices),
            overrides: RwLock::new(HashMap::new()),
        }
    }

    /// Bundled table plus the custom models declared in configuration.
    pub fn from_config(config: &PricingConfig) -> Result<Self, PricingError> {
        let table = Self::new();
        for custom in &config.custom_models {
            table.add_definition(ModelDefinition::new(
                custom.model_name.clone(),
                &custom.match_pattern,
                ModelPrice {
                    input_cost_per_token: custom.input_cost_per_token,
                    output_cost_per_token: custom.output_cost_per_token,
                    provider: None,
                },
            )?);
        }
        Ok(table)
    }

    fn parse_litellm_json(data: &[u8]) -> HashMap<String, ModelPrice> {
        let raw: HashMap<String, LiteLlmEntry> = match serde_json::from_slice(data) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse pricing JSON");
                return HashMap::new();
            }
        };

        let mut prices = HashMap::with_capacity(raw.len());
        for (model, entry) in raw {
            // Entries without pricing data (e.g. "sample_spec") are skipped
            if let (Some(input), Some(output)) =
                (entry.input_cost_per_token, entry.output_cost_per_token)
            {
                prices.insert(
                    model,
                    ModelPrice {
                        input_cost_per_token: input,
                        output_cost_per_token: output,
                        provider: entry.litellm_provider,
                    },
                );
            }
        }
        prices
    }

    /// Replace base prices from raw LiteLLM JSON. An empty or unparsable
    /// payload keeps the existing prices. Returns the number of models loaded.
    pub fn refresh(&self, data: &[u8]) -> usize {
        let new_prices = Self::parse_litellm_json(data);
        if new_prices.is_empty() {
            tracing::warn!("refresh returned empty pricing data, keeping existing");
            return 0;
        }
        let count = new_prices.len();
        tracing::info!(models = count, "refreshed model pricing");
        *self.prices.write().unwrap_or_else(|e| e.into_inner()) = new_prices;
        count
    }

    /// Fetch a LiteLLM price file and refresh from it.
    pub async fn refresh_from_url(
        &self,
        client: &reqwest::Client,
        url: &str,
    ) -> Result<usize, PricingError> {
        tracing::info!("refreshing model pricing from {url}");
        let resp = client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(PricingError::Status(resp.status().as_u16()));
        }
        let bytes = resp.bytes().await?;
        match self.refresh(&bytes) {
            0 => Err(PricingError::Empty),
            n => Ok(n),
        }
    }

    pub fn add_definition(&self, definition: ModelDefinition) {
        self.definitions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(definition);
    }

    pub fn set_override(&self, model: String, price: ModelPrice) {
        self.overrides
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(model, price);
    }

    /// Cost in USD for a model and token counts; `None` when the model is unknown.
    pub fn cost_usd(&self, model: &str, input_tokens: i64, output_tokens: i64) -> Option<f64> {
        self.lookup(model).map(|price| {
            (input_tokens as f64) * price.input_cost_per_token
                + (output_tokens as f64) * price.output_cost_per_token
        })
    }

    /// Look up pricing for a model:
    /// 1. Custom definitions, by match pattern, in insertion order
    /// 2. Overrides (exact)
    /// 3. Exact match
    /// 4. Provider-prefixed: "{provider}/{model}"
    /// 5. Strip date suffix: "gpt-4o-2024-08-06" -> "gpt-4o"
    pub fn lookup(&self, model: &str) -> Option<ModelPrice> {
        {
            let definitions = self.definitions.read().unwrap_or_else(|e| e.into_inner());
            if let Some(def) = definitions.iter().find(|d| d.matches(model)) {
                return Some(def.price.clone());
            }
        }
        {
            let overrides = self.overrides.read().unwrap_or_else(|e| e.into_inner());
            if let Some(price) = overrides.get(model) {
                return Some(price.clone());
            }
        }

        let prices = self.prices.read().unwrap_or_else(|e| e.into_inner());
        let find = |name: &str| {
            prices.get(name).cloned().or_else(|| {
                PROVIDER_PREFIXES
                    .iter()
                    .find_map(|prefix| prices.get(&format!("{prefix}{name}")).cloned())
            })
        };

        find(model).or_else(|| strip_date_suffix(model).and_then(find))
    }

    pub fn model_count(&self) -> usize {
        self.prices.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Strip a trailing "-YYYY-MM-DD" or "-YYYYMMDD" date suffix from a model name.
fn strip_date_suffix(model: &str) -> Option<&str> {
    let (base, suffix) = model.rsplit_once('-')?;
    if suffix.len() == 8 && suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Some(base);
    }
    // -YYYY-MM-DD spans three dash-separated parts
    let bytes = model.as_bytes();
    if bytes.len() < 11 {
        return None;
    }
    let start = bytes.len() - 11;
    let digits = |r: std::ops::Range<usize>| bytes[r].iter().all(|b| b.is_ascii_digit());
    if bytes[start] == b'-'
        && bytes[start + 5] == b'-'
        && bytes[start + 8] == b'-'
        && digits(start + 1..start + 5)
        && digits(start + 6..start + 8)
        && digits(start + 9..start + 11)
    {
        Some(&model[..start])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustomModelConfig;

    #[test]
    fn test_strip_date_suffix() {
        assert_eq!(strip_date_suffix("gpt-4o-2024-08-06"), Some("gpt-4o"));
        assert_eq!(
            strip_date_suffix("claude-3-5-haiku-20241022"),
            Some("claude-3-5-haiku")
        );
        assert_eq!(strip_date_suffix("gpt-4o"), None);
        assert_eq!(strip_date_suffix(""), None);
    }

    #[test]
    fn test_bundled_data() {
        let table = PricingTable::new();
        assert!(table.model_count() > 5);
        let price = table.lookup("gpt-4o").expect("gpt-4o should exist");
        assert!(price.input_cost_per_token > 0.0);
    }

    #[test]
    fn test_fuzzy_lookup() {
        let table = PricingTable::new();
        // date suffix
        assert!(table.lookup("gpt-4o-2024-08-06").is_some());
        // provider prefix
        assert!(table.lookup("gemini-1.5-pro").is_some());
        assert!(table.lookup("claude-3-5-haiku-20241022").is_some());
        assert!(table.lookup("totally-fake-model-xyz").is_none());
    }

    #[test]
    fn test_cost_usd() {
        let table = PricingTable::new();
        // gpt-4o: input=$2.50/M, output=$10.00/M
        let cost = table.cost_usd("gpt-4o", 1_000_000, 100_000).unwrap();
        assert!((cost - 3.5).abs() < 1e-9);
        assert_eq!(table.cost_usd("gpt-4o", 0, 0), Some(0.0));
        assert_eq!(table.cost_usd("nope", 10, 10), None);
    }

    #[test]
    fn test_definition_beats_override() {
        let table = PricingTable::new();
        table.set_override(
            "gpt-4o".to_string(),
            ModelPrice {
                input_cost_per_token: 0.001,
                output_cost_per_token: 0.002,
                provider: Some("openai".to_string()),
            },
        );
        assert_eq!(table.lookup("gpt-4o").unwrap().input_cost_per_token, 0.001);

        table.add_definition(
            ModelDefinition::new(
                "gpt-4o",
                r"(?i)^gpt-4o$",
                ModelPrice {
                    input_cost_per_token: 0.5,
                    output_cost_per_token: 0.5,
                    provider: None,
                },
            )
            .unwrap(),
        );
        assert_eq!(table.lookup("GPT-4o").unwrap().input_cost_per_token, 0.5);
    }

    #[test]
    fn test_refresh_keeps_existing_on_empty() {
        let table = PricingTable::new();
        let before = table.model_count();
        assert_eq!(table.refresh(b"{}"), 0);
        assert_eq!(table.refresh(b"not json"), 0);
        assert_eq!(table.model_count(), before);

        let n = table.refresh(
            br#"{"only-model": {"input_cost_per_token": 1e-6, "output_cost_per_token": 2e-6}}"#,
        );
        assert_eq!(n, 1);
        assert!(table.lookup("gpt-4o").is_none());
    }

    #[test]
    fn test_from_config_rejects_bad_pattern() {
        let mut config = PricingConfig::default();
        config.custom_models.push(CustomModelConfig {
            model_name: "broken".into(),
            match_pattern: "(unclosed".into(),
            input_cost_per_token: 0.0,
            output_cost_per_token: 0.0,
        });
        assert!(matches!(
            PricingTable::from_config(&config),
            Err(PricingError::Pattern(_))
        ));
    }
}
