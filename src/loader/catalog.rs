//! Mineral catalog file: `{"minerals": [ {...}, ... ]}`.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::RagError;
use crate::models::NewDocument;
use crate::rag::retrieval::group_digits;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    minerals: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    id: Option<String>,
    name: JsonMap<String, JsonValue>,
    description: String,
    symbol: String,
    #[serde(rename = "type")]
    kind: String,
    current_price: f64,
    unit: String,
    market: String,
    annual_production: f64,
    #[serde(default)]
    documents: Vec<String>,
}

impl CatalogEntry {
    fn name(&self, lang: &str) -> Result<&str, RagError> {
        self.name
            .get(lang)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| RagError::Catalog(format!("mineral '{}' has no '{}' name", self.symbol, lang)))
    }

    fn text(&self) -> Result<String, RagError> {
        let mut text = format!(
            "{} ({}) - {}. Symbol: {}. Type: {}. Current price: ${}/{} ({}). Annual production: {} tons. ",
            self.name("en")?,
            self.name("ru")?,
            self.description,
            self.symbol,
            self.kind,
            group_digits(self.current_price),
            self.unit,
            self.market,
            group_digits(self.annual_production),
        );
        text.push_str(&self.documents.join(" "));
        Ok(text)
    }
}

/// Reads the catalog at `path`. A missing file yields `Ok(None)`.
pub async fn read_catalog(path: &Path) -> Result<Option<Vec<NewDocument>>, RagError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RagError::Catalog(format!("cannot read {}: {}", path.display(), e))),
    };

    let source_file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    parse_catalog(&raw, &source_file).map(Some)
}

pub fn parse_catalog(raw: &str, source_file: &str) -> Result<Vec<NewDocument>, RagError> {
    let file: CatalogFile =
        serde_json::from_str(raw).map_err(|e| RagError::Catalog(format!("{}: {}", source_file, e)))?;

    file.minerals
        .into_iter()
        .enumerate()
        .map(|(position, value)| entry_document(position, value, source_file))
        .collect()
}

fn entry_document(position: usize, value: JsonValue, source_file: &str) -> Result<NewDocument, RagError> {
    let entry: CatalogEntry = serde_json::from_value(value.clone())
        .map_err(|e| RagError::Catalog(format!("{} entry #{}: {}", source_file, position, e)))?;
    let text = entry.text()?;
    let id = entry
        .id
        .clone()
        .unwrap_or_else(|| format!("mineral_{}", entry.symbol.to_lowercase()));

    let JsonValue::Object(fields) = value else {
        return Err(RagError::Catalog(format!("{} entry #{} is not an object", source_file, position)));
    };

    let mut attributes = JsonMap::new();
    for (key, field) in fields {
        if key == "id" {
            continue;
        }
        match field {
            JsonValue::Object(names) if key == "name" => {
                for (lang, name) in names {
                    if let JsonValue::String(name) = name {
                        attributes.insert(format!("name_{}", lang), JsonValue::String(name));
                    }
                }
            }
            scalar @ (JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Bool(_)) => {
                attributes.insert(key, scalar);
            }
            JsonValue::Array(items) if items.iter().all(JsonValue::is_string) => {
                attributes.insert(key, JsonValue::Array(items));
            }
            _ => tracing::debug!("Skipping non-scalar catalog field '{}' of {}", key, id),
        }
    }
    attributes.insert("document_type".to_string(), JsonValue::from("mineral_catalog"));
    attributes.insert("source_file".to_string(), JsonValue::from(source_file));
    attributes.insert("source".to_string(), JsonValue::from("openmineral_catalog"));

    Ok(NewDocument {
        id: Some(id),
        text,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CATALOG: &str = r#"{
        "minerals": [
            {
                "symbol": "Cu",
                "name": { "en": "Copper", "ru": "Медь" },
                "description": "Core industrial metal",
                "type": "base_metal",
                "current_price": 9500,
                "unit": "USD/ton",
                "market": "LME",
                "annual_production": 21000000,
                "top_producers": ["Chile", "Peru"],
                "grades": [{ "purity": 99.9 }],
                "documents": ["Grade A cathodes.", "LME registered."]
            },
            {
                "id": "li_custom",
                "symbol": "Li",
                "name": { "en": "Lithium", "ru": "Литий" },
                "description": "Battery metal",
                "type": "battery_material",
                "current_price": 15000,
                "unit": "USD/ton",
                "market": "battery_index",
                "annual_production": 130000
            }
        ]
    }"#;

    #[test]
    fn test_entry_text_and_attributes() {
        let docs = parse_catalog(CATALOG, "minerals_catalog.json").unwrap();
        assert_eq!(docs.len(), 2);

        let copper = &docs[0];
        assert_eq!(copper.id.as_deref(), Some("mineral_cu"));
        assert_eq!(
            copper.text,
            "Copper (Медь) - Core industrial metal. Symbol: Cu. Type: base_metal. \
             Current price: $9,500/USD/ton (LME). Annual production: 21,000,000 tons. \
             Grade A cathodes. LME registered."
        );
        assert_eq!(copper.attributes["name_en"], json!("Copper"));
        assert_eq!(copper.attributes["name_ru"], json!("Медь"));
        assert_eq!(copper.attributes["top_producers"], json!(["Chile", "Peru"]));
        assert_eq!(copper.attributes["document_type"], json!("mineral_catalog"));
        assert_eq!(copper.attributes["source_file"], json!("minerals_catalog.json"));
        assert!(!copper.attributes.contains_key("grades"));
        assert!(!copper.attributes.contains_key("name"));

        assert_eq!(docs[1].id.as_deref(), Some("li_custom"));
        assert!(!docs[1].attributes.contains_key("id"));
    }

    #[test]
    fn test_malformed_catalog_is_a_catalog_error() {
        assert!(matches!(parse_catalog("{ not json", "x.json"), Err(RagError::Catalog(_))));

        let missing_price = r#"{ "minerals": [ { "symbol": "Au", "name": { "en": "Gold", "ru": "Золото" } } ] }"#;
        assert!(matches!(parse_catalog(missing_price, "x.json"), Err(RagError::Catalog(_))));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_catalog(&dir.path().join("absent.json")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reads_catalog_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minerals_catalog.json");
        tokio::fs::write(&path, CATALOG).await.unwrap();

        let docs = read_catalog(&path).await.unwrap().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].attributes["source_file"], json!("minerals_catalog.json"));
    }
}
