use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::model::{Dataset, Document};

const TEMPLATE_JSON: &str = include_str!("../schema/page_extraction_template.json");

#[derive(Debug, Clone, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct TemplateDocument {
    schema_version: String,
    fields: BTreeMap<String, FieldSpec>,
}

/// The recognised field set. Parsed once per process and passed by reference.
#[derive(Debug, Clone)]
pub struct Schema {
    version: String,
    fields: BTreeMap<String, FieldSpec>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UnknownFields {
    Reject,
    Tolerate,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ValidationPolicy {
    pub allow_empty: bool,
    pub unknown_fields: UnknownFields,
}

impl ValidationPolicy {
    pub fn ground_truth() -> Self {
        Self {
            allow_empty: false,
            unknown_fields: UnknownFields::Reject,
        }
    }

    pub fn predictions() -> Self {
        Self {
            allow_empty: true,
            unknown_fields: UnknownFields::Tolerate,
        }
    }
}

impl Schema {
    pub fn canonical() -> Result<Self, SchemaError> {
        Self::from_template(TEMPLATE_JSON)
    }

    /// The template exactly as compiled in, for `--template`.
    pub fn template_json() -> &'static str {
        TEMPLATE_JSON
    }

    pub fn from_template(raw: &str) -> Result<Self, SchemaError> {
        let template: TemplateDocument =
            serde_json::from_str(raw).map_err(|err| SchemaError::Template {
                reason: err.to_string(),
            })?;

        if template.schema_version.trim().is_empty() {
            return Err(SchemaError::Template {
                reason: "schema_version must not be empty".to_string(),
            });
        }
        if template.fields.is_empty() {
            return Err(SchemaError::Template {
                reason: "at least one field must be declared".to_string(),
            });
        }
        if let Some((name, spec)) = template.fields.iter().find(|(_, spec)| spec.kind != "string")
        {
            return Err(SchemaError::Template {
                reason: format!("field '{name}' has unsupported type '{}'", spec.kind),
            });
        }

        Ok(Self {
            version: template.schema_version,
            fields: template.fields,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Validates an untyped JSON dataset. All-or-nothing: the first violated
    /// rule, checked in order (shape, ids, uniqueness, fields), is reported.
    pub fn validate(
        &self,
        value: &Value,
        policy: ValidationPolicy,
    ) -> Result<Dataset, SchemaError> {
        let entries = value.as_array().ok_or(SchemaError::NotAList)?;
        if entries.is_empty() && !policy.allow_empty {
            return Err(SchemaError::EmptyDataset);
        }

        let objects = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| entry.as_object().ok_or(SchemaError::NotAnObject { index }))
            .collect::<Result<Vec<&Map<String, Value>>, SchemaError>>()?;

        let document_ids = objects
            .iter()
            .enumerate()
            .map(|(index, object)| {
                object
                    .get("document_id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.trim().is_empty())
                    .ok_or(SchemaError::MissingDocumentId { index })
            })
            .collect::<Result<Vec<&str>, SchemaError>>()?;

        let mut first_seen = HashMap::<&str, usize>::with_capacity(document_ids.len());
        for (index, document_id) in document_ids.iter().enumerate() {
            if let Some(first_index) = first_seen.insert(*document_id, index) {
                return Err(SchemaError::DuplicateDocumentId {
                    document_id: document_id.to_string(),
                    index,
                    first_index,
                });
            }
        }

        let mut documents = Vec::with_capacity(objects.len());
        for (index, (object, document_id)) in objects.iter().zip(&document_ids).enumerate() {
            let fields = self.validate_fields(index, document_id, object.get("fields"), policy)?;
            documents.push(Document {
                document_id: document_id.to_string(),
                fields,
            });
        }

        Ok(Dataset::from_unique(documents))
    }

    fn validate_fields(
        &self,
        index: usize,
        document_id: &str,
        raw: Option<&Value>,
        policy: ValidationPolicy,
    ) -> Result<BTreeMap<String, String>, SchemaError> {
        let Some(object) = raw.and_then(Value::as_object) else {
            return Err(SchemaError::InvalidFields {
                index,
                document_id: document_id.to_string(),
            });
        };

        let mut fields = BTreeMap::new();
        for (name, value) in object {
            let Some(text) = value.as_str() else {
                return Err(SchemaError::NonStringField {
                    index,
                    document_id: document_id.to_string(),
                    field: name.clone(),
                });
            };
            if policy.unknown_fields == UnknownFields::Reject && !self.contains(name) {
                return Err(SchemaError::UnrecognizedField {
                    index,
                    document_id: document_id.to_string(),
                    field: name.clone(),
                });
            }
            fields.insert(name.clone(), text.to_string());
        }

        Ok(fields)
    }
}
