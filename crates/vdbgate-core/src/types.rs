//! Virtual database data model
//!
//! These types describe what the gateway deploys to the embedded engine:
//! one VDB holding one physical model per registered data source.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name of the VDB the gateway assembles and deploys.
pub const VDB_NAME: &str = "default";

/// Version the default VDB is pinned to.
pub const VDB_VERSION: &str = "1.0.0";

/// Scheme prefix of URLs pointing at a deployed VDB.
pub const FEDERATED_URL_PREFIX: &str = "jdbc:teiid:";

/// Driver class clients use to connect to the federated URL.
pub const ENGINE_DRIVER_CLASS: &str = "org.teiid.jdbc.TeiidDriver";

/// Builds the federated URL for a VDB name.
pub fn federated_url(vdb_name: &str) -> String {
    format!("{FEDERATED_URL_PREFIX}{vdb_name}")
}

/// Pairing of a JDBC driver class with the translator for its dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatorBinding {
    pub driver_class_name: String,
    pub translator_id: String,
}

impl TranslatorBinding {
    pub fn new(driver_class_name: impl Into<String>, translator_id: impl Into<String>) -> Self {
        Self {
            driver_class_name: driver_class_name.into(),
            translator_id: translator_id.into(),
        }
    }
}

/// Kind of model inside a VDB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelType {
    Physical,
    Virtual,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Physical => "PHYSICAL",
            Self::Virtual => "VIRTUAL",
        }
    }
}

/// Binds a model to a connection and the translator used to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapping {
    pub name: String,
    /// Key under which the connection factory was registered with the engine
    pub connection_key: String,
    pub translator_id: String,
}

/// One concrete backing data source inside the VDB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalModel {
    pub name: String,
    pub model_type: ModelType,
    pub properties: BTreeMap<String, String>,
    pub source: SourceMapping,
}

impl PhysicalModel {
    /// Metadata import options applied to every data-source model.
    pub const IMPORTER_PROPERTIES: [(&'static str, &'static str); 2] = [
        ("importer.useQualifiedName", "false"),
        ("importer.tableTypes", "TABLE,VIEW"),
    ];

    /// Creates a physical model whose name, source name and connection key
    /// are all the data source name.
    pub fn for_data_source(name: impl Into<String>, translator_id: impl Into<String>) -> Self {
        let name = name.into();
        let properties = Self::IMPORTER_PROPERTIES
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self {
            source: SourceMapping {
                name: name.clone(),
                connection_key: name.clone(),
                translator_id: translator_id.into(),
            },
            name,
            model_type: ModelType::Physical,
            properties,
        }
    }

    pub fn translator_id(&self) -> &str {
        &self.source.translator_id
    }
}

/// In-memory virtual database descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdbDescriptor {
    pub name: String,
    pub version: String,
    pub properties: BTreeMap<String, String>,
    models: Vec<PhysicalModel>,
}

impl VdbDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            properties: BTreeMap::new(),
            models: Vec::new(),
        }
    }

    /// The implicit `default` VDB the gateway deploys.
    pub fn default_vdb() -> Self {
        let mut vdb = Self::new(VDB_NAME, VDB_VERSION);
        vdb.properties.insert("implicit".to_string(), "true".to_string());
        vdb
    }

    pub fn model(&self, name: &str) -> Option<&PhysicalModel> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.model(name).is_some()
    }

    /// Appends a model unless one with the same name exists.
    ///
    /// Returns `true` when the model was added.
    pub fn add_model(&mut self, model: PhysicalModel) -> bool {
        if self.has_model(&model.name) {
            return false;
        }
        self.models.push(model);
        true
    }

    /// Models in registration order
    pub fn models(&self) -> &[PhysicalModel] {
        &self.models
    }

    pub fn is_implicit(&self) -> bool {
        self.properties.get("implicit").map(String::as_str) == Some("true")
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }
}

impl Default for VdbDescriptor {
    fn default() -> Self {
        Self::default_vdb()
    }
}
