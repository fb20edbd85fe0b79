// SPDX-License-Identifier: Apache-2.0

//! VDB deployment descriptor
//!
//! Marshals a [`VdbDescriptor`] into the engine's `vdb.xml` shape and reads
//! it back. Only the elements the gateway produces are understood:
//! `vdb`, `property`, `model` and `source`.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use vdbgate_core::{
    GatewayError, GatewayResult, ModelType, PhysicalModel, SourceMapping, VdbDescriptor,
};

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const TAG_PATTERN: &str = r"<(/?)(vdb|model|property|source)\b([^>]*?)(/?)>";
const ATTR_PATTERN: &str = r#"([\w.\-]+)\s*=\s*"([^"]*)""#;

static TAG_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
static ATTR_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn compiled(
    cell: &'static OnceLock<Result<Regex, regex::Error>>,
    pattern: &str,
) -> GatewayResult<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| GatewayError::internal(format!("Invalid descriptor pattern: {e}")))
}

/// Serializes the descriptor to deployment bytes.
pub fn marshal(vdb: &VdbDescriptor) -> GatewayResult<Vec<u8>> {
    if vdb.name.trim().is_empty() || vdb.version.trim().is_empty() {
        return Err(GatewayError::validation("VDB name and version must not be empty"));
    }

    let mut xml = String::with_capacity(256 + vdb.len() * 256);
    xml.push_str(XML_HEADER);
    xml.push('\n');
    xml.push_str(&format!(
        "<vdb name=\"{}\" version=\"{}\">\n",
        escape(&vdb.name),
        escape(&vdb.version)
    ));
    write_properties(&mut xml, &vdb.properties, 1);

    for model in vdb.models() {
        if model.name.trim().is_empty() {
            return Err(GatewayError::validation("Model name must not be empty"));
        }
        xml.push_str(&format!(
            "    <model name=\"{}\" type=\"{}\">\n",
            escape(&model.name),
            model.model_type.as_str()
        ));
        write_properties(&mut xml, &model.properties, 2);
        xml.push_str(&format!(
            "        <source name=\"{}\" translator-name=\"{}\" connection-jndi-name=\"{}\"/>\n",
            escape(&model.source.name),
            escape(&model.source.translator_id),
            escape(&model.source.connection_key)
        ));
        xml.push_str("    </model>\n");
    }

    xml.push_str("</vdb>\n");
    Ok(xml.into_bytes())
}

fn write_properties(xml: &mut String, properties: &BTreeMap<String, String>, depth: usize) {
    let indent = "    ".repeat(depth);
    for (name, value) in properties {
        xml.push_str(&format!(
            "{indent}<property name=\"{}\" value=\"{}\"/>\n",
            escape(name),
            escape(value)
        ));
    }
}

/// Parses deployment bytes produced by [`marshal`].
pub fn unmarshal(raw: &[u8]) -> GatewayResult<VdbDescriptor> {
    let xml = std::str::from_utf8(raw)
        .map_err(|e| GatewayError::validation(format!("Descriptor is not valid UTF-8: {e}")))?;

    let tag_re = compiled(&TAG_RE, TAG_PATTERN)?;
    let attr_re = compiled(&ATTR_RE, ATTR_PATTERN)?;

    let mut vdb: Option<VdbDescriptor> = None;
    let mut model: Option<PartialModel> = None;
    let mut closed = false;

    for cap in tag_re.captures_iter(xml) {
        let closing = &cap[1] == "/";
        let tag = &cap[2];
        let attrs: BTreeMap<String, String> = attr_re
            .captures_iter(&cap[3])
            .map(|a| (a[1].to_string(), unescape(&a[2])))
            .collect();

        match (tag, closing) {
            ("vdb", false) => {
                if vdb.is_some() {
                    return Err(malformed("nested <vdb> element"));
                }
                vdb = Some(VdbDescriptor::new(
                    required(&attrs, "name", "vdb")?,
                    required(&attrs, "version", "vdb")?,
                ));
            }
            ("vdb", true) => {
                if model.is_some() {
                    return Err(malformed("unclosed <model> element"));
                }
                closed = true;
            }
            ("model", false) => {
                if vdb.is_none() || model.is_some() {
                    return Err(malformed("<model> outside of <vdb>"));
                }
                let model_type = match attrs.get("type").map(String::as_str) {
                    None | Some("PHYSICAL") => ModelType::Physical,
                    Some("VIRTUAL") => ModelType::Virtual,
                    Some(other) => return Err(malformed(&format!("unknown model type {other}"))),
                };
                model = Some(PartialModel {
                    name: required(&attrs, "name", "model")?,
                    model_type,
                    properties: BTreeMap::new(),
                    source: None,
                });
            }
            ("model", true) => {
                let partial = model.take().ok_or_else(|| malformed("unexpected </model>"))?;
                let target = vdb.as_mut().ok_or_else(|| malformed("</model> outside of <vdb>"))?;
                let name = partial.name.clone();
                if !target.add_model(partial.finish()?) {
                    return Err(malformed(&format!("duplicate model {name}")));
                }
            }
            ("property", false) => {
                let name = required(&attrs, "name", "property")?;
                let value = attrs.get("value").cloned().unwrap_or_default();
                match (model.as_mut(), vdb.as_mut()) {
                    (Some(m), _) => {
                        m.properties.insert(name, value);
                    }
                    (None, Some(v)) => {
                        v.properties.insert(name, value);
                    }
                    (None, None) => return Err(malformed("<property> outside of <vdb>")),
                }
            }
            ("source", false) => {
                let m = model.as_mut().ok_or_else(|| malformed("<source> outside of <model>"))?;
                m.source = Some(SourceMapping {
                    name: required(&attrs, "name", "source")?,
                    translator_id: required(&attrs, "translator-name", "source")?,
                    connection_key: required(&attrs, "connection-jndi-name", "source")?,
                });
            }
            _ => {}
        }
    }

    match vdb {
        Some(vdb) if closed => Ok(vdb),
        Some(_) => Err(malformed("missing </vdb>")),
        None => Err(malformed("no <vdb> element")),
    }
}

struct PartialModel {
    name: String,
    model_type: ModelType,
    properties: BTreeMap<String, String>,
    source: Option<SourceMapping>,
}

impl PartialModel {
    fn finish(self) -> GatewayResult<PhysicalModel> {
        let source = self
            .source
            .ok_or_else(|| malformed(&format!("model {} has no <source>", self.name)))?;
        Ok(PhysicalModel {
            name: self.name,
            model_type: self.model_type,
            properties: self.properties,
            source,
        })
    }
}

fn required(attrs: &BTreeMap<String, String>, key: &str, element: &str) -> GatewayResult<String> {
    attrs
        .get(key)
        .cloned()
        .ok_or_else(|| malformed(&format!("<{element}> is missing attribute {key}")))
}

fn malformed(detail: &str) -> GatewayError {
    GatewayError::validation(format!("Malformed VDB descriptor: {detail}"))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
