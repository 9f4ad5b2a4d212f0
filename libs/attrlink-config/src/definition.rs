//! Device definition parsing and attribute expansion
//!
//! A device definition is a YAML document listing attribute templates. A
//! template expands into one attribute per element of the cartesian product
//! of its index ranges; the `{}` placeholders in its name are filled with
//! the index values. Without a MIB compiler in the loop, the semantic type
//! of every attribute comes from the definition itself (`dtype`, plus
//! `enum_values` / `bit_labels` tables where applicable).
//!
//! Expansion validates the definition aggressively: these are configuration
//! errors and the process should refuse to start on them.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use attrlink::{AccessMode, AttrKind, BitField, EnumLabels};

use crate::error::{DefinitionError, Result};

/// Top-level device definition document
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceDefinition {
    #[serde(default)]
    pub name: Option<String>,
    /// Poll loop tick rate in milliseconds
    #[serde(default)]
    pub poll_rate_ms: Option<u64>,
    pub attributes: Vec<AttrTemplate>,
}

/// One attribute template, possibly expanding to many attributes
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttrTemplate {
    /// Attribute name; `{}` placeholders are filled from `indexes`
    pub name: String,
    /// Dotted numeric OID base (SNMP devices only)
    #[serde(default)]
    pub oid: Option<String>,
    /// Explicit OID suffix for non-indexed attributes; `[0]` for scalars
    #[serde(default)]
    pub suffix: Option<Vec<u32>>,
    /// Expansion ranges, one per `{}` placeholder
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
    /// Minimum milliseconds between hardware reads; 0 = every cycle
    #[serde(default)]
    pub polling_period: u64,
    #[serde(default)]
    pub access: AccessMode,
    pub dtype: DtypeDef,
    /// Named values for `dtype: enum`, keyed by wire ordinal
    #[serde(default)]
    pub enum_values: Option<BTreeMap<u32, String>>,
    /// Named bit positions for `dtype: bits`
    #[serde(default)]
    pub bit_labels: Option<BTreeMap<u32, String>>,
}

/// Declared semantic type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtypeDef {
    #[serde(alias = "boolean")]
    Bool,
    Int,
    #[serde(alias = "double")]
    Float,
    #[serde(alias = "str")]
    String,
    Enum,
    Bits,
}

/// One expansion dimension: either a plain inclusive range `[a, b]`, or a
/// range with a stride and a separate sequential naming index for hardware
/// with non-uniform addressing.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IndexSpec {
    Range([u32; 2]),
    Detailed {
        start: u32,
        end: u32,
        #[serde(default = "default_step")]
        step: u32,
        /// First value used for name formatting; addresses keep the range
        /// values. Defaults to the address itself.
        #[serde(default)]
        start_index: Option<u32>,
    },
}

fn default_step() -> u32 {
    1
}

impl IndexSpec {
    /// (name value, address value) pairs of this dimension
    fn values(&self, attr: &str) -> Result<Vec<(u32, u32)>> {
        let (start, end, step, start_index) = match *self {
            IndexSpec::Range([a, b]) => (a, b, 1, None),
            IndexSpec::Detailed {
                start,
                end,
                step,
                start_index,
            } => (start, end, step, start_index),
        };
        if step == 0 {
            return Err(DefinitionError::InvalidIndexRange {
                name: attr.to_string(),
                message: "step must be at least 1".to_string(),
            });
        }
        if start > end {
            return Err(DefinitionError::InvalidIndexRange {
                name: attr.to_string(),
                message: format!("start {start} is greater than end {end}"),
            });
        }

        Ok((start..=end)
            .step_by(step as usize)
            .enumerate()
            .map(|(position, addr)| {
                let label = match start_index {
                    Some(first) => first + position as u32,
                    None => addr,
                };
                (label, addr)
            })
            .collect())
    }
}

/// One fully expanded attribute, ready to become an `AttrSpec`
#[derive(Debug, Clone)]
pub struct ExpandedAttr {
    pub name: String,
    /// Full numeric OID (base + suffix + indexes) for SNMP devices
    pub oid: Option<Vec<u32>>,
    pub polling_period: Duration,
    pub access: AccessMode,
    pub kind: AttrKind,
}

/// Parse the YAML file at `path`.
pub fn load_device_definition(path: impl AsRef<Path>) -> Result<DeviceDefinition> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| DefinitionError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    DeviceDefinition::from_yaml(&text)
}

impl DeviceDefinition {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Poll loop tick rate; defaults to one second.
    pub fn poll_rate(&self) -> Duration {
        Duration::from_millis(self.poll_rate_ms.unwrap_or(1000))
    }

    /// Expand every template and validate the result as a whole.
    pub fn expand(&self) -> Result<Vec<ExpandedAttr>> {
        let mut expanded = Vec::new();
        for template in &self.attributes {
            expand_template(template, &mut expanded)?;
        }

        let mut seen = std::collections::HashSet::new();
        for attr in &expanded {
            if !seen.insert(attr.name.as_str()) {
                return Err(DefinitionError::DuplicateName {
                    name: attr.name.clone(),
                });
            }
        }

        debug!(
            "expanded {} templates into {} attributes",
            self.attributes.len(),
            expanded.len()
        );
        Ok(expanded)
    }
}

fn expand_template(template: &AttrTemplate, out: &mut Vec<ExpandedAttr>) -> Result<()> {
    let placeholders = template.name.matches("{}").count();

    // Be kind, provide useful error messages
    if !template.indexes.is_empty() && placeholders == 0 {
        return Err(DefinitionError::IndexesWithoutPlaceholders {
            name: template.name.clone(),
        });
    }
    if template.indexes.is_empty() && placeholders > 0 {
        return Err(DefinitionError::PlaceholdersWithoutIndexes {
            name: template.name.clone(),
        });
    }
    if !template.indexes.is_empty() && placeholders != template.indexes.len() {
        return Err(DefinitionError::PlaceholderCount {
            name: template.name.clone(),
            placeholders,
            indexes: template.indexes.len(),
        });
    }

    let base_oid = match &template.oid {
        Some(oid) => Some(parse_oid(oid, &template.name)?),
        None => None,
    };
    if base_oid.is_some() && template.indexes.is_empty() && template.suffix.is_none() {
        return Err(DefinitionError::MissingSuffix {
            name: template.name.clone(),
        });
    }

    let kind = build_kind(template)?;
    let polling_period = Duration::from_millis(template.polling_period);

    let dimensions = template
        .indexes
        .iter()
        .map(|spec| spec.values(&template.name))
        .collect::<Result<Vec<_>>>()?;

    for element in cartesian_product(&dimensions) {
        let labels: Vec<u32> = element.iter().map(|(label, _)| *label).collect();
        let addrs = element.iter().map(|(_, addr)| *addr);

        let name = format_name(&template.name, &labels);
        if !is_identifier(&name) {
            return Err(DefinitionError::InvalidIdentifier { name });
        }

        let oid = base_oid.as_ref().map(|base| {
            base.iter()
                .copied()
                .chain(template.suffix.iter().flatten().copied())
                .chain(addrs)
                .collect()
        });

        out.push(ExpandedAttr {
            name,
            oid,
            polling_period,
            access: template.access,
            kind: kind.clone(),
        });
    }
    Ok(())
}

fn build_kind(template: &AttrTemplate) -> Result<AttrKind> {
    let type_error = |message: String| DefinitionError::InvalidType {
        name: template.name.clone(),
        message,
    };

    if template.enum_values.is_some() && template.dtype != DtypeDef::Enum {
        return Err(type_error(
            "enum_values is only valid with dtype enum".to_string(),
        ));
    }
    if template.bit_labels.is_some() && template.dtype != DtypeDef::Bits {
        return Err(type_error(
            "bit_labels is only valid with dtype bits".to_string(),
        ));
    }

    match template.dtype {
        DtypeDef::Bool => Ok(AttrKind::Bool),
        DtypeDef::Int => Ok(AttrKind::Int),
        DtypeDef::Float => Ok(AttrKind::Float),
        DtypeDef::String => Ok(AttrKind::Str),
        DtypeDef::Enum => {
            let named = template
                .enum_values
                .as_ref()
                .ok_or_else(|| type_error("dtype enum requires enum_values".to_string()))?;
            let labels = EnumLabels::from_named(
                named.iter().map(|(ordinal, label)| (*ordinal, label.clone())),
            )
            .map_err(|e| type_error(e.to_string()))?;
            Ok(AttrKind::Enum(labels))
        }
        DtypeDef::Bits => {
            let named = template
                .bit_labels
                .as_ref()
                .ok_or_else(|| type_error("dtype bits requires bit_labels".to_string()))?;
            let field = BitField::from_named(
                named.iter().map(|(bit, label)| (*bit, label.clone())),
            )
            .map_err(|e| type_error(e.to_string()))?;
            Ok(AttrKind::Bits(field))
        }
    }
}

fn parse_oid(oid: &str, attr: &str) -> Result<Vec<u32>> {
    oid.trim_start_matches('.')
        .split('.')
        .map(|segment| {
            segment.parse().map_err(|_| DefinitionError::InvalidOid {
                name: attr.to_string(),
                segment: segment.to_string(),
            })
        })
        .collect()
}

/// Replace each `{}` in `template` with the next value. The caller has
/// already checked that the counts match.
fn format_name(template: &str, values: &[u32]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut values = values.iter();
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        if let Some(value) = values.next() {
            out.push_str(&value.to_string());
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// All combinations of one value per dimension. A single empty product (no
/// dimensions) yields the template itself, unexpanded.
fn cartesian_product(dimensions: &[Vec<(u32, u32)>]) -> Vec<Vec<(u32, u32)>> {
    let mut product: Vec<Vec<(u32, u32)>> = vec![Vec::new()];
    for dimension in dimensions {
        product = product
            .into_iter()
            .flat_map(|prefix| {
                dimension.iter().map(move |value| {
                    let mut next = prefix.clone();
                    next.push(*value);
                    next
                })
            })
            .collect();
    }
    product
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_name() {
        assert_eq!(format_name("R{}", &[5]), "R5");
        assert_eq!(format_name("port{}line{}", &[2, 7]), "port2line7");
        assert_eq!(format_name("plain", &[]), "plain");
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("R5"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("5R"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_index_values_with_stride_and_start_index() {
        let spec = IndexSpec::Detailed {
            start: 101,
            end: 105,
            step: 2,
            start_index: Some(1),
        };
        assert_eq!(
            spec.values("x").unwrap(),
            [(1, 101), (2, 103), (3, 105)]
        );

        let spec = IndexSpec::Range([3, 5]);
        assert_eq!(spec.values("x").unwrap(), [(3, 3), (4, 4), (5, 5)]);
    }

    #[test]
    fn test_index_values_rejects_bad_ranges() {
        assert!(IndexSpec::Range([5, 3]).values("x").is_err());
        assert!(IndexSpec::Detailed {
            start: 1,
            end: 2,
            step: 0,
            start_index: None
        }
        .values("x")
        .is_err());
    }
}
