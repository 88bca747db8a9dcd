//! XML encoder.
//!
//! Walks an object graph depth-first and writes quick-xml events as it goes.
//! Field values are read through the accessors bound in [`ClassMetadata`];
//! each object's lock is released before its children are visited.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use indexmap::IndexMap;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::trace;

use super::utils::{short_name, xmlize};
use crate::error::{FieldError, MappingError, Result, StructuralError};
use crate::mapping::{ClassMetadata, FieldMapping, LifecycleEvent, NodeKind, XmlNamespace};
use crate::node::{NodeContent, XmlNode};
use crate::registry::MetadataRegistry;
use crate::value::{ObjectRef, Value, XmlObject, object_id};

/// Writes values as XML.
pub struct Encoder<'r, W: Write> {
    writer: Writer<W>,
    registry: &'r MetadataRegistry,
    passthrough: bool,
    visited: HashSet<usize>,
    scopes: Vec<IndexMap<String, String>>,
}

impl<'r, W: Write> Encoder<'r, W> {
    /// Creates an encoder; `indent` is the width in spaces, 0 for none.
    pub fn new(registry: &'r MetadataRegistry, writer: W, indent: usize) -> Self {
        let writer = if indent > 0 {
            Writer::new_with_indent(writer, b' ', indent)
        } else {
            Writer::new(writer)
        };
        Self {
            writer,
            registry,
            passthrough: false,
            visited: HashSet::new(),
            scopes: Vec::new(),
        }
    }

    /// Emits objects of unmapped classes and dynamic properties instead of
    /// failing or dropping them.
    pub fn with_passthrough(mut self, passthrough: bool) -> Self {
        self.passthrough = passthrough;
        self
    }

    pub fn write_declaration(&mut self, version: &str, encoding: &str) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new(version, Some(encoding), None)))?;
        Ok(())
    }

    /// Encodes a value at the current position.
    pub fn encode(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => Ok(()),
            Value::Scalar(scalar) => self.write_text(&scalar.to_string()),
            Value::Object(object) => self.encode_object(object, None),
            Value::List(items) => {
                for item in items {
                    self.encode(item)?;
                }
                Ok(())
            }
            Value::Node(node) => self.write_node(node),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn encode_object(&mut self, object: &ObjectRef, field: Option<&FieldMapping>) -> Result<()> {
        if !self.visited.insert(object_id(object)) {
            trace!("object already written, skipping repeated reference");
            return Ok(());
        }

        let class = object.read().class_name().to_string();
        if !self.registry.is_mapped(&class) {
            if self.passthrough {
                return self.encode_unmapped(object, &class);
            }
            return Err(MappingError::MappingNotFoundForClass { class }.into());
        }
        let metadata = self.registry.metadata_for(&class)?;

        let (values, dynamic) = {
            let mut guard = object.write();
            metadata.invoke_lifecycle_callbacks(LifecycleEvent::PreEncode, &mut *guard);
            metadata.ensure_identifier(&mut *guard)?;
            let values = metadata
                .field_mappings()
                .map(|f| metadata.get_field_value(&*guard, &f.field_name))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let dynamic = if self.passthrough {
                dynamic_entries(&*guard)
            } else {
                Vec::new()
            };
            (values, dynamic)
        };

        let name = match field {
            Some(field) if field.force_name && !field.is_wildcard() => field.xml_name.clone(),
            _ => metadata.xml_name.clone(),
        };

        let mut start = BytesStart::new(name.as_str());
        let bindings = self.open_scope(&metadata.namespaces);
        for (attribute, url) in &bindings {
            start.push_attribute((attribute.as_str(), url.as_str()));
        }
        for (field, value) in metadata.field_mappings().zip(&values) {
            if field.node != NodeKind::Attribute {
                continue;
            }
            let text = match value {
                Value::Null => {
                    required_check(&metadata, field)?;
                    if !field.nullable {
                        continue;
                    }
                    String::new()
                }
                value => self.wire_text(&metadata, field, value)?,
            };
            start.push_attribute((field.qualified_name().as_str(), text.as_str()));
        }
        self.writer.write_event(Event::Start(start))?;

        for (field, value) in metadata.field_mappings().zip(&values) {
            match field.node {
                NodeKind::Attribute => {}
                NodeKind::Value => {
                    if value.is_null() {
                        required_check(&metadata, field)?;
                    } else {
                        let text = self.wire_text(&metadata, field, value)?;
                        self.write_text(&text)?;
                    }
                }
                NodeKind::Text | NodeKind::Element => self.encode_field(&metadata, field, value)?,
            }
        }

        for (key, items) in &dynamic {
            if metadata.has_field(key) {
                continue;
            }
            for item in items {
                self.write_dynamic(key, item)?;
            }
        }

        metadata.invoke_lifecycle_callbacks(LifecycleEvent::PostEncode, &mut *object.write());
        self.writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
        self.scopes.pop();
        Ok(())
    }

    fn encode_field(
        &mut self,
        metadata: &Arc<ClassMetadata>,
        field: &FieldMapping,
        value: &Value,
    ) -> Result<()> {
        if field.node == NodeKind::Element
            && !self.passthrough
            && self.registry.types().has_type(&field.type_name)
        {
            if value.is_null() {
                required_check(metadata, field)?;
            }
            trace!(class = %metadata.name, field = %field.field_name, "skipping scalar element field");
            return Ok(());
        }

        if value.is_null() {
            required_check(metadata, field)?;
            if field.nullable {
                let name = child_name(field);
                self.write_text_element(&name, "")?;
            }
            return Ok(());
        }

        if let Some(wrapper) = &field.wrapper {
            self.writer
                .write_event(Event::Start(BytesStart::new(wrapper.as_str())))?;
        }
        for item in value.clone().into_items() {
            match &item {
                Value::Null => {}
                Value::Object(object) => self.encode_object(object, Some(field))?,
                Value::Node(node) => self.write_node(node)?,
                Value::Scalar(_) | Value::List(_) => {
                    let text = self.wire_text(metadata, field, &item)?;
                    self.write_text_element(&child_name(field), &text)?;
                }
            }
        }
        if let Some(wrapper) = &field.wrapper {
            self.writer
                .write_event(Event::End(BytesEnd::new(wrapper.as_str())))?;
        }
        Ok(())
    }

    /// Writes an object whose class has no mapping from its dynamic
    /// properties alone.
    fn encode_unmapped(&mut self, object: &ObjectRef, class: &str) -> Result<()> {
        let name = xmlize(short_name(class));
        trace!(class = %class, element = %name, "writing unmapped object");
        let dynamic = dynamic_entries(&*object.read());
        self.writer
            .write_event(Event::Start(BytesStart::new(name.as_str())))?;
        for (key, items) in &dynamic {
            for item in items {
                self.write_dynamic(key, item)?;
            }
        }
        self.writer
            .write_event(Event::End(BytesEnd::new(name.as_str())))?;
        Ok(())
    }

    fn write_dynamic(&mut self, name: &str, value: &Value) -> Result<()> {
        match value {
            Value::Null => Ok(()),
            Value::Scalar(scalar) => self.write_text_element(name, &scalar.to_string()),
            Value::Object(object) => self.encode_object(object, None),
            Value::Node(node) => self.write_node(node),
            Value::List(items) => {
                for item in items {
                    self.write_dynamic(name, item)?;
                }
                Ok(())
            }
        }
    }

    fn write_node(&mut self, node: &XmlNode) -> Result<()> {
        let mut start = BytesStart::new(node.name.as_str());
        for (name, value) in &node.attributes {
            start.push_attribute((name.as_str(), value.as_str()));
        }
        self.writer.write_event(Event::Start(start))?;
        for child in &node.children {
            match child {
                NodeContent::Text(text) => self.write_text(text)?,
                NodeContent::Node(node) => self.write_node(node)?,
                NodeContent::Object(object) => self.encode_object(object, None)?,
            }
        }
        self.writer
            .write_event(Event::End(BytesEnd::new(node.name.as_str())))?;
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    fn write_text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.writer.write_event(Event::Start(BytesStart::new(name)))?;
        if !text.is_empty() {
            self.write_text(text)?;
        }
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// Wire form of a scalar or a list of scalars, joined with single spaces.
    fn wire_text(
        &self,
        metadata: &ClassMetadata,
        field: &FieldMapping,
        value: &Value,
    ) -> Result<String> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Scalar(scalar) => {
                let codec = self.registry.types().get(&field.type_name)?;
                Ok(codec.convert_to_wire_value(scalar)?)
            }
            Value::List(items) => {
                let parts = items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(|item| self.wire_text(metadata, field, item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(parts.join(" "))
            }
            other => Err(MappingError::InvalidFieldValue {
                class: metadata.name.clone(),
                field: field.field_name.clone(),
                message: format!("expected a scalar, found {}", other.kind()),
            }
            .into()),
        }
    }

    /// Pushes a namespace scope and returns the bindings not already in
    /// effect from an enclosing element.
    fn open_scope(&mut self, namespaces: &[XmlNamespace]) -> IndexMap<String, String> {
        let mut declared: IndexMap<String, String> = IndexMap::new();
        for namespace in namespaces {
            declared.insert(namespace.attribute_name(), namespace.url.clone());
        }
        declared.retain(|attribute, url| {
            self.scopes
                .iter()
                .rev()
                .find_map(|scope| scope.get(attribute))
                .is_none_or(|bound| bound != url)
        });
        self.scopes.push(declared.clone());
        declared
    }
}

fn required_check(metadata: &ClassMetadata, field: &FieldMapping) -> Result<()> {
    if field.required {
        return Err(FieldError::Required {
            class: metadata.name.clone(),
            field: field.field_name.clone(),
        }
        .into());
    }
    Ok(())
}

fn child_name(field: &FieldMapping) -> String {
    if field.is_wildcard() {
        xmlize(&field.field_name)
    } else {
        field.qualified_name()
    }
}

fn dynamic_entries(object: &dyn XmlObject) -> Vec<(String, Vec<Value>)> {
    object
        .dynamic_properties()
        .map(|properties| {
            properties
                .iter()
                .map(|(key, values)| (key.to_string(), values.to_vec()))
                .collect()
        })
        .unwrap_or_default()
}

/// Encodes a value to a string without declaration or indentation.
pub fn to_xml_string(registry: &MetadataRegistry, value: &Value) -> Result<String> {
    let buffer = to_xml_vec(registry, value)?;
    String::from_utf8(buffer).map_err(|e| StructuralError::malformed(e).into())
}

/// Encodes a value to bytes without declaration or indentation.
pub fn to_xml_vec(registry: &MetadataRegistry, value: &Value) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    to_xml_writer(registry, value, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a value into a writer without declaration or indentation.
pub fn to_xml_writer<W: Write>(registry: &MetadataRegistry, value: &Value, writer: W) -> Result<()> {
    let mut encoder = Encoder::new(registry, writer, 0);
    encoder.encode(value)
}
