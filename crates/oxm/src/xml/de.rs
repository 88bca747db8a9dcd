//! Streaming XML decoder.
//!
//! A recursive-descent reader over [`XmlCursor`]: each element is matched to
//! a class through the registry's lookup tables, instantiated, and filled
//! field by field as its attributes and children stream past. Nothing is
//! buffered beyond the element being decoded.
//!
//! Child elements typed as a mapped class are dispatched polymorphically.
//! The first rule that yields a class wins:
//!
//! 1. a subclass whose discriminator matches the element's attributes;
//! 2. the subclass registered for the element's namespace, when that
//!    namespace differs from the declared type's own;
//! 3. a subclass whose short type name matches the element name;
//! 4. a class registered for the element name that extends the declared type;
//! 5. the declared type itself.

use std::io::BufRead;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use super::Diagnostic;
use super::cursor::{StartTag, Token, XmlCursor};
use crate::error::{FieldError, MappingError, OxmError, Result, StructuralError};
use crate::mapping::{
    AttributeSet, ClassMetadata, ELEMENT_NAME_KEY, FieldMapping, LifecycleEvent, NodeKind,
};
use crate::node::{NodeContent, XmlNode};
use crate::registry::{MetadataRegistry, RegistryMaps};
use crate::value::{ObjectRef, Value};

/// Decodes one document into a [`Value`].
pub struct Decoder<'r, R: BufRead> {
    registry: &'r MetadataRegistry,
    maps: Arc<RegistryMaps>,
    cursor: XmlCursor<R>,
    passthrough: bool,
    diagnostics: Vec<Diagnostic>,
}

/// Per-object decoding state.
#[derive(Default)]
struct Collected {
    lists: IndexMap<String, Vec<Value>>,
    text: String,
}

impl<'r, R: BufRead> Decoder<'r, R> {
    /// Creates a decoder; every class is loaded so the element tables are
    /// complete before the first token is read.
    pub fn new(registry: &'r MetadataRegistry, reader: R) -> Result<Self> {
        Ok(Self {
            registry,
            maps: registry.all_maps()?,
            cursor: XmlCursor::new(reader),
            passthrough: false,
            diagnostics: Vec::new(),
        })
    }

    /// Keeps unmapped content as [`XmlNode`]s instead of failing or skipping.
    pub fn with_passthrough(mut self, passthrough: bool) -> Self {
        self.passthrough = passthrough;
        self
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Moves the cursor one token forward.
    pub fn advance(&mut self) -> Result<&Token> {
        self.cursor.advance()
    }

    /// Decodes the root element of the document.
    pub fn decode_document(&mut self) -> Result<Value> {
        if let Token::Eof = self.cursor.advance_to_start()? {
            return Err(StructuralError::UnexpectedEof {
                context: "before the root element".to_string(),
            }
            .into());
        }
        self.decode_current()
    }

    /// Decodes the token under the cursor: an element becomes the object of
    /// the class registered for its name, a CDATA section its text.
    pub fn decode_current(&mut self) -> Result<Value> {
        let start = match self.cursor.current() {
            Token::Start(start) => start.clone(),
            Token::CData(text) => return Ok(Value::from(text.as_str())),
            _ => return Err(self.cursor.unexpected("start tag or CDATA section")),
        };

        match self.resolve_class(&start, None)? {
            Some(class) => {
                let metadata = self.registry.metadata_for(&class)?;
                self.decode_object(&metadata, &start, None)
            }
            None if self.passthrough => Ok(Value::Node(self.capture_node(&start, None)?)),
            None => Err(MappingError::NotMapped {
                element: start.qname.clone(),
            }
            .into()),
        }
    }

    /// Class registered for an element, by namespace, then discriminator,
    /// then registration order.
    fn resolve_class(&mut self, start: &StartTag, inherited_ns: Option<&str>) -> Result<Option<String>> {
        let Some(candidates) = self.maps.element_candidates(&start.local_name) else {
            return Ok(None);
        };
        if candidates.len() <= 1 {
            return Ok(candidates.values().next().cloned());
        }

        let namespace = start.namespace.as_deref().or(inherited_ns).unwrap_or("");
        if let Some(class) = candidates.get(namespace) {
            return Ok(Some(class.clone()));
        }

        let attributes = attribute_set(start);
        for class in candidates.values() {
            if self
                .registry
                .discriminator_matches(class, namespace, &attributes)?
            {
                return Ok(Some(class.clone()));
            }
        }

        let Some(chosen) = candidates.values().next().cloned() else {
            return Ok(None);
        };
        let names: Vec<String> = candidates.values().cloned().collect();
        warn!(
            element = %start.qname,
            namespace = %namespace,
            candidates = ?names,
            chosen = %chosen,
            "ambiguous element, using the first registered class"
        );
        self.diagnostics.push(Diagnostic::AmbiguousDispatch {
            element: start.qname.clone(),
            namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
            candidates: names,
            chosen: chosen.clone(),
        });
        Ok(Some(chosen))
    }

    /// Decodes the element under the cursor as an instance of `metadata`,
    /// leaving the cursor on its end tag.
    fn decode_object(
        &mut self,
        metadata: &Arc<ClassMetadata>,
        start: &StartTag,
        inherited_ns: Option<&str>,
    ) -> Result<Value> {
        trace!(class = %metadata.name, element = %start.qname, "decoding object");
        let object = metadata.instantiate()?;
        metadata.invoke_lifecycle_callbacks(LifecycleEvent::PreDecode, &mut *object.write());

        self.decode_attributes(metadata, &object, start)?;

        let namespace = start
            .namespace
            .clone()
            .or_else(|| inherited_ns.map(str::to_string));
        let mut collected = Collected::default();
        self.decode_children(
            metadata,
            &object,
            start,
            None,
            namespace.as_deref(),
            &mut collected,
        )?;

        {
            let mut guard = object.write();
            for (field_name, items) in collected.lists {
                metadata.set_field_value(&mut *guard, &field_name, Value::List(items))?;
            }
            if !collected.text.is_empty() {
                for field in metadata.value_fields() {
                    let value = self.convert_scalar(field, &collected.text)?;
                    metadata.set_field_value(&mut *guard, &field.field_name, value)?;
                }
            }
            for field in metadata
                .field_mappings()
                .filter(|f| f.required && f.node != NodeKind::Attribute)
            {
                if metadata
                    .get_field_value(&*guard, &field.field_name)?
                    .is_null()
                {
                    return Err(FieldError::Required {
                        class: metadata.name.clone(),
                        field: field.field_name.clone(),
                    }
                    .into());
                }
            }
            metadata.invoke_lifecycle_callbacks(LifecycleEvent::PostDecode, &mut *guard);
        }

        Ok(Value::Object(object))
    }

    fn decode_attributes(
        &self,
        metadata: &ClassMetadata,
        object: &ObjectRef,
        start: &StartTag,
    ) -> Result<()> {
        let mut guard = object.write();
        for field in metadata.attribute_fields() {
            let Some(raw) = start.attribute(&field.qualified_name()) else {
                if field.required {
                    return Err(FieldError::Required {
                        class: metadata.name.clone(),
                        field: field.field_name.clone(),
                    }
                    .into());
                }
                continue;
            };
            let value = if field.collection {
                Value::List(
                    raw.split_whitespace()
                        .map(|item| self.convert_scalar(field, item))
                        .collect::<Result<_>>()?,
                )
            } else {
                self.convert_scalar(field, raw)?
            };
            metadata.set_field_value(&mut *guard, &field.field_name, value)?;
        }
        Ok(())
    }

    /// Reads the content of the current element up to its end tag.
    ///
    /// With a wrapper, the current element is that wrapper: only fields
    /// declared inside it match, every value is accumulated into
    /// `collected.lists`, and text is ignored.
    fn decode_children(
        &mut self,
        metadata: &Arc<ClassMetadata>,
        object: &ObjectRef,
        owner: &StartTag,
        wrapper: Option<&str>,
        namespace: Option<&str>,
        collected: &mut Collected,
    ) -> Result<()> {
        loop {
            match self.cursor.advance()?.clone() {
                Token::End { .. } => return Ok(()),
                Token::Eof => {
                    return Err(StructuralError::UnexpectedEof {
                        context: format!("inside <{}>", owner.qname),
                    }
                    .into());
                }
                Token::Text(text) | Token::CData(text) => {
                    if wrapper.is_none() {
                        collected.text.push_str(&text);
                    }
                }
                Token::Start(child) => {
                    self.decode_child(metadata, object, &child, wrapper, namespace, collected)?
                }
            }
        }
    }

    fn decode_child(
        &mut self,
        metadata: &Arc<ClassMetadata>,
        object: &ObjectRef,
        child: &StartTag,
        wrapper: Option<&str>,
        namespace: Option<&str>,
        collected: &mut Collected,
    ) -> Result<()> {
        let child_ns = child
            .namespace
            .clone()
            .or_else(|| namespace.map(str::to_string));

        if wrapper.is_none() && self.is_wrapper_element(metadata, &child.local_name) {
            return self.decode_wrapper(metadata, object, child, child_ns.as_deref());
        }

        let (field, resolved) = match metadata.child_field(&child.local_name, wrapper) {
            Some(field) => (field.clone(), None),
            None => match self.subclass_field(metadata, child, wrapper, child_ns.as_deref())? {
                Some((field, class)) => (field, Some(class)),
                None => return self.unmatched_child(metadata, object, child, child_ns.as_deref()),
            },
        };

        let value = if self.registry.types().has_type(&field.type_name) {
            let raw = self.cursor.read_text()?;
            if raw.is_empty() {
                return Ok(());
            }
            self.convert_scalar(&field, &raw)?
        } else {
            if field.nullable
                && child.attributes.is_empty()
                && matches!(self.cursor.peek()?, Token::End { .. })
            {
                trace!(class = %metadata.name, field = %field.field_name, "empty element read as null");
                self.cursor.advance()?;
                return Ok(());
            }
            let class = match resolved {
                Some(class) => class,
                None => self.resolve_child_class(&field, child, child_ns.as_deref())?,
            };
            let child_metadata = self.registry.metadata_for(&class)?;
            self.decode_object(&child_metadata, child, child_ns.as_deref())?
        };

        if field.collection || wrapper.is_some() {
            collected
                .lists
                .entry(field.field_name.clone())
                .or_default()
                .push(value);
        } else {
            metadata.set_field_value(&mut *object.write(), &field.field_name, value)?;
        }
        Ok(())
    }

    fn is_wrapper_element(&self, metadata: &ClassMetadata, local_name: &str) -> bool {
        self.maps
            .wrapper_entry(local_name, &metadata.xml_name)
            .is_some()
            || metadata.is_wrapper(local_name)
    }

    /// Decodes a wrapper element; each field declared inside it receives the
    /// list of items found there as its whole value.
    fn decode_wrapper(
        &mut self,
        metadata: &Arc<ClassMetadata>,
        object: &ObjectRef,
        start: &StartTag,
        namespace: Option<&str>,
    ) -> Result<()> {
        debug!(class = %metadata.name, wrapper = %start.local_name, "decoding wrapped fields");
        let mut inner = Collected::default();
        self.decode_children(
            metadata,
            object,
            start,
            Some(start.local_name.as_str()),
            namespace,
            &mut inner,
        )?;

        let mut guard = object.write();
        for field in metadata.wrapped_fields(&start.local_name) {
            let items = inner.lists.shift_remove(&field.field_name).unwrap_or_default();
            let value = if field.collection {
                Value::List(items)
            } else {
                match items.into_iter().next() {
                    Some(item) => item,
                    None => continue,
                }
            };
            metadata.set_field_value(&mut *guard, &field.field_name, value)?;
        }
        Ok(())
    }

    /// Field accepting a child whose element name belongs to a subclass of
    /// the field's declared type.
    fn subclass_field(
        &mut self,
        metadata: &ClassMetadata,
        child: &StartTag,
        wrapper: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<Option<(FieldMapping, String)>> {
        if !self.maps.is_known_element(&child.local_name) {
            return Ok(None);
        }
        let Some(class) = self.resolve_class(child, namespace)? else {
            return Ok(None);
        };
        let child_metadata = self.registry.metadata_for(&class)?;
        let field = metadata
            .field_mappings()
            .filter(|f| f.is_child() && f.wrapper.as_deref() == wrapper)
            .find(|f| child_metadata.is_a(&f.type_name))
            .cloned();
        Ok(field.map(|field| (field, class)))
    }

    /// Concrete class for a child element of a field typed as a mapped class.
    fn resolve_child_class(
        &self,
        field: &FieldMapping,
        child: &StartTag,
        namespace: Option<&str>,
    ) -> Result<String> {
        let base = field.type_name.as_str();
        let namespace = namespace.unwrap_or("");

        let attributes = attribute_set(child);
        if let Some(class) =
            self.registry
                .alternative_class_for_attributes(base, namespace, &attributes, false)?
        {
            return Ok(class);
        }

        let base_metadata = self.registry.metadata_for(base)?;
        if namespace != base_metadata.default_namespace()
            && let Some(class) = self
                .registry
                .alternative_class_for_namespace(base, namespace, false)
        {
            return Ok(class);
        }

        if let Some(class) = self
            .registry
            .alternative_class_for_name(base, &child.local_name, false)
        {
            return Ok(class);
        }

        if let Some(candidates) = self.maps.element_map.get(&child.local_name) {
            for class in candidates.values() {
                if self.registry.metadata_for(class)?.is_a(base) {
                    return Ok(class.clone());
                }
            }
        }

        Ok(base.to_string())
    }

    fn unmatched_child(
        &mut self,
        metadata: &ClassMetadata,
        object: &ObjectRef,
        child: &StartTag,
        namespace: Option<&str>,
    ) -> Result<()> {
        if !self.passthrough {
            trace!(class = %metadata.name, element = %child.qname, "skipping unmapped element");
            return self.cursor.skip_element();
        }

        let node = self.capture_node(child, namespace)?;
        let mut guard = object.write();
        match guard.dynamic_properties_mut() {
            Some(properties) => {
                properties.push(node.local_name().to_string(), Value::Node(node));
            }
            None => {
                trace!(
                    class = %metadata.name,
                    element = %child.qname,
                    "class keeps no dynamic properties, dropping element"
                );
            }
        }
        Ok(())
    }

    /// Captures the element under the cursor verbatim. Nested elements that
    /// map to a class are decoded as objects.
    fn capture_node(&mut self, start: &StartTag, namespace: Option<&str>) -> Result<XmlNode> {
        let mut node = XmlNode {
            name: start.qname.clone(),
            namespace: start.namespace.clone(),
            attributes: start
                .attributes
                .iter()
                .map(|a| (a.qname.clone(), a.value.clone()))
                .collect(),
            children: Vec::new(),
        };
        let namespace = start
            .namespace
            .clone()
            .or_else(|| namespace.map(str::to_string));

        loop {
            match self.cursor.advance()?.clone() {
                Token::End { .. } => return Ok(node),
                Token::Eof => {
                    return Err(StructuralError::UnexpectedEof {
                        context: format!("inside <{}>", start.qname),
                    }
                    .into());
                }
                Token::Text(text) | Token::CData(text) => node.push(NodeContent::Text(text)),
                Token::Start(child) => match self.resolve_class(&child, namespace.as_deref())? {
                    Some(class) => {
                        let metadata = self.registry.metadata_for(&class)?;
                        if let Value::Object(object) =
                            self.decode_object(&metadata, &child, namespace.as_deref())?
                        {
                            node.push(NodeContent::Object(object));
                        }
                    }
                    None => {
                        let captured = self.capture_node(&child, namespace.as_deref())?;
                        node.push(NodeContent::Node(captured));
                    }
                },
            }
        }
    }

    fn convert_scalar(&self, field: &FieldMapping, raw: &str) -> Result<Value> {
        let codec = self.registry.types().get(&field.type_name)?;
        codec
            .convert_to_stored_value(raw)
            .map(Value::Scalar)
            .map_err(OxmError::from)
    }
}

/// Attributes of a start tag keyed by qualified name, plus the element's
/// local name under [`ELEMENT_NAME_KEY`].
fn attribute_set(start: &StartTag) -> AttributeSet {
    let mut attributes: AttributeSet = start
        .attributes
        .iter()
        .map(|a| (a.qname.clone(), a.value.clone()))
        .collect();
    attributes.insert(ELEMENT_NAME_KEY.to_string(), start.local_name.clone());
    attributes
}

/// Decodes a document from a string.
pub fn from_xml_str(registry: &MetadataRegistry, xml: &str) -> Result<Value> {
    from_xml_reader(registry, xml.as_bytes())
}

/// Decodes a document from bytes.
pub fn from_xml_slice(registry: &MetadataRegistry, bytes: &[u8]) -> Result<Value> {
    from_xml_reader(registry, bytes)
}

/// Decodes a document from a buffered reader.
pub fn from_xml_reader<R: BufRead>(registry: &MetadataRegistry, reader: R) -> Result<Value> {
    Decoder::new(registry, reader)?.decode_document()
}
