mod common;

use std::sync::Arc;

use common::*;
use oxm::cache::{MAPS_CACHE_KEY, class_cache_key};
use oxm::{
    ArrayCache, CacheStore, ClassDeclaration, ConfigurationError, FieldAccessor, FieldMapping,
    GeneratorType, IdGenerator, MappingError, MetadataEvent, MetadataRegistry, OxmError, Value,
    XmlMarshaller, xml_object,
};

#[test]
fn test_load_is_idempotent() {
    let registry = registry(media_declarations());
    let loaded = registry.load_metadata("Video").unwrap();
    assert_eq!(loaded, vec!["Media".to_string(), "Video".to_string()]);
    assert!(registry.load_metadata("Video").unwrap().is_empty());

    let first = registry.metadata_for("Video").unwrap();
    let second = registry.metadata_for("Video").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_concurrent_first_access_loads_once() {
    let registry = registry(media_declarations());
    let loaded: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| registry.metadata_for("Video").unwrap()))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });
    assert!(loaded.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn test_unknown_class() {
    let registry = registry(media_declarations());
    let err = registry.metadata_for("Podcast").unwrap_err();
    assert!(matches!(
        err,
        OxmError::Mapping(MappingError::MappingNotFoundForClass { ref class }) if class == "Podcast"
    ));
    assert!(!registry.is_mapped("Podcast"));
    assert!(registry.is_mapped("Video"));
}

#[test]
fn test_inherited_fields_are_marked() {
    let registry = registry(media_declarations());
    let video = registry.metadata_for("Video").unwrap();

    let src = video.field_mapping("src").unwrap();
    assert_eq!(src.inherited_from.as_deref(), Some("Media"));
    assert_eq!(src.declared_in.as_deref(), Some("Media"));

    let duration = video.field_mapping("duration").unwrap();
    assert_eq!(duration.inherited_from, None);
    assert_eq!(duration.declared_in.as_deref(), Some("Video"));

    let fields: Vec<_> = video.field_mappings().map(|f| f.field_name.as_str()).collect();
    assert_eq!(fields, vec!["src", "duration"]);
    assert_eq!(video.parent.as_deref(), Some("Media"));
    assert_eq!(video.parent_classes, vec!["Media".to_string()]);
    assert!(video.is_a("Media"));
    assert_eq!(video.default_namespace(), VIDEO_NS);
}

#[test]
fn test_lookup_tables() {
    let registry = registry(article_declarations());
    let maps = registry.all_maps().unwrap();

    assert_eq!(
        maps.element_map["article"].get(""),
        Some(&"Documents\\Article".to_string())
    );
    assert_eq!(
        maps.wrapper_entry("sections", "article"),
        Some(&Some("Documents\\Section".to_string()))
    );
    assert!(maps.is_known_element("section"));
    assert!(!maps.is_known_element("sections"));
}

#[test]
fn test_metadata_loaded_events() {
    let registry = registry(media_declarations());
    let mut events = registry.subscribe();
    registry.metadata_for("Video").unwrap();

    assert_eq!(
        events.try_recv().unwrap(),
        MetadataEvent::ClassLoaded {
            class: "Media".to_string(),
            xml_name: "media".to_string(),
            namespace: MEDIA_NS.to_string(),
        }
    );
    assert_eq!(
        events.try_recv().unwrap(),
        MetadataEvent::ClassLoaded {
            class: "Video".to_string(),
            xml_name: "media".to_string(),
            namespace: VIDEO_NS.to_string(),
        }
    );
    assert!(events.try_recv().is_err());
}

#[test]
fn test_snapshot_is_cached_and_restored() {
    let cache = Arc::new(ArrayCache::new());

    let first = MetadataRegistry::new(Arc::new(driver(media_declarations())))
        .with_cache(cache.clone());
    let maps = first.all_maps().unwrap();
    assert!(cache.contains(MAPS_CACHE_KEY));
    assert!(cache.contains(&class_cache_key("Video")));
    assert!(Arc::ptr_eq(&maps, &first.all_maps().unwrap()));

    let second = Arc::new(
        MetadataRegistry::new(Arc::new(driver(media_declarations()))).with_cache(cache.clone()),
    );
    let restored = second.all_maps().unwrap();
    assert_eq!(*restored, *maps);
    assert!(!second.has_metadata_for("Video"));

    let video = second.metadata_for("Video").unwrap();
    assert!(video.has_field("duration"));
    assert_eq!(video.field_mapping("src").unwrap().inherited_from.as_deref(), Some("Media"));

    let marshaller = XmlMarshaller::with_config(second, compact());
    let xml = format!(r#"<media xmlns="{}" src="x" duration="7"/>"#, VIDEO_NS);
    let decoded: Video = marshaller
        .unmarshal_from_str(&xml)
        .unwrap()
        .downcast_clone()
        .unwrap();
    assert_eq!(decoded.duration, Some(7));
}

#[derive(Debug, Default, Clone)]
struct Ticket {
    id: Option<String>,
}
xml_object!(Ticket, "Ticket");

#[derive(Debug, Default, Clone)]
struct Urgent {
    id: Option<String>,
}
xml_object!(Urgent, "Urgent");

fn ticket_declarations(kind: GeneratorType) -> Vec<ClassDeclaration> {
    vec![
        ClassDeclaration::of::<Ticket>("Ticket")
            .root()
            .id_generator(kind)
            .field(
                FieldMapping::new("id", "string").attribute().identifier(),
                FieldAccessor::new(
                    |t: &Ticket| t.id.clone().into(),
                    |t: &mut Ticket, v| {
                        t.id = v.extract()?;
                        Ok(())
                    },
                ),
            ),
        ClassDeclaration::of::<Urgent>("Urgent")
            .extends("Ticket")
            .accessor(
                "id",
                FieldAccessor::new(
                    |t: &Urgent| t.id.clone().into(),
                    |t: &mut Urgent, v| {
                        t.id = v.extract()?;
                        Ok(())
                    },
                ),
            ),
    ]
}

#[test]
fn test_uuid_identifier_is_generated_on_encode() {
    let registry = registry(ticket_declarations(GeneratorType::Uuid));
    let ticket = registry.metadata_for("Ticket").unwrap();
    assert_eq!(ticket.id_generator, IdGenerator::Uuid);
    assert_eq!(ticket.identifier.as_deref(), Some("id"));
    assert!(ticket.is_root);

    let urgent = registry.metadata_for("Urgent").unwrap();
    assert_eq!(urgent.id_generator, IdGenerator::Uuid);
    assert_eq!(urgent.identifier.as_deref(), Some("id"));

    let marshaller = XmlMarshaller::with_config(registry, compact());
    let value = Value::object(Urgent::default());
    let xml = marshaller.marshal_to_string(&value).unwrap();
    let generated: Urgent = value.downcast_clone().unwrap();
    let id = generated.id.unwrap();
    assert_eq!(id.len(), 36);
    assert_eq!(xml, format!(r#"<urgent id="{}"></urgent>"#, id));

    let assigned = Value::object(Ticket {
        id: Some("T-1".to_string()),
    });
    let xml = marshaller.marshal_to_string(&assigned).unwrap();
    assert_eq!(xml, r#"<ticket id="T-1"></ticket>"#);
}

#[test]
fn test_assigned_identifier_is_left_alone() {
    let registry = registry(ticket_declarations(GeneratorType::None));
    let marshaller = XmlMarshaller::with_config(registry, compact());
    let xml = marshaller
        .marshal_to_string(&Value::object(Ticket::default()))
        .unwrap();
    assert_eq!(xml, "<ticket></ticket>");
}

#[test]
fn test_increment_generator_is_unsupported() {
    let registry = registry(ticket_declarations(GeneratorType::Increment));
    let err = registry.metadata_for("Ticket").unwrap_err();
    assert!(matches!(
        err,
        OxmError::Configuration(ConfigurationError::UnsupportedIdGenerator { ref kind })
            if kind == "increment"
    ));
    assert!(!registry.has_metadata_for("Ticket"));
}

#[derive(Debug, Default, Clone)]
struct Stamped {
    created: Option<String>,
    title: Option<String>,
}
xml_object!(Stamped, "Stamped");

#[test]
fn test_mapped_superclass() {
    let registry = registry(vec![
        ClassDeclaration::new("Timestamped")
            .mapped_superclass()
            .mapping(FieldMapping::new("created", "datetime").attribute()),
        ClassDeclaration::of::<Stamped>("Stamped")
            .extends("Timestamped")
            .accessor(
                "created",
                FieldAccessor::new(
                    |s: &Stamped| s.created.clone().into(),
                    |s: &mut Stamped, v| {
                        s.created = v.extract()?;
                        Ok(())
                    },
                ),
            )
            .field(
                FieldMapping::new("title", "string").text(),
                FieldAccessor::new(
                    |s: &Stamped| s.title.clone().into(),
                    |s: &mut Stamped, v| {
                        s.title = v.extract()?;
                        Ok(())
                    },
                ),
            ),
    ]);

    let base = registry.metadata_for("Timestamped").unwrap();
    assert!(base.is_mapped_superclass);
    assert!(matches!(
        base.instantiate(),
        Err(MappingError::NotInstantiable { .. })
    ));

    let stamped = registry.metadata_for("Stamped").unwrap();
    let created = stamped.field_mapping("created").unwrap();
    assert_eq!(created.inherited_from, None);
    assert_eq!(created.declared_in.as_deref(), Some("Timestamped"));
    assert!(stamped.is_a("Timestamped"));

    let maps = registry.all_maps().unwrap();
    assert!(!maps.is_known_element("timestamped"));
    assert!(maps.is_known_element("stamped"));
}
