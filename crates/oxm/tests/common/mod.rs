//! Shared fixtures for the integration tests.
//!
//! - `Article`/`Section`: attribute, body text, wrapped collection and
//!   passthrough bag
//! - `Gallery`/`Media`/`Video`: namespace-based polymorphism
//! - `Garage`/`Vehicle`/`Car`: attribute discriminators
//! - `Link`: nullable self reference for the cycle guard

#![allow(dead_code)]

use std::sync::Arc;

use oxm::{
    ClassDeclaration, DeclarativeDriver, Discriminator, DynamicProperties, FieldAccessor,
    FieldMapping, MarshallerConfig, MetadataRegistry, ObjectRef, Value, XmlMarshaller,
    xml_object,
};

pub const MEDIA_NS: &str = "urn:example:media";
pub const VIDEO_NS: &str = "urn:example:video";

#[derive(Debug, Default, Clone)]
pub struct Article {
    pub id: Option<String>,
    pub name: Option<String>,
    pub sections: Vec<Section>,
    pub extra: DynamicProperties,
}
xml_object!(Article, "Documents\\Article", dynamic = extra);

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Section {
    pub heading: Option<String>,
    pub content: Option<String>,
}
xml_object!(Section, "Documents\\Section");

impl Section {
    pub fn new(heading: &str, content: &str) -> Self {
        Self {
            heading: Some(heading.to_string()),
            content: Some(content.to_string()),
        }
    }
}

pub fn article_declarations() -> Vec<ClassDeclaration> {
    let article = ClassDeclaration::of::<Article>("Documents\\Article")
        .field(
            FieldMapping::new("id", "string").attribute().required(),
            FieldAccessor::new(
                |a: &Article| a.id.clone().into(),
                |a: &mut Article, v| {
                    a.id = v.extract()?;
                    Ok(())
                },
            ),
        )
        .field(
            FieldMapping::new("name", "string").value(),
            FieldAccessor::new(
                |a: &Article| a.name.clone().into(),
                |a: &mut Article, v| {
                    a.name = v.extract()?;
                    Ok(())
                },
            ),
        )
        .field(
            FieldMapping::new("sections", "Documents\\Section")
                .xml_name("section")
                .collection()
                .wrapper("sections"),
            FieldAccessor::new(
                |a: &Article| {
                    Value::List(a.sections.iter().cloned().map(Value::object).collect())
                },
                |a: &mut Article, v| {
                    a.sections = v.into_cloned_list()?;
                    Ok(())
                },
            ),
        );

    let section = ClassDeclaration::of::<Section>("Documents\\Section")
        .field(
            FieldMapping::new("heading", "string").text().required(),
            FieldAccessor::new(
                |s: &Section| s.heading.clone().into(),
                |s: &mut Section, v| {
                    s.heading = v.extract()?;
                    Ok(())
                },
            ),
        )
        .field(
            FieldMapping::new("content", "string").text().nullable(),
            FieldAccessor::new(
                |s: &Section| s.content.clone().into(),
                |s: &mut Section, v| {
                    s.content = v.extract()?;
                    Ok(())
                },
            ),
        );

    vec![article, section]
}

#[derive(Debug, Default, Clone)]
pub struct Gallery {
    pub title: Option<String>,
    pub items: Vec<ObjectRef>,
}
xml_object!(Gallery, "Gallery");

#[derive(Debug, Default, Clone)]
pub struct Media {
    pub src: Option<String>,
}
xml_object!(Media, "Media");

#[derive(Debug, Default, Clone)]
pub struct Video {
    pub src: Option<String>,
    pub duration: Option<i64>,
}
xml_object!(Video, "Video");

pub fn media_declarations() -> Vec<ClassDeclaration> {
    let gallery = ClassDeclaration::of::<Gallery>("Gallery")
        .namespace(MEDIA_NS, None)
        .field(
            FieldMapping::new("title", "string").attribute(),
            FieldAccessor::new(
                |g: &Gallery| g.title.clone().into(),
                |g: &mut Gallery, v| {
                    g.title = v.extract()?;
                    Ok(())
                },
            ),
        )
        .field(
            FieldMapping::new("items", "Media")
                .xml_name("media")
                .collection(),
            FieldAccessor::new(
                |g: &Gallery| g.items.clone().into(),
                |g: &mut Gallery, v| {
                    g.items = v.extract()?;
                    Ok(())
                },
            ),
        );

    let media = ClassDeclaration::of::<Media>("Media")
        .namespace(MEDIA_NS, None)
        .field(
            FieldMapping::new("src", "string").attribute(),
            FieldAccessor::new(
                |m: &Media| m.src.clone().into(),
                |m: &mut Media, v| {
                    m.src = v.extract()?;
                    Ok(())
                },
            ),
        );

    let video = ClassDeclaration::of::<Video>("Video")
        .extends("Media")
        .xml_name("media")
        .namespace(VIDEO_NS, None)
        .accessor(
            "src",
            FieldAccessor::new(
                |m: &Video| m.src.clone().into(),
                |m: &mut Video, v| {
                    m.src = v.extract()?;
                    Ok(())
                },
            ),
        )
        .field(
            FieldMapping::new("duration", "integer").attribute(),
            FieldAccessor::new(
                |m: &Video| m.duration.into(),
                |m: &mut Video, v| {
                    m.duration = v.extract()?;
                    Ok(())
                },
            ),
        );

    vec![gallery, media, video]
}

#[derive(Debug, Default, Clone)]
pub struct Garage {
    pub vehicles: Vec<ObjectRef>,
}
xml_object!(Garage, "Garage");

#[derive(Debug, Default, Clone)]
pub struct Vehicle {
    pub kind: Option<String>,
}
xml_object!(Vehicle, "Vehicle");

#[derive(Debug, Default, Clone)]
pub struct Car {
    pub kind: Option<String>,
    pub wheels: Option<i64>,
}
xml_object!(Car, "Car");

pub fn vehicle_declarations() -> Vec<ClassDeclaration> {
    let garage = ClassDeclaration::of::<Garage>("Garage").field(
        FieldMapping::new("vehicles", "Vehicle")
            .xml_name("vehicle")
            .collection(),
        FieldAccessor::new(
            |g: &Garage| g.vehicles.clone().into(),
            |g: &mut Garage, v| {
                g.vehicles = v.extract()?;
                Ok(())
            },
        ),
    );

    let vehicle = ClassDeclaration::of::<Vehicle>("Vehicle").field(
        FieldMapping::new("kind", "string").attribute(),
        FieldAccessor::new(
            |m: &Vehicle| m.kind.clone().into(),
            |m: &mut Vehicle, v| {
                m.kind = v.extract()?;
                Ok(())
            },
        ),
    );

    let car = ClassDeclaration::of::<Car>("Car")
        .extends("Vehicle")
        .discriminator(Discriminator::new().attribute_equals("kind", "car"))
        .accessor(
            "kind",
            FieldAccessor::new(
                |c: &Car| c.kind.clone().into(),
                |c: &mut Car, v| {
                    c.kind = v.extract()?;
                    Ok(())
                },
            ),
        )
        .field(
            FieldMapping::new("wheels", "integer").attribute(),
            FieldAccessor::new(
                |c: &Car| c.wheels.into(),
                |c: &mut Car, v| {
                    c.wheels = v.extract()?;
                    Ok(())
                },
            ),
        );

    vec![garage, vehicle, car]
}

#[derive(Debug, Default, Clone)]
pub struct Link {
    pub label: Option<String>,
    pub next: Option<ObjectRef>,
}
xml_object!(Link, "Link");

pub fn link_declarations() -> Vec<ClassDeclaration> {
    vec![
        ClassDeclaration::of::<Link>("Link")
            .field(
                FieldMapping::new("label", "string").attribute(),
                FieldAccessor::new(
                    |l: &Link| l.label.clone().into(),
                    |l: &mut Link, v| {
                        l.label = v.extract()?;
                        Ok(())
                    },
                ),
            )
            .field(
                FieldMapping::new("next", "Link").force_name().nullable(),
                FieldAccessor::new(
                    |l: &Link| l.next.clone().into(),
                    |l: &mut Link, v| {
                        l.next = v.extract()?;
                        Ok(())
                    },
                ),
            ),
    ]
}

pub fn driver(declarations: Vec<ClassDeclaration>) -> DeclarativeDriver {
    let mut driver = DeclarativeDriver::new();
    for declaration in declarations {
        driver.add_class(declaration);
    }
    driver
}

pub fn registry(declarations: Vec<ClassDeclaration>) -> Arc<MetadataRegistry> {
    Arc::new(MetadataRegistry::new(Arc::new(driver(declarations))))
}

/// Compact output: no declaration, no indentation.
pub fn compact() -> MarshallerConfig {
    MarshallerConfig {
        indent: 0,
        xml_declaration: false,
        ..Default::default()
    }
}

pub fn marshaller(declarations: Vec<ClassDeclaration>) -> XmlMarshaller {
    XmlMarshaller::with_config(registry(declarations), compact())
}

pub fn sample_article() -> Article {
    Article {
        id: Some("A1".to_string()),
        name: Some("Foo".to_string()),
        sections: vec![
            Section::new("Part 1", "First part"),
            Section::new("Part 2", "Second part"),
        ],
        extra: DynamicProperties::default(),
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
