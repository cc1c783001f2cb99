//! End-to-end marshal/unmarshal behavior over the public surface.

use chrono::NaiveDate;

use xmlbind::{
    BindingContext, DataObject, FieldMapping, RootEnvelope, SaxEvent, SchemaType, TypeDescriptor,
    Value,
};
use xmlbind::sax::EventCollector;

fn fragment_string(context: &BindingContext, source: impl Into<xmlbind::MarshalSource>) -> String {
    let mut marshaller = context.create_marshaller();
    marshaller.set_fragment(true).set_formatted_output(false);
    marshaller.marshal_to_string(source).unwrap()
}

#[test]
fn test_customer_fragment_matches_expected_markup() {
    let mut context = BindingContext::new();
    let mut descriptor = TypeDescriptor::new("Customer");
    descriptor.set_default_root_element("customer");
    descriptor.add_field("name", "name/text()").unwrap();
    context.register_descriptor(descriptor).unwrap();

    let object = DataObject::new("Customer").with("name", "Ada");
    assert_eq!(
        fragment_string(&context, object),
        "<customer><name>Ada</name></customer>"
    );
}

#[test]
fn test_typed_fields_round_trip() {
    let mut context = BindingContext::new();
    let mut descriptor = TypeDescriptor::new("Customer");
    descriptor.set_default_root_element("customer");
    descriptor
        .add_field("id", "@id")
        .unwrap()
        .set_schema_type(SchemaType::int());
    descriptor.add_field("name", "name/text()").unwrap();
    descriptor
        .add_field("active", "active/text()")
        .unwrap()
        .set_schema_type(SchemaType::boolean());
    descriptor
        .add_field("since", "since/text()")
        .unwrap()
        .set_schema_type(SchemaType::date());
    descriptor
        .add_field("emails", "email/text()")
        .unwrap()
        .set_container(true);
    descriptor.add_field("street", "address/street/text()").unwrap();
    descriptor.add_field("city", "address/city/text()").unwrap();
    context.register_descriptor(descriptor).unwrap();

    let original = DataObject::new("Customer")
        .with("id", Value::Integer(42))
        .with("name", "Ada Lovelace")
        .with("active", true)
        .with(
            "since",
            Value::Date(NaiveDate::from_ymd_opt(2015, 3, 9).unwrap()),
        )
        .with(
            "emails",
            vec![Value::Text("ada@x".into()), Value::Text("ada@y".into())],
        )
        .with("street", "12 Main")
        .with("city", "Toronto");

    let text = fragment_string(&context, original.clone());
    let result = context.create_unmarshaller().unmarshal_from_str(&text).unwrap();
    assert_eq!(result.into_object().unwrap(), original);
}

#[test]
fn test_union_field_first_matching_type_wins() {
    let mut context = BindingContext::new();
    let mut descriptor = TypeDescriptor::new("Event");
    descriptor.set_default_root_element("event");
    descriptor.add_mapping(
        FieldMapping::union(
            "when",
            "when/text()",
            vec![SchemaType::date(), SchemaType::int()],
        )
        .unwrap(),
    );
    context.register_descriptor(descriptor).unwrap();

    // Not a date, so the int attempt supplies the lexical form
    let object = DataObject::new("Event").with("when", Value::Integer(30));
    assert_eq!(
        fragment_string(&context, object),
        "<event><when>30</when></event>"
    );

    // Reading prefers the date interpretation when it parses
    let result = context
        .create_unmarshaller()
        .unmarshal_from_str("<event><when>2020-06-01</when></event>")
        .unwrap();
    assert_eq!(
        result.into_object().unwrap().get("when"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()))
    );
}

#[test]
fn test_union_failure_surfaces_last_attempt() {
    let mut context = BindingContext::new();
    let mut descriptor = TypeDescriptor::new("Event");
    descriptor.set_default_root_element("event");
    descriptor.add_mapping(
        FieldMapping::union(
            "when",
            "when/text()",
            vec![SchemaType::date(), SchemaType::int()],
        )
        .unwrap(),
    );
    context.register_descriptor(descriptor).unwrap();

    let object = DataObject::new("Event").with("when", Value::Bytes(vec![0xFF]));
    let mut marshaller = context.create_marshaller();
    let err = marshaller.marshal_to_string(object).unwrap_err();
    assert_eq!(err.code(), 25005);
    assert!(err.to_string().contains("int"), "{err}");
    assert!(!err.to_string().contains("date"), "{err}");
}

#[test]
fn test_matching_root_identity_is_not_wrapped() {
    let mut context = BindingContext::new();
    let mut resolver = xmlbind::NamespaceResolver::new();
    resolver.put("p", "http://x");
    let mut descriptor = TypeDescriptor::new("Person");
    descriptor.set_namespace_resolver(resolver);
    descriptor.set_default_root_element("p:Person");
    descriptor.add_field("name", "name/text()").unwrap();
    context.register_descriptor(descriptor).unwrap();

    let descriptor = context.descriptor_for_class("Person").unwrap();
    assert!(!descriptor.should_wrap_object(Some("http://x"), "Person"));
    assert!(descriptor.should_wrap_object(Some("http://x"), "Employee"));
    assert!(descriptor.should_wrap_object(Some("http://y"), "Person"));

    let object = DataObject::new("Person").with("name", "Ada");
    assert_eq!(
        fragment_string(&context, object),
        "<p:Person xmlns:p=\"http://x\"><name>Ada</name></p:Person>"
    );
}

#[test]
fn test_envelope_renames_and_renamespaces_root() {
    let mut context = BindingContext::new();
    let mut descriptor = TypeDescriptor::new("Person");
    descriptor.set_default_root_element("Person");
    descriptor.add_field("name", "name/text()").unwrap();
    context.register_descriptor(descriptor).unwrap();

    let mut envelope = RootEnvelope::new(
        "Employee",
        DataObject::new("Person").with("name", "Grace"),
    );
    envelope.set_namespace_uri("http://y");
    let out = fragment_string(&context, envelope);
    assert!(out.starts_with("<ns0:Employee"), "{out}");
    assert!(out.contains("xmlns:ns0=\"http://y\""), "{out}");
    assert!(out.contains("<name>Grace</name>"), "{out}");
}

#[test]
fn test_inheritance_full_cycle_keeps_concrete_class() {
    let mut context = BindingContext::new();
    let mut parent = TypeDescriptor::new("Person");
    parent.set_default_root_element("person");
    parent.add_field("name", "name/text()").unwrap();
    context.register_descriptor(parent).unwrap();

    let mut child = TypeDescriptor::new("Employee");
    child.set_inheritance_parent("Person");
    child.set_schema_type_reference(SchemaType::new(xmlbind::QualifiedName::new(
        Some("http://hr"),
        "employee-type",
    )));
    child.add_field("name", "name/text()").unwrap();
    child.add_field("badge", "badge/text()").unwrap();
    context.register_descriptor(child).unwrap();

    let original = DataObject::new("Employee")
        .with("name", "Grace")
        .with("badge", "E-100");
    let text = fragment_string(&context, original.clone());
    assert!(text.starts_with("<person "), "{text}");
    assert!(text.contains("xsi:type=\"ns0:employee-type\""), "{text}");

    let result = context.create_unmarshaller().unmarshal_from_str(&text).unwrap();
    let object = result.into_object().unwrap();
    assert_eq!(object.class_name(), "Employee");
    assert_eq!(object, original);
}

#[test]
fn test_unclaimed_root_envelope_round_trip() {
    let context = BindingContext::new();
    let result = context
        .create_unmarshaller()
        .unmarshal_from_str("<count>5</count>")
        .unwrap();
    let envelope = result.into_envelope().unwrap();
    assert_eq!(envelope.local_name(), "count");
    assert_eq!(envelope.payload(), &Value::Integer(5));

    assert_eq!(fragment_string(&context, envelope), "<count>5</count>");
}

#[test]
fn test_preserved_attribute_survives_between_marshals() {
    let mut context = BindingContext::new();
    let mut descriptor = TypeDescriptor::new("Customer");
    descriptor.set_default_root_element("customer");
    descriptor.add_field("name", "name/text()").unwrap();
    descriptor.set_preserve_document(true);
    context.register_descriptor(descriptor).unwrap();

    let result = context
        .create_unmarshaller()
        .unmarshal_from_str("<customer><note>keep me</note><name>Old</name></customer>")
        .unwrap();
    let mut object = result.into_object().unwrap();
    object.set("name", "First");

    let mut marshaller = context.create_marshaller();
    marshaller.set_fragment(true);
    let first = marshaller.marshal_to_string(&object).unwrap();
    assert_eq!(
        first,
        "<customer><note>keep me</note><name>First</name></customer>"
    );

    // Someone else annotates the retained tree between the two calls
    let retained = context.preservation().lookup(object.instance_key()).unwrap();
    let mut doc = retained.document.clone();
    let root = retained.node;
    doc.set_attribute(root, None, "audited", None, "true");
    context.preservation().retain(object.instance_key(), doc, root);

    object.set("name", "Second");
    let second = marshaller.marshal_to_string(&object).unwrap();
    assert_eq!(
        second,
        "<customer audited=\"true\"><note>keep me</note><name>Second</name></customer>"
    );
}

#[test]
fn test_fragment_mode_suppresses_document_events() {
    let mut context = BindingContext::new();
    let mut descriptor = TypeDescriptor::new("Customer");
    descriptor.set_default_root_element("customer");
    descriptor.add_field("name", "name/text()").unwrap();
    context.register_descriptor(descriptor).unwrap();

    let object = DataObject::new("Customer").with("name", "Ada");
    let mut collector = EventCollector::new();
    let mut marshaller = context.create_marshaller();
    marshaller.set_fragment(true);
    marshaller.marshal_to_handler(object, &mut collector).unwrap();

    let events = collector.events();
    assert!(!events.contains(&SaxEvent::StartDocument));
    assert!(!events.contains(&SaxEvent::EndDocument));
    assert!(matches!(
        &events[0],
        SaxEvent::StartElement { local_name, .. } if local_name == "customer"
    ));
}

#[test]
fn test_validator_agrees_with_marshaller() {
    let mut context = BindingContext::new();
    let mut descriptor = TypeDescriptor::new("Customer");
    descriptor.set_default_root_element("customer");
    descriptor
        .add_field("id", "@id")
        .unwrap()
        .set_schema_type(SchemaType::int());
    context.register_descriptor(descriptor).unwrap();

    let good = DataObject::new("Customer").with("id", Value::Integer(7));
    assert!(context.create_validator().validate(&good).unwrap());
    assert!(context
        .create_marshaller()
        .marshal_to_string(good)
        .is_ok());

    let bad = DataObject::new("Customer").with("id", "seven");
    assert!(!context.create_validator().validate(&bad).unwrap());
    assert!(context
        .create_marshaller()
        .marshal_to_string(bad)
        .is_err());
}

#[test]
fn test_shared_context_across_threads() {
    let mut context = BindingContext::new();
    let mut descriptor = TypeDescriptor::new("Customer");
    descriptor.set_default_root_element("customer");
    descriptor.add_field("name", "name/text()").unwrap();
    context.register_descriptor(descriptor).unwrap();

    let context = std::sync::Arc::new(context);
    let mut handles = Vec::new();
    for i in 0..4 {
        let context = std::sync::Arc::clone(&context);
        handles.push(std::thread::spawn(move || {
            let name = format!("worker-{i}");
            let object = DataObject::new("Customer").with("name", name.as_str());
            let mut marshaller = context.create_marshaller();
            marshaller.set_fragment(true).set_formatted_output(false);
            let text = marshaller.marshal_to_string(object).unwrap();
            let back = context
                .create_unmarshaller()
                .unmarshal_from_str(&text)
                .unwrap()
                .into_object()
                .unwrap();
            assert_eq!(back.get("name"), Some(&Value::Text(name)));
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}
