//! Object validation against the descriptor model
//!
//! A [`Validator`] re-runs the marshal walk for an object without
//! producing output and without touching document preservation: the root
//! identity must resolve, every direct and union field must convert
//! through its schema types, and composite fields must nest objects whose
//! classes resolve to descriptors. Each failed field is reported through
//! the installed [`ErrorHandler`] as a validation error; without a
//! handler the failure is counted and the walk continues. `validate`
//! returns `false` iff at least one failure was reported.
//!
//! Missing descriptors propagate as errors rather than validation
//! results: an unmapped class is a setup fault, not an invalid instance.

use std::sync::Arc;

use tracing::debug;

use crate::context::BindingContext;
use crate::descriptor::TypeDescriptor;
use crate::error::{BindError, ErrorHandler, ErrorResolution};
use crate::mapping::{FieldMapping, MappingKind};
use crate::value::{DataObject, Value};

/// Driver for validation calls. Obtained from
/// [`BindingContext::create_validator`]; carries no per-call state.
pub struct Validator<'a> {
    context: &'a BindingContext,
    handler: Option<Box<dyn ErrorHandler>>,
}

impl<'a> Validator<'a> {
    pub fn new(context: &'a BindingContext) -> Self {
        Validator {
            context,
            handler: None,
        }
    }

    /// Install a handler consulted for every validation failure. The
    /// handler may rethrow (propagate as an error), retry the conversion
    /// once, or substitute a value to validate instead.
    pub fn set_error_handler<H: ErrorHandler + 'static>(&mut self, handler: H) -> &mut Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Check that `object` would marshal cleanly: root identity resolved,
    /// every field convertible, every nested class mapped.
    pub fn validate(&self, object: &DataObject) -> Result<bool, BindError> {
        let descriptor = self.context.descriptor_for_object(object)?;
        let mut faults = 0usize;

        if descriptor.default_root().is_none()
            && self
                .context
                .inheritance_root(&descriptor)
                .default_root()
                .is_none()
        {
            self.report(
                BindError::Validation {
                    class: descriptor.host_class().to_string(),
                    reason: "no default root element declared".to_string(),
                },
                &mut faults,
            )?;
        }

        self.check_object(object, &descriptor, &mut faults)?;
        debug!(
            class = %descriptor.host_class(),
            faults,
            "validated object"
        );
        Ok(faults == 0)
    }

    fn check_object(
        &self,
        object: &DataObject,
        descriptor: &TypeDescriptor,
        faults: &mut usize,
    ) -> Result<(), BindError> {
        for mapping in descriptor.field_mappings() {
            let value = match object.get(mapping.attribute_name()) {
                Some(value) if !value.is_null() => value,
                _ => continue,
            };
            match mapping.kind() {
                MappingKind::Composite { .. } => {
                    self.check_composite(descriptor, mapping, value, faults)?;
                }
                _ => match value {
                    Value::List(items) => {
                        for item in items {
                            if !item.is_null() {
                                self.check_convert(descriptor, mapping, item, faults)?;
                            }
                        }
                    }
                    _ => self.check_convert(descriptor, mapping, value, faults)?,
                },
            }
        }
        Ok(())
    }

    fn check_composite(
        &self,
        descriptor: &TypeDescriptor,
        mapping: &FieldMapping,
        value: &Value,
        faults: &mut usize,
    ) -> Result<(), BindError> {
        match value {
            Value::Object(nested) => {
                let nested_descriptor = self.nested_descriptor(mapping, nested)?;
                self.check_object(nested, &nested_descriptor, faults)
            }
            Value::List(items) => {
                for item in items {
                    match item {
                        Value::Null => {}
                        Value::Object(nested) => {
                            let nested_descriptor = self.nested_descriptor(mapping, nested)?;
                            self.check_object(nested, &nested_descriptor, faults)?;
                        }
                        _ => self.report(
                            BindError::Validation {
                                class: descriptor.host_class().to_string(),
                                reason: format!(
                                    "field '{}' requires object values",
                                    mapping.attribute_name()
                                ),
                            },
                            faults,
                        )?,
                    }
                }
                Ok(())
            }
            _ => self.report(
                BindError::Validation {
                    class: descriptor.host_class().to_string(),
                    reason: format!(
                        "field '{}' requires an object value",
                        mapping.attribute_name()
                    ),
                },
                faults,
            ),
        }
    }

    fn nested_descriptor(
        &self,
        mapping: &FieldMapping,
        object: &DataObject,
    ) -> Result<Arc<TypeDescriptor>, BindError> {
        if self.context.has_class(object.class_name()) {
            return self.context.descriptor_for_object(object);
        }
        let reference = mapping.reference_class().unwrap_or_default();
        self.context.descriptor_for_class(reference)
    }

    fn check_convert(
        &self,
        descriptor: &TypeDescriptor,
        mapping: &FieldMapping,
        value: &Value,
        faults: &mut usize,
    ) -> Result<(), BindError> {
        let cause = match mapping.lexical_for(value) {
            Ok(_) => return Ok(()),
            Err(cause) => cause,
        };
        let error = BindError::Validation {
            class: descriptor.host_class().to_string(),
            reason: format!("field '{}': {}", mapping.attribute_name(), cause),
        };
        let handler = match &self.handler {
            Some(handler) => handler,
            None => {
                *faults += 1;
                return Ok(());
            }
        };
        match handler.handle(&error) {
            ErrorResolution::Rethrow => Err(error),
            ErrorResolution::Retry => match mapping.lexical_for(value) {
                Ok(_) => Ok(()),
                Err(_) => Err(error),
            },
            ErrorResolution::Substitute(replacement) => {
                if mapping.lexical_for(&replacement).is_err() {
                    *faults += 1;
                }
                Ok(())
            }
        }
    }

    /// Route one failure through the handler or count it.
    fn report(&self, error: BindError, faults: &mut usize) -> Result<(), BindError> {
        let handler = match &self.handler {
            Some(handler) => handler,
            None => {
                *faults += 1;
                return Ok(());
            }
        };
        match handler.handle(&error) {
            ErrorResolution::Rethrow => Err(error),
            _ => {
                *faults += 1;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::SchemaType;
    use crate::error::RethrowHandler;
    use crate::mapping::FieldMapping;

    fn typed_context() -> BindingContext {
        let mut context = BindingContext::new();
        let mut descriptor = TypeDescriptor::new("Customer");
        descriptor.set_default_root_element("customer");
        descriptor
            .add_field("id", "@id")
            .unwrap()
            .set_schema_type(SchemaType::int());
        descriptor.add_field("name", "name/text()").unwrap();
        context.register_descriptor(descriptor).unwrap();
        context
    }

    #[test]
    fn test_valid_object_passes() {
        let context = typed_context();
        let object = DataObject::new("Customer")
            .with("id", Value::Integer(7))
            .with("name", "Ada");
        assert!(context.create_validator().validate(&object).unwrap());
    }

    #[test]
    fn test_unconvertible_field_fails_without_throwing() {
        let context = typed_context();
        let object = DataObject::new("Customer").with("id", "not-a-number");
        assert!(!context.create_validator().validate(&object).unwrap());
    }

    #[test]
    fn test_unmapped_class_is_an_error() {
        let context = typed_context();
        let err = context
            .create_validator()
            .validate(&DataObject::new("Ghost"))
            .unwrap_err();
        assert_eq!(err.code(), 25003);
    }

    #[test]
    fn test_missing_root_counts_as_fault() {
        let mut context = BindingContext::new();
        let mut descriptor = TypeDescriptor::new("Orphan");
        descriptor.add_field("name", "name/text()").unwrap();
        context.register_descriptor(descriptor).unwrap();

        let object = DataObject::new("Orphan").with("name", "x");
        assert!(!context.create_validator().validate(&object).unwrap());
    }

    #[test]
    fn test_rethrow_handler_propagates() {
        let context = typed_context();
        let object = DataObject::new("Customer").with("id", "not-a-number");
        let mut validator = context.create_validator();
        validator.set_error_handler(RethrowHandler);
        let err = validator.validate(&object).unwrap_err();
        assert_eq!(err.code(), 25006);
        assert!(err.to_string().contains("id"), "{err}");
    }

    #[test]
    fn test_substitute_handler_repairs_field() {
        struct Zeroing;
        impl ErrorHandler for Zeroing {
            fn handle(&self, _error: &BindError) -> ErrorResolution {
                ErrorResolution::Substitute(Value::Integer(0))
            }
        }

        let context = typed_context();
        let object = DataObject::new("Customer").with("id", "not-a-number");
        let mut validator = context.create_validator();
        validator.set_error_handler(Zeroing);
        assert!(validator.validate(&object).unwrap());
    }

    #[test]
    fn test_retry_handler_propagates_on_second_failure() {
        struct RetryOnce;
        impl ErrorHandler for RetryOnce {
            fn handle(&self, _error: &BindError) -> ErrorResolution {
                ErrorResolution::Retry
            }
        }

        let context = typed_context();
        let object = DataObject::new("Customer").with("id", "not-a-number");
        let mut validator = context.create_validator();
        validator.set_error_handler(RetryOnce);
        assert_eq!(validator.validate(&object).unwrap_err().code(), 25006);
    }

    #[test]
    fn test_union_field_failure_reports_last_attempt() {
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

        let object = DataObject::new("Event").with("when", Value::Bytes(vec![1, 2]));
        let mut validator = context.create_validator();
        validator.set_error_handler(RethrowHandler);
        let err = validator.validate(&object).unwrap_err();
        // The int attempt came last, so its diagnostic survives
        assert!(err.to_string().contains("int"), "{err}");
    }

    #[test]
    fn test_nested_object_validated_recursively() {
        let mut context = BindingContext::new();
        let mut address = TypeDescriptor::new("Address");
        address
            .add_field("zip", "zip/text()")
            .unwrap()
            .set_schema_type(SchemaType::int());
        context.register_descriptor(address).unwrap();

        let mut descriptor = TypeDescriptor::new("Customer");
        descriptor.set_default_root_element("customer");
        descriptor.add_mapping(FieldMapping::composite("address", "address", "Address").unwrap());
        context.register_descriptor(descriptor).unwrap();

        let good = DataObject::new("Customer")
            .with("address", DataObject::new("Address").with("zip", Value::Integer(10001)));
        assert!(context.create_validator().validate(&good).unwrap());

        let bad = DataObject::new("Customer")
            .with("address", DataObject::new("Address").with("zip", "K1A 0A9"));
        assert!(!context.create_validator().validate(&bad).unwrap());
    }

    #[test]
    fn test_non_object_composite_value_is_a_fault() {
        let mut context = BindingContext::new();
        let mut address = TypeDescriptor::new("Address");
        address.add_field("city", "city/text()").unwrap();
        context.register_descriptor(address).unwrap();

        let mut descriptor = TypeDescriptor::new("Customer");
        descriptor.set_default_root_element("customer");
        descriptor.add_mapping(FieldMapping::composite("address", "address", "Address").unwrap());
        context.register_descriptor(descriptor).unwrap();

        let object = DataObject::new("Customer").with("address", "12 Main St");
        assert!(!context.create_validator().validate(&object).unwrap());
    }
}
