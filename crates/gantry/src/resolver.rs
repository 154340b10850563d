//! Резолвер аргументов - контекст одной материализации.
//!
//! Каждый `get` создаёт резолвер с владельцем (type-ID, чью фабрику
//! исполняем), и фабрика через него разрешает свои декларированные
//! аргументы. Решение по каждому аргументу:
//!
//! - не строка: литерал, как есть
//! - `%name%`: подстановка из карты параметров; отсутствующий параметр
//!   уходит литералом (строгость - дело валидатора)
//! - `@id` / `@?id` / `@id::Method`: материализация цели через
//!   контейнер, для `::Method` - привязка метода
//! - прочие строки: литералы
//!
//! Разрешённое значение проверяется на присваиваемость ожидаемой форме
//! позиции, с неявным расширением Int -> Float.

use tracing::debug;

use crate::callable::CallableValue;
use crate::container::Container;
use crate::errors::DIError;
use crate::reference::{self, TypeRef};
use crate::shape::Shape;
use crate::value::Value;

/// Контекст материализации одного type-ID.
pub struct Resolver<'c> {
    container: &'c Container,
    owner: &'c str,
}

impl<'c> Resolver<'c> {
    pub(crate) fn new(container: &'c Container, owner: &'c str) -> Self {
        Resolver { container, owner }
    }

    pub fn container(&self) -> &'c Container {
        self.container
    }

    /// Type-ID, чья фабрика сейчас исполняется. Попадает в ошибки как
    /// ссылающаяся сторона.
    pub fn owner(&self) -> &str {
        self.owner
    }

    /// Разрешает один декларированный аргумент в значение для позиции
    /// с ожидаемой формой `expected`.
    pub fn resolve(&self, argument: &Value, expected: &Shape) -> Result<Value, DIError> {
        let Value::Str(text) = argument else {
            return Ok(argument.clone());
        };
        if let Some(name) = reference::parameter_name(text) {
            return self.resolve_parameter(text, name, expected);
        }
        if reference::is_type_reference(text) {
            return self.resolve_reference(text, expected);
        }
        Ok(argument.clone())
    }

    fn resolve_parameter(
        &self,
        raw: &str,
        name: &str,
        expected: &Shape,
    ) -> Result<Value, DIError> {
        match self.container.parameter(name) {
            Some(value) => {
                let actual = value.type_label();
                expected
                    .coerce(value)
                    .ok_or_else(|| DIError::wrong_shape(raw, actual, expected.to_string()))
            }
            None => {
                // Неопределённый параметр не валит материализацию:
                // плейсхолдер уходит литералом, строгую проверку делает
                // валидатор до первого get
                debug!(
                    parameter = name,
                    owner = self.owner,
                    "parameter is not defined, passing placeholder through"
                );
                Ok(Value::Str(raw.to_string()))
            }
        }
    }

    fn resolve_reference(&self, text: &str, expected: &Shape) -> Result<Value, DIError> {
        let reference = TypeRef::parse(text)?;
        if !self.container.has(reference.id()) {
            if reference.is_optional() {
                debug!(
                    target_id = reference.id(),
                    owner = self.owner,
                    "optional reference target is absent, resolving to null"
                );
                return Ok(Value::Null);
            }
            return Err(DIError::unknown_reference(reference.id(), self.owner));
        }
        let value = match reference.method() {
            Some(method) => Value::Callable(self.bind_method(reference.id(), method)?),
            None => self.container.get(reference.id())?,
        };
        let actual = value.type_label();
        expected
            .coerce(value)
            .ok_or_else(|| DIError::wrong_shape(reference.raw(), actual, expected.to_string()))
    }

    /// Материализует цель и привязывает её метод как callable.
    pub(crate) fn bind_method(&self, id: &str, method: &str) -> Result<CallableValue, DIError> {
        let value = self.container.get(id)?;
        let object = match value.as_object() {
            Some(object) => object.clone(),
            None => return Err(DIError::missing_method(method, value.type_label())),
        };
        let shape = self
            .container
            .shape_for(object.type_id())
            .ok_or_else(|| DIError::missing_method(method, object.type_name()))?;
        shape.bind(method, &object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals_pass_verbatim() {
        let container = Container::new();
        let resolver = Resolver::new(&container, "owner");

        assert_eq!(
            resolver.resolve(&Value::Int(5), &Shape::Int).expect("int"),
            Value::Int(5)
        );
        assert_eq!(
            resolver
                .resolve(&Value::from("plain text"), &Shape::Str)
                .expect("str"),
            Value::from("plain text")
        );
        // Строка из одних процентов это литерал, не подстановка
        assert_eq!(
            resolver.resolve(&Value::from("%%"), &Shape::Str).expect("str"),
            Value::from("%%")
        );
    }

    #[test]
    fn test_undefined_parameter_passes_through() {
        let container = Container::new();
        let resolver = Resolver::new(&container, "owner");
        let resolved = resolver
            .resolve(&Value::from("%missing%"), &Shape::Any)
            .expect("soft pass");
        assert_eq!(resolved, Value::from("%missing%"));
    }

    #[test]
    fn test_defined_parameter_substitutes_and_coerces() {
        let container = Container::new();
        container.set_parameter("port", Value::Int(5432));
        let resolver = Resolver::new(&container, "owner");

        assert_eq!(
            resolver.resolve(&Value::from("%port%"), &Shape::Int).expect("int"),
            Value::Int(5432)
        );
        assert_eq!(
            resolver
                .resolve(&Value::from("%port%"), &Shape::Float)
                .expect("widened"),
            Value::Float(5432.0)
        );

        let err = resolver
            .resolve(&Value::from("%port%"), &Shape::Str)
            .expect_err("mismatch");
        assert_eq!(err, DIError::wrong_shape("%port%", "an integer", "a string"));
    }

    #[test]
    fn test_missing_required_reference() {
        let container = Container::new();
        let resolver = Resolver::new(&container, "server");
        let err = resolver
            .resolve(&Value::from("@logger"), &Shape::Any)
            .expect_err("unknown");
        assert_eq!(err, DIError::unknown_reference("logger", "server"));
    }

    #[test]
    fn test_missing_optional_reference_gives_null() {
        let container = Container::new();
        let resolver = Resolver::new(&container, "server");
        let resolved = resolver
            .resolve(&Value::from("@?logger"), &Shape::Any)
            .expect("optional");
        assert!(resolved.is_null());
    }
}
