//! Конфигураторы - донастройка значений после материализации.
//!
//! Конфигуратор это обычный зарегистрированный тип плюс имя его метода.
//! Обёрнутая фабрика сначала материализует значение, затем контейнер
//! материализует конфигуратор и вызывает метод с значением единственным
//! аргументом. Ошибка конфигуратора отменяет материализацию: значение
//! не кэшируется.

use tracing::debug;

use crate::container::Container;
use crate::errors::DIError;
use crate::reference::is_invokable_method;
use crate::resolver::Resolver;
use crate::value::Value;

/// Пара (type-ID конфигуратора, имя метода).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configurator {
    type_id: String,
    method: String,
}

impl Configurator {
    /// Проверки те же, что у `::Method` привязок: непустой ID, непустое
    /// имя метода с заглавной буквы. Существование ID проверяется
    /// валидатором и при применении, не здесь.
    pub fn new(type_id: impl Into<String>, method: impl Into<String>) -> Result<Self, DIError> {
        let type_id = type_id.into();
        let method = method.into();
        if type_id.is_empty() {
            return Err(DIError::invalid_id(type_id));
        }
        if method.is_empty() {
            return Err(DIError::custom("configurator method name must not be empty"));
        }
        if !is_invokable_method(&method) {
            return Err(DIError::custom(format!(
                "configurator method {method:?} is not invokable, the name must start with an uppercase letter"
            )));
        }
        Ok(Configurator { type_id, method })
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Донастраивает уже материализованное значение.
    pub fn configure(&self, target: &Value, container: &Container) -> Result<(), DIError> {
        let owner = target.type_label();
        let cx = Resolver::new(container, &owner);
        self.apply(target, &cx)
    }

    pub(crate) fn apply(&self, target: &Value, cx: &Resolver<'_>) -> Result<(), DIError> {
        if target.is_null() {
            return Err(DIError::custom("configurator target must not be null"));
        }
        if !cx.container().has(&self.type_id) {
            return Err(DIError::unknown_reference(&self.type_id, cx.owner()));
        }
        debug!(
            configurator = %self.type_id,
            method = %self.method,
            target = %target.type_label(),
            "configuring value"
        );
        let configurator = cx.container().get(&self.type_id)?;
        if configurator.as_object().is_none() {
            return Err(DIError::wrong_shape(
                &self.type_id,
                configurator.type_label(),
                "an object",
            ));
        }
        let bound = cx.bind_method(&self.type_id, &self.method)?;
        if let Some(expected) = bound.signature().expected_at(0) {
            if !expected.accepts(target) {
                return Err(DIError::wrong_shape(
                    cx.owner(),
                    target.type_label(),
                    expected.to_string(),
                ));
            }
        }
        match bound.call(vec![target.clone()]) {
            Ok(_) => Ok(()),
            Err(err) => Err(DIError::ConfiguratorFailed {
                type_id: self.type_id.clone(),
                source: Box::new(err),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::CallableValue;
    use crate::factory::Factory;
    use crate::shape::StructShape;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Tuner {
        applied: AtomicUsize,
    }

    fn tuner_shape() -> Arc<StructShape> {
        StructShape::describe::<Tuner>("Tuner")
            .method("Apply", |t: &Tuner, _target: Value| {
                t.applied.fetch_add(1, Ordering::SeqCst);
            })
            .method("Reject", |_t: &Tuner, _target: Value| -> Result<(), DIError> {
                Err(DIError::custom("target refused"))
            })
            .build()
    }

    #[test]
    fn test_new_validates_inputs() {
        assert!(Configurator::new("tuner", "Apply").is_ok());
        assert!(Configurator::new("", "Apply").is_err());
        assert!(Configurator::new("tuner", "").is_err());
        assert!(Configurator::new("tuner", "apply").is_err());
    }

    #[test]
    fn test_configure_invokes_method() {
        let container = Container::new();
        container.register("tuner", Factory::structure(tuner_shape(), Vec::new()));

        let configurator = Configurator::new("tuner", "Apply").expect("valid");
        let target = Value::Int(7);
        configurator
            .configure(&target, &container)
            .expect("configured");

        let tuner = container.get_as::<Tuner>("tuner").expect("materialized");
        assert_eq!(tuner.applied.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_configure_rejects_null_target() {
        let container = Container::new();
        let configurator = Configurator::new("tuner", "Apply").expect("valid");
        assert!(configurator.configure(&Value::Null, &container).is_err());
    }

    #[test]
    fn test_configure_unknown_configurator() {
        let container = Container::new();
        let configurator = Configurator::new("tuner", "Apply").expect("valid");
        let err = configurator
            .configure(&Value::Int(1), &container)
            .expect_err("not registered");
        assert_eq!(err.category(), "reference");
    }

    #[test]
    fn test_configure_missing_method() {
        let container = Container::new();
        container.register("tuner", Factory::structure(tuner_shape(), Vec::new()));
        let configurator = Configurator::new("tuner", "Vanish").expect("valid");
        let err = configurator
            .configure(&Value::Int(1), &container)
            .expect_err("no such method");
        assert_eq!(err.category(), "method");
    }

    #[test]
    fn test_configure_scalar_configurator() {
        let container = Container::new();
        container
            .inject_instance("tuner", Value::Int(3))
            .expect("instance");
        let configurator = Configurator::new("tuner", "Apply").expect("valid");
        let err = configurator
            .configure(&Value::Int(1), &container)
            .expect_err("scalars cannot configure");
        assert_eq!(err.category(), "shape");
    }

    #[test]
    fn test_user_error_is_wrapped() {
        let container = Container::new();
        container.register("tuner", Factory::structure(tuner_shape(), Vec::new()));
        let configurator = Configurator::new("tuner", "Reject").expect("valid");
        let err = configurator
            .configure(&Value::Int(1), &container)
            .expect_err("user method errored");
        match err {
            DIError::ConfiguratorFailed { type_id, source } => {
                assert_eq!(type_id, "tuner");
                assert_eq!(source.to_string(), "target refused");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_callable_target_is_configurable() {
        let container = Container::new();
        container.register("tuner", Factory::structure(tuner_shape(), Vec::new()));
        let configurator = Configurator::new("tuner", "Apply").expect("valid");
        let target = Value::Callable(CallableValue::from_fn("noop", || Value::Null));
        configurator
            .configure(&target, &container)
            .expect("callables are values too");
    }
}
