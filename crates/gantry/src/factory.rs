//! Фабрики - рецепты материализации значений.
//!
//! Закрытое семейство вариантов: каждый хранит декларацию (аргументы,
//! целевые ссылки) отдельно от исполнения, чтобы валидатор мог обойти
//! граф зависимостей без материализации.
//!
//! Конструкторы не возвращают `Result`. Дефект регистрации превращает
//! фабрику в [`Factory::Invalid`], которая хранит ошибку и отдаёт её
//! при первом использовании и при валидации. Это позволяет собирать
//! wiring декларативно, без обработки ошибок на каждой строчке, и
//! ловить все дефекты одним прогоном валидатора.

use std::sync::Arc;

use crate::callable::CallableValue;
use crate::configurator::Configurator;
use crate::errors::DIError;
use crate::reference::{self, TypeRef};
use crate::resolver::Resolver;
use crate::shape::{Shape, StructShape};
use crate::value::Value;

/// Строковый аргумент, несущий ссылку (`@...` или `%...%`), проверяется
/// резолвером при материализации, а не при регистрации.
fn is_reference_bearing(arg: &Value) -> bool {
    matches!(
        arg,
        Value::Str(s) if reference::is_parameter(s) || reference::is_type_reference(s)
    )
}

#[derive(Debug, Clone)]
pub struct StructFactory {
    shape: Arc<StructShape>,
    args: Vec<Value>,
}

impl StructFactory {
    pub fn shape(&self) -> &Arc<StructShape> {
        &self.shape
    }
}

#[derive(Debug, Clone)]
pub struct FunctionFactory {
    callable: CallableValue,
    args: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct InstanceFactory {
    value: Value,
}

#[derive(Debug, Clone)]
pub struct AliasFactory {
    target: TypeRef,
}

#[derive(Debug, Clone)]
pub struct MethodRefFactory {
    target: TypeRef,
    method: String,
}

#[derive(Debug, Clone)]
pub struct ProxyFactory {
    target: TypeRef,
    method: String,
    args: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct ConfiguredFactory {
    inner: Box<Factory>,
    configurator: Configurator,
}

/// Рецепт материализации значения под одним type-ID.
#[derive(Debug, Clone)]
pub enum Factory {
    /// Свежий композит: Default + инициализаторы по порядку полей
    Struct(StructFactory),
    /// Вызов функции, результат обязан быть объектом или callable
    Function(FunctionFactory),
    /// Готовое значение как есть
    Instance(InstanceFactory),
    /// Синоним другого ID (возможно с привязкой метода)
    Alias(AliasFactory),
    /// Привязка метода целевого типа как вызываемого значения
    MethodRef(MethodRefFactory),
    /// Вызов метода целевого типа при материализации
    Proxy(ProxyFactory),
    /// Обёртка: материализовать внутренней фабрикой, затем донастроить
    Configured(ConfiguredFactory),
    /// Дефект регистрации, всплывает при использовании
    Invalid(DIError),
}

impl Factory {
    /// Struct-фабрика. Инициализаторов не больше, чем полей; литералы
    /// проверяются на присваиваемость сразу, ссылки - при материализации.
    pub fn structure(shape: Arc<StructShape>, args: Vec<Value>) -> Factory {
        if args.len() > shape.field_count() {
            return Factory::Invalid(DIError::custom(format!(
                "type {} declares {} field(s) but {} initializer(s) were given",
                shape.name(),
                shape.field_count(),
                args.len()
            )));
        }
        for (index, arg) in args.iter().enumerate() {
            if is_reference_bearing(arg) {
                continue;
            }
            // Индекс валиден: инициализаторов не больше, чем полей
            if let Some(field) = shape.field(index) {
                if !field.shape().accepts(arg) {
                    return Factory::Invalid(DIError::custom(format!(
                        "initializer {index} for type {}: {} is not assignable to {}",
                        shape.name(),
                        arg.type_label(),
                        field.shape()
                    )));
                }
            }
        }
        Factory::Struct(StructFactory { shape, args })
    }

    /// Функциональная фабрика. Результат обязан быть разделяемым
    /// объектом или callable, арность и литералы проверяются сразу.
    pub fn function(callable: CallableValue, args: Vec<Value>) -> Factory {
        let signature = callable.signature();
        match signature.result() {
            Shape::Object(_) | Shape::Callable => {}
            other => {
                return Factory::Invalid(DIError::custom(format!(
                    "factory {} must produce a shared object or callable, its result is {}",
                    callable.name(),
                    other
                )));
            }
        }
        if !signature.accepts_count(args.len()) {
            return Factory::Invalid(DIError::custom(callable.arity_error(args.len())));
        }
        for (index, arg) in args.iter().enumerate() {
            if is_reference_bearing(arg) {
                continue;
            }
            if let Some(expected) = signature.expected_at(index) {
                if !expected.accepts(arg) {
                    return Factory::Invalid(DIError::custom(format!(
                        "argument {index} for factory {}: {} is not assignable to {}",
                        callable.name(),
                        arg.type_label(),
                        expected
                    )));
                }
            }
        }
        Factory::Function(FunctionFactory { callable, args })
    }

    /// Готовое значение. Null запрещён: null-регистрация неотличима от
    /// отсутствующей.
    pub fn instance(value: Value) -> Factory {
        if value.is_null() {
            return Factory::Invalid(DIError::custom("instance value must not be null"));
        }
        Factory::Instance(InstanceFactory { value })
    }

    /// Синоним: `get` этого ID отдаёт значение целевого ID. Форма
    /// `@id::Method` даёт привязку метода.
    pub fn alias(target: &str) -> Factory {
        match TypeRef::parse(target) {
            Ok(target) => Factory::Alias(AliasFactory { target }),
            Err(err) => Factory::Invalid(err),
        }
    }

    /// Привязка метода целевого типа как значения этого ID.
    pub fn method_ref(target: &str, method: &str) -> Factory {
        match parse_method_target(target, method) {
            Ok(target) => Factory::MethodRef(MethodRefFactory {
                target,
                method: method.to_string(),
            }),
            Err(err) => Factory::Invalid(err),
        }
    }

    /// Материализация через вызов метода целевого типа. Арность
    /// проверяется при первом использовании: сигнатура цели неизвестна
    /// до её материализации.
    pub fn proxy(target: &str, method: &str, args: Vec<Value>) -> Factory {
        match parse_method_target(target, method) {
            Ok(target) => Factory::Proxy(ProxyFactory {
                target,
                method: method.to_string(),
                args,
            }),
            Err(err) => Factory::Invalid(err),
        }
    }

    /// Оборачивает фабрику конфигуратором: после материализации значение
    /// передаётся методу `method` типа `configurator_id`.
    pub fn configured(inner: Factory, configurator_id: &str, method: &str) -> Factory {
        match Configurator::new(configurator_id, method) {
            Ok(configurator) => Factory::Configured(ConfiguredFactory {
                inner: Box::new(inner),
                configurator,
            }),
            Err(err) => Factory::Invalid(err),
        }
    }

    /// Вид фабрики для логов.
    pub fn kind(&self) -> &'static str {
        match self {
            Factory::Struct(_) => "struct",
            Factory::Function(_) => "function",
            Factory::Instance(_) => "instance",
            Factory::Alias(_) => "alias",
            Factory::MethodRef(_) => "method_ref",
            Factory::Proxy(_) => "proxy",
            Factory::Configured(_) => "configured",
            Factory::Invalid(_) => "invalid",
        }
    }

    /// Дефект регистрации, если он есть. Сквозь Configured видна
    /// внутренняя фабрика.
    pub fn registration_error(&self) -> Option<&DIError> {
        match self {
            Factory::Invalid(err) => Some(err),
            Factory::Configured(f) => f.inner.registration_error(),
            _ => None,
        }
    }

    /// Описание композита, которое эта фабрика материализует.
    pub fn struct_shape(&self) -> Option<&Arc<StructShape>> {
        match self {
            Factory::Struct(f) => Some(&f.shape),
            Factory::Configured(f) => f.inner.struct_shape(),
            _ => None,
        }
    }

    /// Декларированные аргументы для статического анализа.
    ///
    /// Валидатор обходит их текстуально: ссылки `@...` дают рёбра графа
    /// зависимостей, `%...%` - требования к карте параметров. Ссылка на
    /// конфигуратор тоже зависимость.
    pub fn arguments(&self) -> Vec<Value> {
        match self {
            Factory::Struct(f) => f.args.clone(),
            Factory::Function(f) => f.args.clone(),
            Factory::Instance(_) => Vec::new(),
            Factory::Alias(f) => vec![Value::Str(f.target.canonical())],
            Factory::MethodRef(f) => {
                vec![method_reference_argument(&f.target, &f.method)]
            }
            Factory::Proxy(f) => {
                let mut args = Vec::with_capacity(f.args.len() + 1);
                args.push(method_reference_argument(&f.target, &f.method));
                args.extend(f.args.iter().cloned());
                args
            }
            Factory::Configured(f) => {
                let mut args = f.inner.arguments();
                args.push(Value::Str(format!("@{}", f.configurator.type_id())));
                args
            }
            Factory::Invalid(_) => Vec::new(),
        }
    }

    /// Материализует значение в контексте резолвера.
    pub fn produce(&self, cx: &Resolver<'_>) -> Result<Value, DIError> {
        match self {
            Factory::Struct(f) => {
                let mut values = Vec::with_capacity(f.args.len());
                for (index, arg) in f.args.iter().enumerate() {
                    let field = f.shape.field(index).ok_or_else(|| {
                        DIError::custom("initializer count exceeds field count")
                    })?;
                    values.push(cx.resolve(arg, field.shape())?);
                }
                f.shape.materialize(values)
            }
            Factory::Function(f) => {
                let args = resolve_call_args(cx, &f.callable, &f.args)?;
                f.callable.call(args)
            }
            Factory::Instance(f) => Ok(f.value.clone()),
            Factory::Alias(f) => cx.resolve(&Value::Str(f.target.canonical()), &Shape::Any),
            Factory::MethodRef(f) => {
                if f.target.is_optional() && !cx.container().has(f.target.id()) {
                    return Ok(Value::Null);
                }
                Ok(Value::Callable(cx.bind_method(f.target.id(), &f.method)?))
            }
            Factory::Proxy(f) => {
                if f.target.is_optional() && !cx.container().has(f.target.id()) {
                    return Ok(Value::Null);
                }
                let bound = cx.bind_method(f.target.id(), &f.method)?;
                let args = resolve_call_args(cx, &bound, &f.args)?;
                bound.call(args)
            }
            Factory::Configured(f) => {
                let value = f.inner.produce(cx)?;
                f.configurator.apply(&value, cx)?;
                Ok(value)
            }
            Factory::Invalid(err) => Err(DIError::invalid_factory(cx.owner(), err.to_string())),
        }
    }
}

/// Цель `::Method` привязки: plain ID, сам метод задаётся отдельно.
fn parse_method_target(target: &str, method: &str) -> Result<TypeRef, DIError> {
    let target = TypeRef::parse(target)?;
    if target.method().is_some() {
        return Err(DIError::custom(format!(
            "target {:?} already carries a method selector",
            target.raw()
        )));
    }
    if method.is_empty() {
        return Err(DIError::custom("method name must not be empty"));
    }
    if !reference::is_invokable_method(method) {
        return Err(DIError::custom(format!(
            "method {method:?} is not invokable, the name must start with an uppercase letter"
        )));
    }
    Ok(target)
}

fn method_reference_argument(target: &TypeRef, method: &str) -> Value {
    let mut out = String::from("@");
    if target.is_optional() {
        out.push('?');
    }
    out.push_str(target.id());
    out.push_str("::");
    out.push_str(method);
    Value::Str(out)
}

/// Разрешает аргументы вызова слева направо против сигнатуры.
/// Первая же ошибка прекращает разбор.
fn resolve_call_args(
    cx: &Resolver<'_>,
    callable: &CallableValue,
    args: &[Value],
) -> Result<Vec<Value>, DIError> {
    let signature = callable.signature();
    if !signature.accepts_count(args.len()) {
        return Err(DIError::custom(callable.arity_error(args.len())));
    }
    let mut resolved = Vec::with_capacity(args.len());
    for (index, arg) in args.iter().enumerate() {
        let expected = signature.expected_at(index).unwrap_or(&Shape::Any);
        resolved.push(cx.resolve(arg, expected)?);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Logger {
        prefix: String,
        verbosity: i64,
    }

    fn logger_shape() -> Arc<StructShape> {
        StructShape::describe::<Logger>("Logger")
            .field("prefix", |l: &mut Logger, v: String| l.prefix = v)
            .field("verbosity", |l: &mut Logger, v: i64| l.verbosity = v)
            .build()
    }

    #[test]
    fn test_structure_rejects_extra_initializers() {
        let factory = Factory::structure(
            logger_shape(),
            vec![Value::from("app"), Value::Int(2), Value::Int(3)],
        );
        let err = factory.registration_error().expect("invalid");
        assert!(err.to_string().contains("2 field(s)"));
        assert!(err.to_string().contains("3 initializer(s)"));
    }

    #[test]
    fn test_structure_rejects_literal_mismatch() {
        let factory = Factory::structure(logger_shape(), vec![Value::Int(1)]);
        let err = factory.registration_error().expect("invalid");
        assert!(err.to_string().contains("initializer 0"));
    }

    #[test]
    fn test_structure_defers_reference_checks() {
        let factory = Factory::structure(
            logger_shape(),
            vec![Value::from("%prefix%"), Value::from("@verbosity")],
        );
        assert!(factory.registration_error().is_none());
        assert_eq!(
            factory.arguments(),
            vec![Value::from("%prefix%"), Value::from("@verbosity")]
        );
    }

    #[test]
    fn test_function_requires_reference_result() {
        let callable = CallableValue::from_fn("make_port", || 8080i64);
        let factory = Factory::function(callable, Vec::new());
        let err = factory.registration_error().expect("invalid");
        assert!(err.to_string().contains("must produce a shared object or callable"));
    }

    #[test]
    fn test_function_checks_arity_eagerly() {
        let callable = CallableValue::from_fn("make_logger", |prefix: String| {
            Arc::new(Logger {
                prefix,
                verbosity: 0,
            })
        });
        let factory = Factory::function(callable, vec![Value::from("a"), Value::from("b")]);
        let err = factory.registration_error().expect("invalid");
        assert!(err.to_string().contains("expects 1 argument(s), got 2"));
    }

    #[test]
    fn test_instance_rejects_null() {
        let err = Factory::instance(Value::Null)
            .registration_error()
            .expect("invalid")
            .clone();
        assert!(err.to_string().contains("must not be null"));
    }

    #[test]
    fn test_alias_parses_target() {
        let factory = Factory::alias("@logger");
        assert!(factory.registration_error().is_none());
        assert_eq!(factory.arguments(), vec![Value::from("@logger")]);

        let invalid = Factory::alias("@");
        assert_eq!(
            invalid.registration_error(),
            Some(&DIError::invalid_id("@"))
        );
    }

    #[test]
    fn test_method_ref_requires_uppercase() {
        let factory = Factory::method_ref("@db", "open");
        let err = factory.registration_error().expect("invalid");
        assert!(err.to_string().contains("uppercase"));

        let ok = Factory::method_ref("@db", "Open");
        assert!(ok.registration_error().is_none());
        assert_eq!(ok.arguments(), vec![Value::from("@db::Open")]);
    }

    #[test]
    fn test_proxy_declares_target_and_args() {
        let factory = Factory::proxy("@pool", "Acquire", vec![Value::Int(5)]);
        assert_eq!(
            factory.arguments(),
            vec![Value::from("@pool::Acquire"), Value::Int(5)]
        );
    }

    #[test]
    fn test_configured_wraps_and_declares_dependency() {
        let inner = Factory::structure(logger_shape(), Vec::new());
        let factory = Factory::configured(inner, "logger_setup", "Apply");
        assert!(factory.registration_error().is_none());
        assert_eq!(factory.kind(), "configured");
        assert_eq!(factory.arguments(), vec![Value::from("@logger_setup")]);
        assert!(factory.struct_shape().is_some());
    }

    #[test]
    fn test_configured_surfaces_inner_defect() {
        let inner = Factory::instance(Value::Null);
        let factory = Factory::configured(inner, "setup", "Apply");
        assert!(factory.registration_error().is_some());
    }

    #[test]
    fn test_configured_rejects_lowercase_method() {
        let inner = Factory::structure(logger_shape(), Vec::new());
        let factory = Factory::configured(inner, "setup", "apply");
        assert!(factory.registration_error().is_some());
    }
}
