//! Динамическая модель значений контейнера.
//!
//! Всё, что контейнер хранит и передаёт между фабриками, выражено одним
//! типом [`Value`]: скаляры, списки, карты, разделяемые объекты
//! ([`ObjectValue`], обёртка над `Arc<dyn Any>`) и вызываемые значения
//! ([`CallableValue`]). Типизированный код по краям конвертируется через
//! [`FromValue`] / [`IntoValue`], внутри контейнер работает только с
//! `Value`.
//!
//! Равенство структурное для скаляров и коллекций, для объектов и
//! callables сравниваются указатели: два `get` одного singleton ID
//! обязаны давать равные значения.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::callable::CallableValue;
use crate::errors::DIError;

/// Разделяемый объект: `Arc` на произвольный пользовательский тип
/// плюс захваченное при конструировании имя типа для диагностики.
#[derive(Clone)]
pub struct ObjectValue {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    type_id: TypeId,
}

impl ObjectValue {
    pub fn new<T: Any + Send + Sync>(inner: Arc<T>) -> Self {
        ObjectValue {
            inner,
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// Имя конкретного типа под `Arc`, каким его видел компилятор.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Попытка вернуть объект как `Arc<T>`. Забирает ещё одну ссылку,
    /// сам объект остаётся разделяемым.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Идентичность по указателю: тот же самый аллоцированный объект.
    pub fn ptr_eq(&self, other: &ObjectValue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectValue({})", self.type_name)
    }
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Значение, которым оперирует контейнер.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object(ObjectValue),
    Callable(CallableValue),
}

impl Value {
    /// Оборачивает разделяемый объект.
    pub fn object<T: Any + Send + Sync>(inner: Arc<T>) -> Value {
        Value::Object(ObjectValue::new(inner))
    }

    /// Собирает карту из пар ключ-значение.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Value {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float, с неявным расширением из Int.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&CallableValue> {
        match self {
            Value::Callable(callable) => Some(callable),
            _ => None,
        }
    }

    /// Человекочитаемая метка для сообщений об ошибках.
    pub fn type_label(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "a boolean".to_string(),
            Value::Int(_) => "an integer".to_string(),
            Value::Float(_) => "a float".to_string(),
            Value::Str(_) => "a string".to_string(),
            Value::List(_) => "a list".to_string(),
            Value::Map(_) => "a map".to_string(),
            Value::Object(object) => format!("an object of type {}", object.type_name()),
            Value::Callable(callable) => format!("the callable {}", callable.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<CallableValue> for Value {
    fn from(v: CallableValue) -> Self {
        Value::Callable(v)
    }
}

fn conversion_error(expected: &str, actual: &Value) -> DIError {
    DIError::custom(format!(
        "expected {expected}, got {}",
        actual.type_label()
    ))
}

/// Извлечение типизированного значения из [`Value`].
///
/// Реализации по краям контейнера: параметры типизированных фабрик и
/// методов. Несовпадение формы даёт ошибку, а не panic.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, DIError>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, DIError> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, DIError> {
        value
            .as_bool()
            .ok_or_else(|| conversion_error("a boolean", &value))
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, DIError> {
        value
            .as_i64()
            .ok_or_else(|| conversion_error("an integer", &value))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, DIError> {
        value
            .as_f64()
            .ok_or_else(|| conversion_error("a float", &value))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, DIError> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(conversion_error("a string", &other)),
        }
    }
}

impl FromValue for CallableValue {
    fn from_value(value: Value) -> Result<Self, DIError> {
        match value {
            Value::Callable(callable) => Ok(callable),
            other => Err(conversion_error("a callable", &other)),
        }
    }
}

impl<T: Any + Send + Sync> FromValue for Arc<T> {
    fn from_value(value: Value) -> Result<Self, DIError> {
        let expected = std::any::type_name::<T>();
        match &value {
            Value::Object(object) => object
                .downcast::<T>()
                .ok_or_else(|| conversion_error(expected, &value)),
            _ => Err(conversion_error(expected, &value)),
        }
    }
}

impl<T: Any + Send + Sync> FromValue for Option<Arc<T>> {
    fn from_value(value: Value) -> Result<Self, DIError> {
        match value {
            Value::Null => Ok(None),
            other => Arc::<T>::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, DIError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(conversion_error("a list", &other)),
        }
    }
}

impl FromValue for BTreeMap<String, Value> {
    fn from_value(value: Value) -> Result<Self, DIError> {
        match value {
            Value::Map(map) => Ok(map),
            other => Err(conversion_error("a map", &other)),
        }
    }
}

/// Упаковка типизированного результата обратно в [`Value`].
///
/// Возвращает `Result`, чтобы метод с сигнатурой
/// `Result<Arc<T>, DIError>` упаковывался прозрачно: ошибка
/// пользовательского кода проходит сквозь упаковку как есть.
pub trait IntoValue {
    fn into_value(self) -> Result<Value, DIError>;
}

impl IntoValue for Value {
    fn into_value(self) -> Result<Value, DIError> {
        Ok(self)
    }
}

impl IntoValue for () {
    fn into_value(self) -> Result<Value, DIError> {
        Ok(Value::Null)
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Result<Value, DIError> {
        Ok(Value::Bool(self))
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Result<Value, DIError> {
        Ok(Value::Int(self))
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Result<Value, DIError> {
        Ok(Value::Float(self))
    }
}

impl IntoValue for String {
    fn into_value(self) -> Result<Value, DIError> {
        Ok(Value::Str(self))
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Result<Value, DIError> {
        Ok(Value::Str(self.to_string()))
    }
}

impl IntoValue for CallableValue {
    fn into_value(self) -> Result<Value, DIError> {
        Ok(Value::Callable(self))
    }
}

impl<T: Any + Send + Sync> IntoValue for Arc<T> {
    fn into_value(self) -> Result<Value, DIError> {
        Ok(Value::object(self))
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Result<Value, DIError> {
        match self {
            Some(v) => v.into_value(),
            None => Ok(Value::Null),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Result<Value, DIError> {
        let items = self
            .into_iter()
            .map(IntoValue::into_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::List(items))
    }
}

impl<T: IntoValue> IntoValue for Result<T, DIError> {
    fn into_value(self) -> Result<Value, DIError> {
        self?.into_value()
    }
}
