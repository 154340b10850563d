//! Error handling для всех операций контейнера.
//!
//! Политика ошибок единая: никаких panic в библиотечном коде.
//! Дефекты регистрации записываются в Invalid-фабрику и всплывают при
//! первом использовании типа, ошибки материализации возвращаются из `get`
//! без кэширования (повторный `get` повторяет попытку). Panic внутри
//! пользовательской фабрики перехватывается на границе `get` и
//! конвертируется в [`DIError::FactoryPanicked`].
//!
//! Единственные места, где panic допустим, это `must_get` и
//! `must_validate` - явно заявленные в названии обёртки для bootstrap
//! кода.

use thiserror::Error;

/// Основной error type для всех операций контейнера.
///
/// `Clone` обязателен: Invalid-фабрика хранит ошибку своей регистрации
/// и отдаёт копию при каждом обращении.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DIError {
    /// Пустая или синтаксически некорректная ссылка на тип
    #[error("invalid type ID {raw:?}")]
    InvalidId { raw: String },

    /// Дефект регистрации фабрики, всплывает при первом использовании
    #[error("invalid factory for type {type_id:?}: {message}")]
    InvalidFactory { type_id: String, message: String },

    /// Аргумент `@target` ссылается на незарегистрированный ID
    #[error("type {id:?} referenced by {referenced_by:?} is not registered")]
    UnknownReference { id: String, referenced_by: String },

    /// Разрешённое значение не подходит к ожидаемой позиции
    #[error("{id:?} holds {actual} which is not assignable to {expected}")]
    WrongShape {
        id: String,
        actual: String,
        expected: String,
    },

    /// Селектор `::Method` указывает на отсутствующий метод
    #[error("value of type {on} has no method {method:?}")]
    MissingMethod { method: String, on: String },

    /// `%name%` отсутствует в карте параметров
    #[error("parameter {name:?} referenced by {referenced_by:?} is not defined")]
    UndefinedParameter { name: String, referenced_by: String },

    /// Граф ссылок содержит цикл
    #[error("circular type reference: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// `get` запрошен для незарегистрированного ID
    #[error("type {id:?} is not registered")]
    Undefined { id: String },

    /// Конфигуратор вернул ошибку при донастройке значения
    #[error("configurator for type {type_id:?} failed: {source}")]
    ConfiguratorFailed {
        type_id: String,
        #[source]
        source: Box<DIError>,
    },

    /// Пользовательская фабрика запаниковала во время материализации
    #[error("factory for type {type_id:?} panicked: {message}")]
    FactoryPanicked { type_id: String, message: String },

    /// Ошибка пользовательского кода (фабрики, метода, конфигуратора)
    #[error("{message}")]
    Custom { message: String },

    /// Обёртка первого нарушенного ограничения валидации
    #[error("container validation failed: {source}")]
    Validation {
        #[source]
        source: Box<DIError>,
    },
}

impl DIError {
    /// Ошибка произвольного пользовательского кода.
    ///
    /// Используется фабриками и методами, которым нечего сказать
    /// структурированно: `Err(DIError::custom("port already taken"))`.
    pub fn custom(message: impl Into<String>) -> Self {
        DIError::Custom {
            message: message.into(),
        }
    }

    pub fn invalid_id(raw: impl Into<String>) -> Self {
        DIError::InvalidId { raw: raw.into() }
    }

    pub fn invalid_factory(type_id: impl Into<String>, message: impl Into<String>) -> Self {
        DIError::InvalidFactory {
            type_id: type_id.into(),
            message: message.into(),
        }
    }

    pub fn unknown_reference(id: impl Into<String>, referenced_by: impl Into<String>) -> Self {
        DIError::UnknownReference {
            id: id.into(),
            referenced_by: referenced_by.into(),
        }
    }

    pub fn wrong_shape(
        id: impl Into<String>,
        actual: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        DIError::WrongShape {
            id: id.into(),
            actual: actual.into(),
            expected: expected.into(),
        }
    }

    pub fn missing_method(method: impl Into<String>, on: impl Into<String>) -> Self {
        DIError::MissingMethod {
            method: method.into(),
            on: on.into(),
        }
    }

    /// Категория ошибки для логирования и alerting
    pub fn category(&self) -> &'static str {
        match self {
            DIError::InvalidId { .. } => "id",
            DIError::InvalidFactory { .. } => "registration",
            DIError::UnknownReference { .. } => "reference",
            DIError::WrongShape { .. } => "shape",
            DIError::MissingMethod { .. } => "method",
            DIError::UndefinedParameter { .. } => "parameter",
            DIError::CycleDetected { .. } => "cycle",
            DIError::Undefined { .. } => "lookup",
            DIError::ConfiguratorFailed { .. } => "configurator",
            DIError::FactoryPanicked { .. } => "panic",
            DIError::Custom { .. } => "custom",
            DIError::Validation { .. } => "validation",
        }
    }

    /// Дефект ли это регистрации (чинится правкой wiring кода,
    /// а не повторной попыткой)
    pub fn is_registration_defect(&self) -> bool {
        matches!(
            self,
            DIError::InvalidId { .. }
                | DIError::InvalidFactory { .. }
                | DIError::UnknownReference { .. }
                | DIError::UndefinedParameter { .. }
                | DIError::CycleDetected { .. }
        )
    }
}
