//! gantry - ленивый dependency injection контейнер.
//!
//! Типы регистрируются под строковыми ID с декларированными аргументами,
//! материализуются при первом `get` и дальше живут singleton'ами.
//! Строковые аргументы несут ссылки: `@id` на другой тип, `@?id`
//! опционально, `@id::Method` на привязку метода, `%name%` на параметр
//! конфигурации. [`Validator`] проверяет wiring статически до первого
//! `get`: дефекты фабрик, неопределённые параметры, висячие ссылки,
//! циклы.
//!
//! Сопутствующий генератор `gantry-gen` собирает функцию регистрации
//! из YAML-декларации, он живёт в соседнем крейте gantry-codegen.
//!
//! # Быстрый старт
//!
//! ```
//! use std::sync::Arc;
//! use gantry::{Container, Factory, StructShape, Validator, Value};
//!
//! #[derive(Default)]
//! struct Logger {
//!     prefix: String,
//! }
//!
//! # fn main() -> Result<(), gantry::DIError> {
//! let shape = StructShape::describe::<Logger>("Logger")
//!     .field("prefix", |l: &mut Logger, v: String| l.prefix = v)
//!     .build();
//!
//! let container = Container::new();
//! container.set_parameter("log.prefix", Value::from("app"));
//! container.register(
//!     "logger",
//!     Factory::structure(shape, vec![Value::from("%log.prefix%")]),
//! );
//!
//! Validator::new().validate(&container)?;
//!
//! let logger: Arc<Logger> = container.get_as("logger")?;
//! assert_eq!(logger.prefix, "app");
//! # Ok(())
//! # }
//! ```

pub mod callable;
pub mod configurator;
pub mod container;
pub mod errors;
pub mod factory;
pub mod reference;
pub mod resolver;
pub mod shape;
pub mod validator;
pub mod value;

// Публичный API контейнера
pub use container::{Container, ContainerStats, Target};
pub use errors::DIError;
pub use factory::Factory;
pub use resolver::Resolver;

// Модель значений и форм
pub use callable::{CallableValue, NativeFn, NativeVariadicFn, Signature};
pub use shape::{Describe, Field, HasShape, Method, ObjectShape, Shape, StructShape, StructShapeBuilder};
pub use value::{FromValue, IntoValue, ObjectValue, Value};

// Ссылки и донастройка
pub use configurator::Configurator;
pub use reference::TypeRef;

// Валидация
pub use validator::{
    AcyclicReferences, Constraint, NoInvalidFactories, ParametersDefined, Validator,
};
