//! Контейнер: реестр фабрик, карта параметров, кэш singleton'ов.
//!
//! Все четыре таблицы под собственными `parking_lot::RwLock`, блокировки
//! не удерживаются через вызовы фабрик: материализация реентерабельна,
//! фабрика внутри `produce` свободно дёргает `get` для своих ссылок.
//!
//! Жизненный цикл один - singleton. Первый успешный `get` кладёт
//! значение в кэш, дальше все обращения отдают тот же объект. Неудача
//! не кэшируется: повторный `get` честно повторяет материализацию.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::callable::CallableValue;
use crate::errors::DIError;
use crate::factory::Factory;
use crate::resolver::Resolver;
use crate::shape::{Describe, StructShape};
use crate::value::Value;

/// Цель декларативной регистрации [`Container::register_type`]:
/// описание композита или фабричная функция.
pub enum Target {
    Composite(Arc<StructShape>),
    Callable(CallableValue),
}

impl From<Arc<StructShape>> for Target {
    fn from(shape: Arc<StructShape>) -> Self {
        Target::Composite(shape)
    }
}

impl From<CallableValue> for Target {
    fn from(callable: CallableValue) -> Self {
        Target::Callable(callable)
    }
}

/// Снимок наполнения контейнера для логов и диагностики.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerStats {
    pub registered_types: usize,
    pub cached_singletons: usize,
    pub parameters: usize,
    pub described_shapes: usize,
}

/// Реестр типов с ленивой материализацией.
pub struct Container {
    factories: RwLock<HashMap<String, Arc<Factory>>>,
    parameters: RwLock<HashMap<String, Value>>,
    singletons: RwLock<HashMap<String, Value>>,
    shapes: RwLock<HashMap<TypeId, Arc<StructShape>>>,
}

impl Container {
    pub fn new() -> Self {
        Container {
            factories: RwLock::new(HashMap::new()),
            parameters: RwLock::new(HashMap::new()),
            singletons: RwLock::new(HashMap::new()),
            shapes: RwLock::new(HashMap::new()),
        }
    }

    /// Контейнер с заранее заполненной картой параметров.
    pub fn with_parameters<K: Into<String>>(
        parameters: impl IntoIterator<Item = (K, Value)>,
    ) -> Self {
        let container = Container::new();
        container.set_parameters(parameters);
        container
    }

    /// Регистрирует фабрику под type-ID. Повторная регистрация того же
    /// ID перезаписывает прежнюю фабрику с предупреждением в логе.
    ///
    /// Описание композита struct-фабрики попадает в таблицу форм
    /// автоматически, отдельный [`Container::describe`] не нужен.
    pub fn register(&self, id: impl Into<String>, factory: Factory) {
        let id = id.into();
        if let Some(shape) = factory.struct_shape() {
            self.describe(Arc::clone(shape));
        }
        let mut factories = self.factories.write();
        if factories.contains_key(&id) {
            warn!(type_id = %id, "type is already registered, overwriting");
        }
        debug!(type_id = %id, kind = factory.kind(), "registered type");
        factories.insert(id, Arc::new(factory));
    }

    /// Пакетная регистрация. Порядок не важен: ссылки разрешаются
    /// лениво, вперёд-ссылки легальны.
    pub fn register_all<K: Into<String>>(&self, entries: impl IntoIterator<Item = (K, Factory)>) {
        for (id, factory) in entries {
            self.register(id, factory);
        }
    }

    /// Декларативная регистрация: композит по описанию или
    /// функциональная фабрика, с декларированными аргументами.
    pub fn register_type(
        &self,
        id: impl Into<String>,
        target: impl Into<Target>,
        args: Vec<Value>,
    ) {
        let factory = match target.into() {
            Target::Composite(shape) => Factory::structure(shape, args),
            Target::Callable(callable) => Factory::function(callable, args),
        };
        self.register(id, factory);
    }

    /// Регистрирует готовое значение. Null отклоняется: такая
    /// регистрация неотличима от отсутствующей.
    pub fn inject_instance(&self, id: impl Into<String>, value: Value) -> Result<(), DIError> {
        let id = id.into();
        if value.is_null() {
            return Err(DIError::invalid_factory(
                id,
                "injected instance must not be null",
            ));
        }
        self.register(id, Factory::instance(value));
        Ok(())
    }

    pub fn set_parameter(&self, name: impl Into<String>, value: Value) {
        self.parameters.write().insert(name.into(), value);
    }

    pub fn set_parameters<K: Into<String>>(
        &self,
        parameters: impl IntoIterator<Item = (K, Value)>,
    ) {
        let mut map = self.parameters.write();
        for (name, value) in parameters {
            map.insert(name.into(), value);
        }
    }

    pub fn parameter(&self, name: &str) -> Option<Value> {
        self.parameters.read().get(name).cloned()
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.read().contains_key(name)
    }

    /// Добавляет описание композита в таблицу форм. Нужно для типов,
    /// чьи методы адресуются (`::Method`, конфигураторы), но чья
    /// фабрика не struct-фабрика.
    pub fn describe(&self, shape: Arc<StructShape>) {
        debug!(shape = shape.name(), "described composite type");
        // `Any` в области видимости, поэтому вызов метода через `Arc`
        // разрешается в `Any::type_id` (TypeId самого `Arc`); UFCS
        // закрепляет ключ таблицы за TypeId описанного композита
        let type_id = StructShape::type_id(&shape);
        self.shapes.write().insert(type_id, shape);
    }

    /// То же через конвенцию [`Describe`].
    pub fn describe_type<T: Describe>(&self) {
        self.describe(T::shape());
    }

    pub(crate) fn shape_for(&self, type_id: TypeId) -> Option<Arc<StructShape>> {
        self.shapes.read().get(&type_id).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.factories.read().contains_key(id)
    }

    /// Отсортированный список зарегистрированных type-ID.
    /// Сортировка даёт валидатору детерминированный порядок обхода.
    pub fn type_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub(crate) fn factory(&self, id: &str) -> Option<Arc<Factory>> {
        self.factories.read().get(id).cloned()
    }

    /// Декларированные аргументы фабрики type-ID, для статического
    /// анализа без материализации. Пользовательские ограничения
    /// валидатора строят на этом свои проверки.
    pub fn declared_arguments(&self, id: &str) -> Option<Vec<Value>> {
        self.factories.read().get(id).map(|f| f.arguments())
    }

    /// Singleton значение type-ID, материализуя при первом обращении.
    ///
    /// Ошибки материализации возвращаются как есть и не кэшируются.
    /// Panic пользовательской фабрики перехватывается на границе и
    /// конвертируется в [`DIError::FactoryPanicked`] с ID этой фабрики;
    /// у вложенных материализаций своя граница, поэтому panic всегда
    /// приписан самой внутренней фабрике.
    pub fn get(&self, id: &str) -> Result<Value, DIError> {
        if let Some(cached) = self.singletons.read().get(id) {
            return Ok(cached.clone());
        }
        let factory = self.factory(id).ok_or_else(|| DIError::Undefined {
            id: id.to_string(),
        })?;
        debug!(type_id = %id, kind = factory.kind(), "materializing type");
        let resolver = Resolver::new(self, id);
        let value = match panic::catch_unwind(AssertUnwindSafe(|| factory.produce(&resolver))) {
            Ok(result) => result?,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(type_id = %id, message = %message, "factory panicked");
                return Err(DIError::FactoryPanicked {
                    type_id: id.to_string(),
                    message,
                });
            }
        };
        // При гонке двух первых get выигрывает первая запись, обе
        // стороны видят один и тот же объект
        let value = self
            .singletons
            .write()
            .entry(id.to_string())
            .or_insert(value)
            .clone();
        Ok(value)
    }

    /// Panic-вариант `get` для bootstrap кода, где отсутствие типа это
    /// фатальный дефект конфигурации.
    pub fn must_get(&self, id: &str) -> Value {
        match self.get(id) {
            Ok(value) => value,
            Err(err) => panic!("container: {err}"),
        }
    }

    /// `get` с downcast'ом к конкретному типу.
    pub fn get_as<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>, DIError> {
        let value = self.get(id)?;
        match value.as_object() {
            Some(object) => object.downcast::<T>().ok_or_else(|| {
                DIError::wrong_shape(id, object.type_name(), std::any::type_name::<T>())
            }),
            None => Err(DIError::wrong_shape(
                id,
                value.type_label(),
                std::any::type_name::<T>(),
            )),
        }
    }

    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            registered_types: self.factories.read().len(),
            cached_singletons: self.singletons.read().len(),
            parameters: self.parameters.read().len(),
            described_shapes: self.shapes.read().len(),
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Container::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("stats", &self.stats())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
