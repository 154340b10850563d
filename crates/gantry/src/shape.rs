//! Формы значений и описания композитных типов.
//!
//! [`Shape`] это ожидание позиции: поля композита, параметра callable,
//! результата фабрики. Проверка совместимости одна на весь контейнер -
//! [`Shape::accepts`]. Null присваиваем везде, Int неявно расширяется
//! до Float, объекты сравниваются по `TypeId`.
//!
//! [`StructShape`] - это декларативное описание композитного типа:
//! упорядоченные поля с сеттерами и таблица методов. Оно заменяет
//! runtime-рефлексию: описание строится один раз билдером
//! [`StructShape::describe`] и дальше живёт в контейнере, который по
//! нему материализует свежие экземпляры и привязывает методы.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::callable::{CallableValue, Signature};
use crate::errors::DIError;
use crate::reference::is_invokable_method;
use crate::value::{FromValue, IntoValue, ObjectValue, Value};

/// Ссылка на композитный тип: `TypeId` плюс имя для диагностики.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectShape {
    type_id: TypeId,
    name: &'static str,
}

impl ObjectShape {
    pub fn of<T: Any>() -> Self {
        ObjectShape {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Ожидаемая форма значения в некоторой позиции.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Позиция без ожиданий, принимает всё
    Any,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    /// Разделяемый объект конкретного типа
    Object(ObjectShape),
    /// Любое вызываемое значение
    Callable,
}

impl Shape {
    pub fn of<T: Any>() -> Shape {
        Shape::Object(ObjectShape::of::<T>())
    }

    /// Форма конкретного значения.
    ///
    /// Null формы не имеет и подходит к любой позиции, поэтому даёт
    /// `Any`.
    pub fn of_value(value: &Value) -> Shape {
        match value {
            Value::Null => Shape::Any,
            Value::Bool(_) => Shape::Bool,
            Value::Int(_) => Shape::Int,
            Value::Float(_) => Shape::Float,
            Value::Str(_) => Shape::Str,
            Value::List(_) => Shape::List,
            Value::Map(_) => Shape::Map,
            Value::Object(object) => Shape::Object(ObjectShape {
                type_id: object.type_id(),
                name: object.type_name(),
            }),
            Value::Callable(_) => Shape::Callable,
        }
    }

    /// Присваиваемо ли значение позиции этой формы.
    ///
    /// Null подходит везде, Int подходит во Float позицию, объекты
    /// совпадают строго по `TypeId`.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match (self, value) {
            (Shape::Any, _) => true,
            (Shape::Bool, Value::Bool(_)) => true,
            (Shape::Int, Value::Int(_)) => true,
            (Shape::Float, Value::Float(_) | Value::Int(_)) => true,
            (Shape::Str, Value::Str(_)) => true,
            (Shape::List, Value::List(_)) => true,
            (Shape::Map, Value::Map(_)) => true,
            (Shape::Object(shape), Value::Object(object)) => shape.type_id == object.type_id(),
            (Shape::Callable, Value::Callable(_)) => true,
            _ => false,
        }
    }

    /// Пропускает значение в позицию, применяя неявное расширение
    /// Int -> Float. `None` если значение не присваиваемо.
    pub(crate) fn coerce(&self, value: Value) -> Option<Value> {
        if !self.accepts(&value) {
            return None;
        }
        match (self, value) {
            (Shape::Float, Value::Int(i)) => Some(Value::Float(i as f64)),
            (_, value) => Some(value),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Any => write!(f, "any value"),
            Shape::Bool => write!(f, "a boolean"),
            Shape::Int => write!(f, "an integer"),
            Shape::Float => write!(f, "a float"),
            Shape::Str => write!(f, "a string"),
            Shape::List => write!(f, "a list"),
            Shape::Map => write!(f, "a map"),
            Shape::Object(shape) => write!(f, "an object of type {}", shape.name),
            Shape::Callable => write!(f, "a callable"),
        }
    }
}

/// Тип с объявленной формой. Связывает типизированные сигнатуры
/// ([`crate::callable::NativeFn`] и методы) с динамическими проверками.
pub trait HasShape {
    fn shape() -> Shape;
}

impl HasShape for Value {
    fn shape() -> Shape {
        Shape::Any
    }
}

impl HasShape for () {
    fn shape() -> Shape {
        Shape::Any
    }
}

impl HasShape for bool {
    fn shape() -> Shape {
        Shape::Bool
    }
}

impl HasShape for i64 {
    fn shape() -> Shape {
        Shape::Int
    }
}

impl HasShape for f64 {
    fn shape() -> Shape {
        Shape::Float
    }
}

impl HasShape for String {
    fn shape() -> Shape {
        Shape::Str
    }
}

impl HasShape for Vec<Value> {
    fn shape() -> Shape {
        Shape::List
    }
}

impl HasShape for std::collections::BTreeMap<String, Value> {
    fn shape() -> Shape {
        Shape::Map
    }
}

impl HasShape for CallableValue {
    fn shape() -> Shape {
        Shape::Callable
    }
}

impl<T: Any + Send + Sync> HasShape for Arc<T> {
    fn shape() -> Shape {
        Shape::of::<T>()
    }
}

impl<T: Any + Send + Sync> HasShape for Option<Arc<T>> {
    fn shape() -> Shape {
        Shape::of::<T>()
    }
}

impl<T: HasShape> HasShape for Result<T, DIError> {
    fn shape() -> Shape {
        T::shape()
    }
}

type FieldSetter = Arc<dyn Fn(&mut dyn Any, Value) -> Result<(), DIError> + Send + Sync>;
type MethodThunk = Arc<dyn Fn(&ObjectValue, Vec<Value>) -> Result<Value, DIError> + Send + Sync>;
type MakeThunk = Arc<dyn Fn(&[Field], Vec<Value>) -> Result<Value, DIError> + Send + Sync>;

/// Поле композита: имя, ожидаемая форма, type-erased сеттер.
#[derive(Clone)]
pub struct Field {
    name: &'static str,
    shape: Shape,
    assign: FieldSetter,
}

impl Field {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub(crate) fn apply(&self, target: &mut dyn Any, value: Value) -> Result<(), DIError> {
        (self.assign)(target, value)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .finish()
    }
}

/// Метод композита: сигнатура плюс thunk вызова на стёртом получателе.
#[derive(Clone)]
pub struct Method {
    name: &'static str,
    signature: Signature,
    invoke: MethodThunk,
}

impl Method {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

/// Описание композитного типа: упорядоченные поля и таблица методов.
///
/// Одно описание на тип, разделяемое через `Arc`. Контейнер складывает
/// описания в таблицу по `TypeId` при регистрации struct-фабрик и
/// достаёт их при привязке методов.
pub struct StructShape {
    name: &'static str,
    type_id: TypeId,
    fields: Vec<Field>,
    methods: HashMap<&'static str, Method>,
    make: MakeThunk,
}

impl StructShape {
    /// Начинает описание типа `T`.
    ///
    /// `T: Default` обязателен: материализация выделяет свежий экземпляр
    /// с нулевыми полями и затем применяет инициализаторы по порядку.
    pub fn describe<T>(name: &'static str) -> StructShapeBuilder<T>
    where
        T: Default + Any + Send + Sync,
    {
        StructShapeBuilder {
            name,
            fields: Vec::new(),
            methods: HashMap::new(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn object_shape(&self) -> ObjectShape {
        ObjectShape {
            type_id: self.type_id,
            name: self.name,
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    /// Материализует свежий экземпляр: `Default`, затем инициализаторы
    /// по порядку полей. Хвостовые поля без инициализатора остаются
    /// нулевыми.
    pub(crate) fn materialize(&self, values: Vec<Value>) -> Result<Value, DIError> {
        (self.make)(&self.fields, values)
    }

    /// Привязывает метод к конкретному получателю.
    ///
    /// Адресуемы только методы с именем с заглавной буквы. Остальные
    /// часть внутренней поверхности типа и снаружи не видны.
    pub fn bind(&self, method: &str, receiver: &ObjectValue) -> Result<CallableValue, DIError> {
        if !is_invokable_method(method) {
            return Err(DIError::missing_method(method, self.name));
        }
        let found = self
            .methods
            .get(method)
            .ok_or_else(|| DIError::missing_method(method, self.name))?;
        let invoke = Arc::clone(&found.invoke);
        let receiver = receiver.clone();
        Ok(CallableValue::new(
            format!("{}::{}", self.name, found.name),
            found.signature.clone(),
            move |args| invoke(&receiver, args),
        ))
    }
}

impl fmt::Debug for StructShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructShape")
            .field("name", &self.name)
            .field("fields", &self.fields.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Билдер [`StructShape`]. Порядок вызовов `field` задаёт порядок
/// инициализаторов фабрики.
pub struct StructShapeBuilder<T> {
    name: &'static str,
    fields: Vec<Field>,
    methods: HashMap<&'static str, Method>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Default + Any + Send + Sync> StructShapeBuilder<T> {
    /// Объявляет очередное поле с типизированным сеттером.
    pub fn field<V, F>(mut self, name: &'static str, assign: F) -> Self
    where
        V: FromValue + HasShape,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let setter: FieldSetter = Arc::new(move |target: &mut dyn Any, value: Value| {
            let target = target
                .downcast_mut::<T>()
                .ok_or_else(|| DIError::custom(format!("field {name:?} applied to a foreign target")))?;
            assign(target, V::from_value(value)?);
            Ok(())
        });
        self.fields.push(Field {
            name,
            shape: V::shape(),
            assign: setter,
        });
        self
    }

    /// Объявляет метод. Имя с заглавной буквы делает метод адресуемым
    /// извне (селектором `::Method` или конфигуратором).
    pub fn method<Args, M>(mut self, name: &'static str, method: M) -> Self
    where
        M: NativeMethod<T, Args>,
    {
        let signature = method.signature();
        let invoke: MethodThunk = Arc::new(move |receiver: &ObjectValue, args: Vec<Value>| {
            let receiver = receiver.downcast::<T>().ok_or_else(|| {
                DIError::custom(format!("method {name:?} invoked on a foreign receiver"))
            })?;
            method.invoke(receiver.as_ref(), args)
        });
        self.methods.insert(
            name,
            Method {
                name,
                signature,
                invoke,
            },
        );
        self
    }

    pub fn build(self) -> Arc<StructShape> {
        let make: MakeThunk = Arc::new(|fields: &[Field], values: Vec<Value>| {
            let mut instance = T::default();
            for (field, value) in fields.iter().zip(values) {
                field.apply(&mut instance, value)?;
            }
            Ok(Value::object(Arc::new(instance)))
        });
        Arc::new(StructShape {
            name: self.name,
            type_id: TypeId::of::<T>(),
            fields: self.fields,
            methods: self.methods,
            make,
        })
    }
}

/// Описание формы, привязанное к самому типу. Конвенция для
/// сгенерированного кода регистрации: `MyType::shape()`.
pub trait Describe: Any + Send + Sync + Sized {
    fn shape() -> Arc<StructShape>;
}

/// Типизированный метод композита, адаптируемый в таблицу методов.
/// Реализации порождает `native_method!` для арностей 0..=3.
pub trait NativeMethod<T, Args>: Send + Sync + 'static {
    fn signature(&self) -> Signature;
    fn invoke(&self, receiver: &T, args: Vec<Value>) -> Result<Value, DIError>;
}

fn missing_method_argument() -> DIError {
    DIError::custom("argument list exhausted before all parameters were filled")
}

macro_rules! native_method {
    ($($ty:ident),*) => {
        impl<T, Func, Ret, $($ty),*> NativeMethod<T, ($($ty,)*)> for Func
        where
            T: 'static,
            Func: Fn(&T $(, $ty)*) -> Ret + Send + Sync + 'static,
            Ret: IntoValue + HasShape,
            $($ty: FromValue + HasShape,)*
        {
            fn signature(&self) -> Signature {
                Signature::new(vec![$(<$ty as HasShape>::shape()),*], <Ret as HasShape>::shape())
            }

            #[allow(unused_variables, unused_mut, non_snake_case)]
            fn invoke(&self, receiver: &T, args: Vec<Value>) -> Result<Value, DIError> {
                let mut args = args.into_iter();
                $(
                    let $ty = <$ty as FromValue>::from_value(
                        args.next().ok_or_else(missing_method_argument)?,
                    )?;
                )*
                (self)(receiver $(, $ty)*).into_value()
            }
        }
    };
}

native_method!();
native_method!(A);
native_method!(A, B);
native_method!(A, B, C);
