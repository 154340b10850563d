//! Вызываемые значения и их сигнатуры.
//!
//! [`CallableValue`] это значение первого класса: функциональная фабрика
//! производит его, `::Method` привязка заворачивает метод объекта в него,
//! proxy-фабрика вызывает его. Внутри - стёртый thunk
//! `Fn(Vec<Value>) -> Result<Value>` плюс декларированная сигнатура,
//! по которой резолвер проверяет аргументы до вызова.
//!
//! Типизированные функции адаптируются через [`NativeFn`] - трейт,
//! реализованный макросом для арностей 0..=5. Последним параметром
//! `Vec<T>` и конструктором [`CallableValue::from_fn_variadic`]
//! объявляется вариадическая хвостовая группа: лишние аргументы вызова
//! сворачиваются в список до передачи thunk'у.

use std::fmt;
use std::sync::Arc;

use crate::errors::DIError;
use crate::shape::{HasShape, Shape};
use crate::value::{FromValue, IntoValue, Value};

/// Декларированная сигнатура вызываемого значения.
///
/// У вариадической сигнатуры последний элемент `params` описывает форму
/// ОДНОГО элемента хвостовой группы, не списка целиком.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    params: Vec<Shape>,
    variadic: bool,
    result: Shape,
}

impl Signature {
    pub fn new(params: Vec<Shape>, result: Shape) -> Self {
        Signature {
            params,
            variadic: false,
            result,
        }
    }

    /// Вариадическая сигнатура. `params` обязан быть непустым: последняя
    /// позиция описывает элементы хвоста.
    pub fn variadic(params: Vec<Shape>, result: Shape) -> Self {
        debug_assert!(!params.is_empty(), "variadic signature needs a tail shape");
        Signature {
            params,
            variadic: true,
            result,
        }
    }

    pub fn params(&self) -> &[Shape] {
        &self.params
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn result(&self) -> &Shape {
        &self.result
    }

    /// Число обязательных позиций (без вариадического хвоста).
    pub fn fixed_len(&self) -> usize {
        if self.variadic {
            self.params.len().saturating_sub(1)
        } else {
            self.params.len()
        }
    }

    /// Допустимо ли такое число фактических аргументов.
    pub fn accepts_count(&self, supplied: usize) -> bool {
        if self.variadic {
            supplied >= self.fixed_len()
        } else {
            supplied == self.params.len()
        }
    }

    /// Ожидаемая форма аргумента на позиции `index`. Для вариадического
    /// хвоста все позиции от `fixed_len` и дальше дают форму элемента.
    pub fn expected_at(&self, index: usize) -> Option<&Shape> {
        if self.variadic && index >= self.fixed_len() {
            self.params.last()
        } else {
            self.params.get(index)
        }
    }
}

type Thunk = Arc<dyn Fn(Vec<Value>) -> Result<Value, DIError> + Send + Sync>;

/// Вызываемое значение: имя для диагностики, сигнатура, thunk.
#[derive(Clone)]
pub struct CallableValue {
    name: String,
    signature: Arc<Signature>,
    thunk: Thunk,
}

impl CallableValue {
    /// Низкоуровневый конструктор из стёртого thunk'а. Типизированный
    /// код использует [`CallableValue::from_fn`].
    pub fn new(
        name: impl Into<String>,
        signature: Signature,
        thunk: impl Fn(Vec<Value>) -> Result<Value, DIError> + Send + Sync + 'static,
    ) -> Self {
        CallableValue {
            name: name.into(),
            signature: Arc::new(signature),
            thunk: Arc::new(thunk),
        }
    }

    /// Заворачивает типизированную функцию или замыкание.
    ///
    /// Сигнатура выводится из типов параметров и результата. Параметры
    /// обязаны реализовывать [`FromValue`], результат [`IntoValue`].
    pub fn from_fn<Args, F>(name: impl Into<String>, f: F) -> Self
    where
        F: NativeFn<Args>,
    {
        let signature = f.signature();
        CallableValue {
            name: name.into(),
            signature: Arc::new(signature),
            thunk: Arc::new(move |args| f.invoke(args)),
        }
    }

    /// Заворачивает функцию с вариадическим хвостом: последний параметр
    /// `Vec<T>` собирает все лишние аргументы вызова.
    pub fn from_fn_variadic<Args, F>(name: impl Into<String>, f: F) -> Self
    where
        F: NativeVariadicFn<Args>,
    {
        let signature = f.signature();
        CallableValue {
            name: name.into(),
            signature: Arc::new(signature),
            thunk: Arc::new(move |args| f.invoke(args)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Вызов с проверкой арности. Вариадический хвост сворачивается в
    /// один `Value::List` до передачи thunk'у.
    pub fn call(&self, args: Vec<Value>) -> Result<Value, DIError> {
        if !self.signature.accepts_count(args.len()) {
            return Err(DIError::custom(self.arity_error(args.len())));
        }
        let args = if self.signature.is_variadic() {
            let mut args = args;
            let tail = args.split_off(self.signature.fixed_len());
            args.push(Value::List(tail));
            args
        } else {
            args
        };
        (self.thunk)(args)
    }

    pub(crate) fn arity_error(&self, supplied: usize) -> String {
        if self.signature.is_variadic() {
            format!(
                "{} expects at least {} argument(s), got {}",
                self.name,
                self.signature.fixed_len(),
                supplied
            )
        } else {
            format!(
                "{} expects {} argument(s), got {}",
                self.name,
                self.signature.params().len(),
                supplied
            )
        }
    }

    /// Идентичность по thunk'у: привязки одного и того же singleton
    /// метода равны, разные замыкания различимы.
    pub fn ptr_eq(&self, other: &CallableValue) -> bool {
        Arc::ptr_eq(&self.thunk, &other.thunk)
    }
}

impl fmt::Debug for CallableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallableValue({})", self.name)
    }
}

impl PartialEq for CallableValue {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

fn missing_argument() -> DIError {
    DIError::custom("argument list exhausted before all parameters were filled")
}

/// Типизированная функция фиксированной арности, адаптируемая в
/// [`CallableValue`]. Реализации порождает `native_fn!` для 0..=5
/// параметров.
pub trait NativeFn<Args>: Send + Sync + 'static {
    fn signature(&self) -> Signature;
    fn invoke(&self, args: Vec<Value>) -> Result<Value, DIError>;
}

macro_rules! native_fn {
    ($($ty:ident),*) => {
        impl<Func, Ret, $($ty),*> NativeFn<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) -> Ret + Send + Sync + 'static,
            Ret: IntoValue + HasShape,
            $($ty: FromValue + HasShape,)*
        {
            fn signature(&self) -> Signature {
                Signature::new(vec![$(<$ty as HasShape>::shape()),*], <Ret as HasShape>::shape())
            }

            #[allow(unused_variables, unused_mut, non_snake_case)]
            fn invoke(&self, args: Vec<Value>) -> Result<Value, DIError> {
                let mut args = args.into_iter();
                $(
                    let $ty = <$ty as FromValue>::from_value(
                        args.next().ok_or_else(missing_argument)?,
                    )?;
                )*
                (self)($($ty),*).into_value()
            }
        }
    };
}

native_fn!();
native_fn!(A);
native_fn!(A, B);
native_fn!(A, B, C);
native_fn!(A, B, C, D);
native_fn!(A, B, C, D, E);

/// Типизированная функция с вариадическим хвостом `Vec<T>`.
/// До двух фиксированных параметров перед хвостом.
pub trait NativeVariadicFn<Args>: Send + Sync + 'static {
    fn signature(&self) -> Signature;
    fn invoke(&self, args: Vec<Value>) -> Result<Value, DIError>;
}

macro_rules! native_variadic_fn {
    ($($ty:ident),*) => {
        impl<Func, Ret, Tail, $($ty),*> NativeVariadicFn<($($ty,)* Vec<Tail>,)> for Func
        where
            Func: Fn($($ty,)* Vec<Tail>) -> Ret + Send + Sync + 'static,
            Ret: IntoValue + HasShape,
            Tail: FromValue + HasShape,
            $($ty: FromValue + HasShape,)*
        {
            fn signature(&self) -> Signature {
                Signature::variadic(
                    vec![$(<$ty as HasShape>::shape(),)* <Tail as HasShape>::shape()],
                    <Ret as HasShape>::shape(),
                )
            }

            #[allow(unused_variables, unused_mut, non_snake_case)]
            fn invoke(&self, args: Vec<Value>) -> Result<Value, DIError> {
                let mut args = args.into_iter();
                $(
                    let $ty = <$ty as FromValue>::from_value(
                        args.next().ok_or_else(missing_argument)?,
                    )?;
                )*
                let tail = <Vec<Tail> as FromValue>::from_value(
                    args.next().ok_or_else(missing_argument)?,
                )?;
                (self)($($ty,)* tail).into_value()
            }
        }
    };
}

native_variadic_fn!();
native_variadic_fn!(A);
native_variadic_fn!(A, B);
