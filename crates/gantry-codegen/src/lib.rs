//! Генератор кода регистрации для контейнера [gantry](../gantry).
//!
//! Принимает YAML-документ с секциями `parameters` и `types` и выдаёт
//! Rust-файл с функцией, выполняющей эквивалентные ручным вызовы
//! контейнерного API. Проверки документа переиспользуют парсер ссылок
//! самого контейнера, поэтому сгенерированный код не может расходиться
//! с тем, что контейнер примет во время исполнения.

pub mod config;
pub mod emit;

pub use config::{load, ConfigError, Document, TargetKind, TypeDef};
pub use emit::{generate, write_generated};
